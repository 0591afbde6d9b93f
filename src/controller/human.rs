use super::{Key, Movement};
use crate::behaviour::{Agent, BehaviourTree, BoxedTask, Repeater, Wander};
use crate::context::Context;
use crate::entity::{ContextEntityExt, EntityId};

/// Walking movement plus the behaviour tree that drives it when nobody else does.
pub struct HumanController {
    pub movement: Movement,
    tree: BehaviourTree,
    pub(crate) suppressed: bool,
}

impl HumanController {
    /// Starts out standing around, occasionally looking somewhere else.
    #[must_use]
    pub fn new(movement: Movement) -> Self {
        HumanController {
            movement,
            tree: BehaviourTree::new(Box::new(Repeater::forever(Box::new(Wander::new(false))))),
            suppressed: false,
        }
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn tick(&mut self, context: &mut Context, human: EntityId) {
        if self.suppressed {
            return;
        }
        let mut agent = Agent::new(context, human, &mut self.movement);
        self.tree.tick(&mut agent);
    }

    /// Applies a key to the movement and the entity's velocity.
    pub fn handle(&mut self, context: &mut Context, human: EntityId, key: Key, down: bool) -> bool {
        let handled = self.movement.handle(key, down);
        if handled {
            context.entity_mut(human).velocity = self.movement.velocity();
        }
        handled
    }

    pub fn halt(&mut self, context: &mut Context, human: EntityId) {
        let mut agent = Agent::new(context, human, &mut self.movement);
        agent.halt();
    }

    pub fn set_behaviour(&mut self, root: BoxedTask, context: &mut Context, human: EntityId) {
        let mut agent = Agent::new(context, human, &mut self.movement);
        self.tree.set_root(root, &mut agent);
    }

    /// Runs `task` first, then resumes the current behaviour.
    pub fn prefix_behaviour(&mut self, task: BoxedTask, context: &mut Context, human: EntityId) {
        let mut agent = Agent::new(context, human, &mut self.movement);
        self.tree.prefix(task, &mut agent);
    }
}
