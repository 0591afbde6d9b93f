/*!
Behaviour trees for AI-driven humans.

A tree is a hierarchy of [`Task`]s processed once per frame. Every task reports a [`Status`]:
composites ([`Sequence`], [`Selector`]) run their children in order, decorators ([`Inverter`],
[`Succeeder`], [`Repeater`]) reshape a single child's result, and leaves act on the entity
through an [`Agent`].

Tasks receive `init` once before their first `process`, and `end` when their parent moves on
or the tree is replaced.
*/

mod tasks;
mod ticker;

pub use tasks::{FollowPath, LogMessage, NoObstacle, Roam, Wander, WalkToLocation};
pub use ticker::TimeTicker;

use crate::clock::ContextClockExt;
use crate::context::Context;
use crate::controller::Movement;
use crate::entity::{ContextEntityExt, EntityId};
use crate::geometry::{pixel_to_tile, Direction, TilePos, Vec2};
use crate::world::WorldId;

crate::define_rng!(BehaviourRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Failure,
    Success,
}

impl Status {
    #[must_use]
    pub fn from_condition(condition: bool) -> Status {
        if condition {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

/// The entity a tree is driving, with the context it lives in.
pub struct Agent<'a> {
    pub context: &'a mut Context,
    pub entity: EntityId,
    pub movement: &'a mut Movement,
    pub delta: f64,
}

impl<'a> Agent<'a> {
    pub fn new(context: &'a mut Context, entity: EntityId, movement: &'a mut Movement) -> Self {
        let delta = context.delta();
        Agent {
            context,
            entity,
            movement,
            delta,
        }
    }

    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.context.entity(self.entity).transform
    }

    #[must_use]
    pub fn tile(&self) -> TilePos {
        pixel_to_tile(self.position())
    }

    #[must_use]
    pub fn world(&self) -> WorldId {
        self.context.entity(self.entity).world
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.context.entity(self.entity).direction
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.movement.current_speed()
    }

    /// Releases every key, then walks towards `direction`.
    pub fn move_in_direction(&mut self, direction: Direction) {
        self.movement.move_in_direction(direction);
        self.context.entity_mut(self.entity).velocity = self.movement.velocity();
    }

    pub fn halt(&mut self) {
        self.movement.halt();
        self.context.entity_mut(self.entity).velocity = Vec2::ZERO;
    }

    pub fn turn(&mut self, direction: Direction) {
        self.context.turn_entity(self.entity, direction);
    }
}

pub trait Task {
    fn init(&mut self, _agent: &mut Agent<'_>) {}

    fn end(&mut self, _agent: &mut Agent<'_>) {}

    fn process(&mut self, agent: &mut Agent<'_>) -> Status;
}

pub type BoxedTask = Box<dyn Task>;

pub struct BehaviourTree {
    root: Option<BoxedTask>,
    started: bool,
}

impl BehaviourTree {
    #[must_use]
    pub fn new(root: BoxedTask) -> Self {
        BehaviourTree {
            root: Some(root),
            started: false,
        }
    }

    /// Processes the root, initialising it first if needed.
    pub fn tick(&mut self, agent: &mut Agent<'_>) -> Status {
        let Some(root) = self.root.as_mut() else {
            return Status::Failure;
        };
        if !self.started {
            root.init(agent);
            self.started = true;
        }
        root.process(agent)
    }

    /// Ends the current root and starts `root` in its place.
    pub fn set_root(&mut self, root: BoxedTask, agent: &mut Agent<'_>) {
        self.end_root(agent);
        let root = self.root.insert(root);
        root.init(agent);
        self.started = true;
    }

    /// Runs `task` to success before resuming the current root from its start.
    pub fn prefix(&mut self, task: BoxedTask, agent: &mut Agent<'_>) {
        self.end_root(agent);
        let mut children = vec![task];
        children.extend(self.root.take());
        self.set_root(Box::new(Sequence::new(children)), agent);
    }

    fn end_root(&mut self, agent: &mut Agent<'_>) {
        if self.started {
            if let Some(root) = self.root.as_mut() {
                root.end(agent);
            }
        }
        self.started = false;
    }
}

/// Runs children in order. Fails as soon as one fails and succeeds when all have.
pub struct Sequence {
    children: Vec<BoxedTask>,
    current: usize,
}

impl Sequence {
    #[must_use]
    pub fn new(children: Vec<BoxedTask>) -> Self {
        Sequence {
            children,
            current: 0,
        }
    }
}

impl Task for Sequence {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.current = 0;
        if let Some(child) = self.children.first_mut() {
            child.init(agent);
        }
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        if let Some(child) = self.children.get_mut(self.current) {
            child.end(agent);
        }
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        let Some(child) = self.children.get_mut(self.current) else {
            return Status::Success;
        };
        match child.process(agent) {
            Status::Success => {
                child.end(agent);
                self.current += 1;
                match self.children.get_mut(self.current) {
                    Some(next) => {
                        next.init(agent);
                        Status::Running
                    }
                    None => Status::Success,
                }
            }
            status => status,
        }
    }
}

/// Runs children in order until one succeeds. Fails when all have failed.
pub struct Selector {
    children: Vec<BoxedTask>,
    current: usize,
}

impl Selector {
    #[must_use]
    pub fn new(children: Vec<BoxedTask>) -> Self {
        Selector {
            children,
            current: 0,
        }
    }
}

impl Task for Selector {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.current = 0;
        if let Some(child) = self.children.first_mut() {
            child.init(agent);
        }
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        if let Some(child) = self.children.get_mut(self.current) {
            child.end(agent);
        }
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        let Some(child) = self.children.get_mut(self.current) else {
            return Status::Failure;
        };
        match child.process(agent) {
            Status::Failure => {
                child.end(agent);
                self.current += 1;
                match self.children.get_mut(self.current) {
                    Some(next) => {
                        next.init(agent);
                        Status::Running
                    }
                    None => Status::Failure,
                }
            }
            status => status,
        }
    }
}

/// Swaps success and failure.
pub struct Inverter(pub BoxedTask);

impl Task for Inverter {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.0.init(agent);
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        self.0.end(agent);
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        match self.0.process(agent) {
            Status::Running => Status::Running,
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
        }
    }
}

/// Succeeds whenever its child finishes.
pub struct Succeeder(pub BoxedTask);

impl Task for Succeeder {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.0.init(agent);
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        self.0.end(agent);
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        match self.0.process(agent) {
            Status::Running => Status::Running,
            _ => Status::Success,
        }
    }
}

/// Restarts its child whenever it finishes, either a fixed number of times or forever.
pub struct Repeater {
    child: BoxedTask,
    times: Option<u32>,
    remaining: u32,
}

impl Repeater {
    #[must_use]
    pub fn new(child: BoxedTask, times: u32) -> Self {
        Repeater {
            child,
            times: Some(times),
            remaining: times,
        }
    }

    #[must_use]
    pub fn forever(child: BoxedTask) -> Self {
        Repeater {
            child,
            times: None,
            remaining: 0,
        }
    }
}

impl Task for Repeater {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.remaining = self.times.unwrap_or(0);
        self.child.init(agent);
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        self.child.end(agent);
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        if self.child.process(agent) == Status::Running {
            return Status::Running;
        }
        if self.times.is_some() {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                return Status::Success;
            }
        }
        self.child.end(agent);
        self.child.init(agent);
        Status::Running
    }
}
