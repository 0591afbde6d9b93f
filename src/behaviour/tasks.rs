//! Leaf tasks that move humans around.

use super::{Agent, BehaviourRng, Status, Task, TimeTicker};
use crate::geometry::{distance, sorted_abs_difference, tile_centre, Direction, TilePos};
use crate::entity::ContextEntityExt;
use crate::random::ContextRandomExt;
use crate::world::ContextWorldExt;
use log::{debug, info};

/// Seconds a walker keeps trying to reach its target.
const WALK_TIMEOUT: f64 = 5.0;

const ROAM_ATTEMPTS: usize = 10;

/// Walks to the centre of a tile and snaps onto it once close enough.
pub struct WalkToLocation {
    target: Option<TilePos>,
    elapsed: f64,
}

impl WalkToLocation {
    #[must_use]
    pub fn new(target: Option<TilePos>) -> Self {
        WalkToLocation {
            target,
            elapsed: 0.0,
        }
    }

    pub fn set_target(&mut self, target: TilePos) {
        self.target = Some(target);
        self.elapsed = 0.0;
    }

    #[must_use]
    pub fn target(&self) -> Option<TilePos> {
        self.target
    }
}

impl Task for WalkToLocation {
    fn init(&mut self, _agent: &mut Agent<'_>) {
        self.elapsed = 0.0;
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        let Some(tile) = self.target else {
            return Status::Failure;
        };
        let target = tile_centre(tile);
        let position = agent.position();
        let threshold = agent.delta * agent.speed() * 1.5;
        if distance(position, target) <= threshold {
            agent.context.move_entity(agent.entity, target);
            return Status::Success;
        }

        self.elapsed += agent.delta;
        if self.elapsed > WALK_TIMEOUT {
            debug!("{} gave up walking to {tile:?}", agent.entity);
            agent.halt();
            return Status::Failure;
        }

        if let Some(direction) = Direction::between_points(position, target) {
            agent.move_in_direction(direction);
        }
        Status::Running
    }
}

/// Walks a tile path one waypoint at a time. Path tiles that are not adjacent are joined by
/// an L-shaped run, longer axis first.
pub struct FollowPath {
    waypoints: Vec<TilePos>,
    index: usize,
    walker: WalkToLocation,
}

impl FollowPath {
    #[must_use]
    pub fn new(path: &[TilePos]) -> Self {
        FollowPath {
            waypoints: interpolate(path),
            index: 0,
            walker: WalkToLocation::new(None),
        }
    }

    #[must_use]
    pub fn waypoints(&self) -> &[TilePos] {
        &self.waypoints
    }
}

fn interpolate(path: &[TilePos]) -> Vec<TilePos> {
    let mut waypoints = Vec::new();
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from == to {
            continue;
        }
        if sorted_abs_difference(from, to) == [0, 1] {
            waypoints.push(from);
            continue;
        }

        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let horizontal_first = dx.abs() >= dy.abs();
        let mut current = from;
        for horizontal in [horizontal_first, !horizontal_first] {
            if horizontal {
                while current.0 != to.0 {
                    waypoints.push(current);
                    current.0 += dx.signum();
                }
            } else {
                while current.1 != to.1 {
                    waypoints.push(current);
                    current.1 += dy.signum();
                }
            }
        }
    }
    if let Some(last) = path.last() {
        if waypoints.last() != Some(last) {
            waypoints.push(*last);
        }
    }
    waypoints
}

impl Task for FollowPath {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.index = 0;
        if let Some(first) = self.waypoints.first() {
            self.walker.set_target(*first);
        }
        self.walker.init(agent);
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        self.walker.end(agent);
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        if self.waypoints.is_empty() {
            return Status::Success;
        }
        match self.walker.process(agent) {
            Status::Running => Status::Running,
            Status::Failure => {
                agent.halt();
                Status::Failure
            }
            Status::Success => {
                self.index += 1;
                match self.waypoints.get(self.index) {
                    Some(next) => {
                        self.walker.set_target(*next);
                        Status::Running
                    }
                    None => {
                        agent.halt();
                        Status::Success
                    }
                }
            }
        }
    }
}

/// Walks to a random navigation node of the current world.
#[derive(Default)]
pub struct Roam {
    path: Option<FollowPath>,
}

impl Roam {
    #[must_use]
    pub fn new() -> Self {
        Roam::default()
    }
}

impl Task for Roam {
    fn init(&mut self, agent: &mut Agent<'_>) {
        self.path = None;
        let world = agent.world();
        let current = agent.tile();
        let nodes: Vec<TilePos> = agent
            .context
            .world(world)
            .nav_graph
            .as_ref()
            .map(|graph| graph.nodes().collect())
            .unwrap_or_default();
        if nodes.is_empty() {
            return;
        }

        for _ in 0..ROAM_ATTEMPTS {
            let goal = nodes[agent.context.sample_range::<BehaviourRng, _, usize>(0..nodes.len())];
            if goal == current {
                continue;
            }
            let w = agent.context.world(world);
            let path = w
                .nav_graph
                .as_ref()
                .and_then(|graph| graph.find_walking_path(w, current, goal));
            if let Some(path) = path {
                let mut follow = FollowPath::new(&path);
                follow.init(agent);
                self.path = Some(follow);
                return;
            }
        }
        debug!("{} found nowhere to roam to", agent.entity);
    }

    fn end(&mut self, agent: &mut Agent<'_>) {
        if let Some(path) = self.path.as_mut() {
            path.end(agent);
        }
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        match self.path.as_mut() {
            Some(path) => path.process(agent),
            None => Status::Failure,
        }
    }
}

/// Every so often either picks a random direction or stops. With `moving`, walks that way
/// (turning back from a blocked tile); otherwise only faces it.
pub struct Wander {
    ticker: TimeTicker,
    moving: bool,
}

impl Wander {
    #[must_use]
    pub fn new(moving: bool) -> Self {
        Wander {
            ticker: TimeTicker::new(0.1, 0.8),
            moving,
        }
    }
}

impl Task for Wander {
    fn init(&mut self, agent: &mut Agent<'_>) {
        let ticker = &mut self.ticker;
        agent.context.sample::<BehaviourRng, _>(|rng| ticker.reset(rng));
    }

    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        let delta = agent.delta;
        let ticker = &mut self.ticker;
        if !agent.context.sample::<BehaviourRng, _>(|rng| ticker.tick(delta, rng)) {
            return Status::Running;
        }

        if agent.context.sample_bool::<BehaviourRng>(0.4) {
            let mut direction = agent.context.sample::<BehaviourRng, _>(|rng| Direction::random(rng));
            if self.moving {
                let tile = agent.tile();
                if agent.context.world(agent.world()).is_direction_blocked(tile, direction) {
                    direction = direction.opposite();
                }
                agent.move_in_direction(direction);
            } else {
                agent.turn(direction);
            }
        } else {
            agent.halt();
        }
        Status::Running
    }
}

/// Succeeds when the tile the entity is facing is free.
pub struct NoObstacle;

impl Task for NoObstacle {
    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        let blocked = agent
            .context
            .world(agent.world())
            .is_direction_blocked(agent.tile(), agent.direction());
        Status::from_condition(!blocked)
    }
}

/// Logs a message, then succeeds.
pub struct LogMessage(pub String);

impl Task for LogMessage {
    fn process(&mut self, agent: &mut Agent<'_>) -> Status {
        info!("{}: {}", agent.entity, self.0);
        Status::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::tests::context_with_human;
    use crate::controller::Movement;
    use crate::geometry::Vec2;

    #[test]
    fn path_is_interpolated_into_adjacent_steps() {
        let follow = FollowPath::new(&[(0, 0), (3, 1), (3, 2)]);
        assert_eq!(
            follow.waypoints(),
            &[(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2)]
        );
        for pair in follow.waypoints().windows(2) {
            assert_eq!(sorted_abs_difference(pair[0], pair[1]), [0, 1]);
        }
        assert_eq!(FollowPath::new(&[(4, 4)]).waypoints(), &[(4, 4)]);
    }

    #[test]
    fn walker_reaches_and_snaps_to_target() {
        let (mut context, human) = context_with_human();
        let mut movement = Movement::new(90.0, 120.0);
        let mut agent = Agent::new(&mut context, human, &mut movement);
        let mut walk = WalkToLocation::new(Some((2, 1)));
        walk.init(&mut agent);

        let mut status = Status::Running;
        for _ in 0..200 {
            status = walk.process(&mut agent);
            if status != Status::Running {
                break;
            }
            let velocity = agent.context.entity(human).velocity;
            let position = agent.position();
            agent.context.move_entity(human, position + velocity * agent.delta);
        }
        assert_eq!(status, Status::Success);
        assert_eq!(agent.position(), Vec2::new(80.0, 48.0));
    }

    #[test]
    fn walker_gives_up_when_stuck() {
        let (mut context, human) = context_with_human();
        let mut movement = Movement::new(90.0, 120.0);
        let mut agent = Agent::new(&mut context, human, &mut movement);
        let mut walk = WalkToLocation::new(Some((3, 2)));
        walk.init(&mut agent);
        let frames = (WALK_TIMEOUT / agent.delta) as usize + 2;
        let statuses: Vec<Status> = (0..frames).map(|_| walk.process(&mut agent)).collect();
        assert_eq!(statuses.last(), Some(&Status::Failure));
        assert_eq!(agent.context.entity(human).velocity, Vec2::ZERO);
    }

    #[test]
    fn no_obstacle_checks_the_facing_tile() {
        let (mut context, human) = context_with_human();
        let mut movement = Movement::new(90.0, 120.0);
        let mut agent = Agent::new(&mut context, human, &mut movement);
        agent.turn(Direction::East);
        assert_eq!(NoObstacle.process(&mut agent), Status::Success);
        agent.context.move_entity(human, Vec2::new(112.0, 48.0));
        assert_eq!(NoObstacle.process(&mut agent), Status::Failure);
        assert_eq!(LogMessage("hello".to_string()).process(&mut agent), Status::Success);
    }
}
