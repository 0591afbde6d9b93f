use super::{DriveState, Engine, Key, VEHICLE_MAX_SPEED};
use crate::clock::ContextClockExt;
use crate::context::{Context, Event};
use crate::entity::{ContextEntityExt, EntityId};
use crate::geometry::{distance_sqrd, pixel_to_tile, Direction, Vec2, TILE_SIZE};
use crate::world::ContextWorldExt;
use log::debug;
use rand::Rng;

/// Distance² between predicted and actual positions that counts as a crash.
const CRASH_TOLERANCE: f64 = 0.5;

/// Emitted when a vehicle stops short of where its speed should have taken it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VehicleCrashEvent {
    pub vehicle: EntityId,
    pub speed: f64,
}
impl Event for VehicleCrashEvent {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Pedal {
    Brake,
    Steer(Direction),
    Released,
}

pub struct VehicleController {
    keystack: Vec<Direction>,
    brake: bool,
    state: DriveState,
    last_state: DriveState,
    last_directions: (i32, i32),
    last_position: Vec2,
    last_direction: Direction,
    current_speed: f64,
    pub engine: Engine,
}

impl VehicleController {
    /// A stopped vehicle at `position`, facing `direction`.
    #[must_use]
    pub fn new(max_speed: f64, position: Vec2, direction: Direction) -> Self {
        VehicleController {
            keystack: Vec::new(),
            brake: false,
            state: DriveState::Stopped,
            last_state: DriveState::Stopped,
            last_directions: (0, 0),
            last_position: position,
            last_direction: direction,
            current_speed: 0.0,
            engine: Engine::new(max_speed, 7.0, 5.0),
        }
    }

    pub fn random_max_speed<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        VEHICLE_MAX_SPEED * rng.random_range(0.75..=1.0)
    }

    #[must_use]
    pub fn state(&self) -> DriveState {
        self.state
    }

    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    fn pedal(&self) -> Pedal {
        if self.brake {
            Pedal::Brake
        } else {
            self.keystack
                .last()
                .map_or(Pedal::Released, |direction| Pedal::Steer(*direction))
        }
    }

    /// Registers a key. Steering is ignored without a driver, and so is reversing while moving.
    pub fn handle(&mut self, key: Key, down: bool, heading: Direction, has_driver: bool) -> bool {
        if key == Key::Brake {
            self.brake = down;
            return true;
        }
        let Some(direction) = key.direction() else {
            return false;
        };

        if down {
            let reversing = self.state != DriveState::Stopped && direction.opposite() == heading;
            if has_driver && !reversing && self.keystack.last() != Some(&direction) {
                self.keystack.push(direction);
            }
        } else {
            self.keystack.retain(|d| *d != direction);
        }
        true
    }

    /// Travel along one axis: the newest key while driving, the previous heading while
    /// slowing down, nothing while stopped.
    fn axis(&self, vertical: bool) -> i32 {
        match self.state {
            DriveState::Stopped => 0,
            DriveState::Braking | DriveState::Drifting => {
                if vertical {
                    self.last_directions.1
                } else {
                    self.last_directions.0
                }
            }
            DriveState::Accelerating | DriveState::Crashed => match self.pedal() {
                Pedal::Steer(direction) if direction.is_vertical() == vertical => {
                    if direction.is_negative() {
                        -1
                    } else {
                        1
                    }
                }
                _ => 0,
            },
        }
    }

    pub fn tick(&mut self, context: &mut Context, vehicle: EntityId) {
        match self.pedal() {
            Pedal::Brake => {
                if !matches!(self.state, DriveState::Stopped | DriveState::Braking) {
                    self.state = DriveState::Braking;
                }
            }
            Pedal::Released => {
                if self.state == DriveState::Accelerating {
                    self.state = DriveState::Drifting;
                }
            }
            Pedal::Steer(direction) => {
                let accelerate = self.state != DriveState::Crashed || {
                    let entity = context.entity(vehicle);
                    !context
                        .world(entity.world)
                        .is_direction_blocked(pixel_to_tile(entity.transform), direction)
                };
                if accelerate {
                    self.state = DriveState::Accelerating;
                    if self.last_state == DriveState::Stopped {
                        self.engine.boost();
                    }
                }
            }
        }

        let (position, direction) = {
            let entity = context.entity(vehicle);
            (entity.transform, entity.direction)
        };
        if direction == self.last_direction && self.state != DriveState::Crashed {
            let travelled = self.current_speed * context.last_delta();
            let expected = self.last_position + direction.vector() * travelled;
            if distance_sqrd(position, expected) > CRASH_TOLERANCE {
                debug!("{vehicle} crashed at {:.1} px/s", self.current_speed);
                self.state = DriveState::Crashed;
                context.emit_event(VehicleCrashEvent {
                    vehicle,
                    speed: self.current_speed,
                });
                self.current_speed = 0.0;
            }
        }

        self.current_speed = self.engine.speed(self.state, context.delta());
        self.apply_velocity(context, vehicle);

        self.last_directions = (self.axis(false), self.axis(true));
        self.last_state = self.state;
        self.last_position = position;
        self.last_direction = direction;
    }

    fn apply_velocity(&mut self, context: &mut Context, vehicle: EntityId) {
        let coasting = !matches!(
            self.state,
            DriveState::Accelerating | DriveState::Stopped | DriveState::Crashed
        );
        if coasting && self.current_speed < f64::from(TILE_SIZE) {
            self.halt(context, vehicle);
            return;
        }
        let speed = self.engine.last_speed();
        context.entity_mut(vehicle).velocity = Vec2::new(
            f64::from(self.axis(false)) * speed,
            f64::from(self.axis(true)) * speed,
        );
    }

    pub fn slow(&mut self, fraction: f64) {
        self.engine.slow(fraction);
    }

    pub fn halt(&mut self, context: &mut Context, vehicle: EntityId) {
        context.entity_mut(vehicle).velocity = Vec2::ZERO;
        self.current_speed = 0.0;
        self.state = DriveState::Stopped;
    }

    /// Lets go of every steering key.
    pub fn on_control_end(&mut self) {
        self.keystack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> VehicleController {
        VehicleController::new(400.0, Vec2::new(0.0, 0.0), Direction::East)
    }

    #[test]
    fn keys_need_a_driver() {
        let mut c = controller();
        c.handle(Key::Right, true, Direction::East, false);
        assert_eq!(c.pedal(), Pedal::Released);
        c.handle(Key::Right, true, Direction::East, true);
        assert_eq!(c.pedal(), Pedal::Steer(Direction::East));
        c.handle(Key::Brake, true, Direction::East, true);
        assert_eq!(c.pedal(), Pedal::Brake);
    }

    #[test]
    fn reversing_is_ignored_while_moving() {
        let mut c = controller();
        c.state = DriveState::Accelerating;
        c.handle(Key::Left, true, Direction::East, true);
        assert!(c.keystack.is_empty());
        c.state = DriveState::Stopped;
        c.handle(Key::Left, true, Direction::East, true);
        assert_eq!(c.keystack, vec![Direction::West]);
    }

    #[test]
    fn newest_key_steers() {
        let mut c = controller();
        c.handle(Key::Up, true, Direction::East, true);
        c.handle(Key::Right, true, Direction::East, true);
        c.state = DriveState::Accelerating;
        assert_eq!((c.axis(false), c.axis(true)), (1, 0));
        c.handle(Key::Right, false, Direction::East, true);
        assert_eq!((c.axis(false), c.axis(true)), (0, -1));
        c.state = DriveState::Stopped;
        assert_eq!((c.axis(false), c.axis(true)), (0, 0));
    }

    #[test]
    fn max_speed_is_a_fraction_of_the_limit() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let speed = VehicleController::random_max_speed(&mut rng);
            assert!((300.0..=400.0).contains(&speed));
        }
    }
}
