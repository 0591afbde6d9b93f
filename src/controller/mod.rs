/*!
Entity controllers.

Controllers turn key state (from the player or a behaviour tree) into velocity. Humans walk at
a fixed speed with an optional sprint; vehicles and the free camera run an [`Engine`] whose
speed follows acceleration and braking curves.
*/

mod engine;
mod human;
mod vehicle;

pub use engine::{Curve, DriveState, Engine};
pub use human::HumanController;
pub use vehicle::{VehicleController, VehicleCrashEvent};

use crate::geometry::{Direction, Vec2};
use rand::Rng;

pub const HUMAN_MIN_SPEED: f64 = 80.0;
pub const HUMAN_FAST_SPEED: f64 = 100.0;
pub const HUMAN_MAX_SPEED: f64 = 180.0;
pub const VEHICLE_MIN_SPEED: f64 = 200.0;
pub const VEHICLE_MAX_SPEED: f64 = 400.0;
pub const CAMERA_MIN_SPEED: f64 = 220.0;
pub const CAMERA_FAST_SPEED: f64 = 450.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Left,
    Down,
    Right,
    Boost,
    Brake,
    Interact,
    ReleaseControl,
    Quit,
}

impl Key {
    /// Directional keys in direction order.
    pub const DIRECTIONAL: [Key; 4] = [Key::Up, Key::Left, Key::Down, Key::Right];

    #[must_use]
    pub fn direction(self) -> Option<Direction> {
        Key::DIRECTIONAL
            .iter()
            .position(|k| *k == self)
            .map(Direction::from_index)
    }

    #[must_use]
    pub fn from_direction(direction: Direction) -> Key {
        Key::DIRECTIONAL[direction.index()]
    }
}

/// Which directional keys are held.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectionalKeys {
    held: [bool; 4],
}

impl DirectionalKeys {
    pub fn set(&mut self, direction: Direction, down: bool) {
        self.held[direction.index()] = down;
    }

    #[must_use]
    pub fn is_held(&self, direction: Direction) -> bool {
        self.held[direction.index()]
    }

    pub fn release_all(&mut self) {
        self.held = [false; 4];
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.held.iter().any(|h| *h)
    }

    /// -1, 0 or 1 along one axis. Opposing keys cancel out.
    #[must_use]
    pub fn axis(&self, vertical: bool) -> i32 {
        let (negative, positive) = if vertical {
            (Direction::North, Direction::South)
        } else {
            (Direction::West, Direction::East)
        };
        match (self.is_held(negative), self.is_held(positive)) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        }
    }
}

/// Stop-start movement for humans and the camera: directional keys at a walking or
/// sprinting speed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Movement {
    pub keys: DirectionalKeys,
    pub speed: f64,
    pub sprint_speed: f64,
    pub sprint: bool,
}

impl Movement {
    #[must_use]
    pub fn new(speed: f64, sprint_speed: f64) -> Self {
        Movement {
            keys: DirectionalKeys::default(),
            speed,
            sprint_speed,
            sprint: false,
        }
    }

    /// A walking speed in `[min, fast)` and a sprint speed above it, capped by `max`.
    pub fn random<R: Rng + ?Sized>(min: f64, fast: f64, max: f64, rng: &mut R) -> Self {
        let speed = rng.random_range(min..fast);
        let extra = (max - speed / 2.0).max(f64::EPSILON);
        Movement::new(speed, speed + rng.random_range(0.0..extra))
    }

    #[must_use]
    pub fn current_speed(&self) -> f64 {
        if self.sprint {
            self.sprint_speed
        } else {
            self.speed
        }
    }

    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        let speed = self.current_speed();
        Vec2::new(
            f64::from(self.keys.axis(false)) * speed,
            f64::from(self.keys.axis(true)) * speed,
        )
    }

    /// Applies a key press or release. Returns false for keys that do not affect movement.
    pub fn handle(&mut self, key: Key, down: bool) -> bool {
        if key == Key::Boost {
            self.sprint = down;
            return true;
        }
        match key.direction() {
            Some(direction) => {
                self.keys.set(direction, down);
                true
            }
            None => false,
        }
    }

    /// Holds only the key for `direction`.
    pub fn move_in_direction(&mut self, direction: Direction) {
        self.keys.release_all();
        self.keys.set(direction, true);
    }

    pub fn halt(&mut self) {
        self.keys.release_all();
    }
}

pub enum Controller {
    Human(HumanController),
    Vehicle(VehicleController),
}

impl Controller {
    #[must_use]
    pub fn as_human(&self) -> Option<&HumanController> {
        match self {
            Controller::Human(c) => Some(c),
            Controller::Vehicle(_) => None,
        }
    }

    pub fn as_human_mut(&mut self) -> Option<&mut HumanController> {
        match self {
            Controller::Human(c) => Some(c),
            Controller::Vehicle(_) => None,
        }
    }

    #[must_use]
    pub fn as_vehicle(&self) -> Option<&VehicleController> {
        match self {
            Controller::Vehicle(c) => Some(c),
            Controller::Human(_) => None,
        }
    }

    pub fn as_vehicle_mut(&mut self) -> Option<&mut VehicleController> {
        match self {
            Controller::Vehicle(c) => Some(c),
            Controller::Human(_) => None,
        }
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        if let Controller::Human(c) = self {
            c.suppressed = suppressed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn keys_map_to_directions() {
        assert_eq!(Key::Up.direction(), Some(Direction::North));
        assert_eq!(Key::Left.direction(), Some(Direction::West));
        assert_eq!(Key::Down.direction(), Some(Direction::South));
        assert_eq!(Key::Right.direction(), Some(Direction::East));
        assert_eq!(Key::Brake.direction(), None);
        for direction in Direction::ALL {
            assert_eq!(Key::from_direction(direction).direction(), Some(direction));
        }
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut keys = DirectionalKeys::default();
        assert_eq!(keys.axis(false), 0);
        keys.set(Direction::West, true);
        assert_eq!(keys.axis(false), -1);
        keys.set(Direction::East, true);
        assert_eq!(keys.axis(false), 0);
        keys.set(Direction::South, true);
        assert_eq!(keys.axis(true), 1);
        keys.release_all();
        assert!(!keys.any());
    }

    #[test]
    fn boost_switches_to_sprint_speed() {
        let mut movement = Movement::new(80.0, 150.0);
        movement.handle(Key::Right, true);
        assert_eq!(movement.velocity(), Vec2::new(80.0, 0.0));
        movement.handle(Key::Boost, true);
        assert_eq!(movement.velocity(), Vec2::new(150.0, 0.0));
        assert!(!movement.handle(Key::Interact, true));
        movement.move_in_direction(Direction::North);
        assert_eq!(movement.velocity(), Vec2::new(0.0, -150.0));
    }

    #[test]
    fn random_human_speeds_are_in_range() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..100 {
            let movement = Movement::random(
                HUMAN_MIN_SPEED,
                HUMAN_FAST_SPEED,
                HUMAN_MAX_SPEED,
                &mut rng,
            );
            assert!((HUMAN_MIN_SPEED..HUMAN_FAST_SPEED).contains(&movement.speed));
            assert!(movement.sprint_speed >= movement.speed);
            assert!(movement.sprint_speed < movement.speed + HUMAN_MAX_SPEED - movement.speed / 2.0);
        }
    }
}
