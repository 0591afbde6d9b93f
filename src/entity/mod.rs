/*!
Humans and vehicles.

Every entity lives in one world and is stored in [`EntityData`], indexed by [`EntityId`]. The
transform is the centre of the collision AABB; the sprite rect hangs from the AABB's top edge,
so an entity's feet are what collides with the world. `ContextEntityExt` is the public API.
*/

mod context_ext;
mod data;
mod physics;

pub(crate) use context_ext::ContextEntityExtInternal;
pub(crate) use data::EntityData;

pub use context_ext::ContextEntityExt;

use crate::context::Event;
use crate::controller::Controller;
use crate::geometry::{pixel_to_tile, tile_size, Direction, Rect, TilePos, Vec2};
use crate::world::{CellPos, WorldId};
use log::warn;
use std::fmt;

/// Index of the driver's seat.
pub const DRIVER_SEAT: usize = 0;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EntityId(pub(crate) usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Human,
    Vehicle,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Human, EntityKind::Vehicle];

    /// Parses the `entitytype` of a spawn area. `all` and anything unrecognised name every kind.
    #[must_use]
    pub fn parse_spawn_type(value: &str) -> Vec<EntityKind> {
        match value.trim().to_ascii_lowercase().as_str() {
            "human" => vec![EntityKind::Human],
            "vehicle" => vec![EntityKind::Vehicle],
            "all" => EntityKind::ALL.to_vec(),
            other => {
                warn!("unknown entity type '{other}', spawning every kind");
                EntityKind::ALL.to_vec()
            }
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Human => "human",
            EntityKind::Vehicle => "vehicle",
        })
    }
}

/// What only one kind of entity has.
#[derive(Clone, Debug, PartialEq)]
pub enum Role {
    Human {
        vehicle: Option<EntityId>,
        interact_aabb: Rect,
    },
    Vehicle {
        seats: [Option<EntityId>; 2],
        colour: [u8; 3],
    },
}

/// Emitted when an entity dies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntityKilledEvent {
    pub entity: EntityId,
    pub kind: EntityKind,
}
impl Event for EntityKilledEvent {}

/// Emitted when a human gets into or out of a vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VehicleEvent {
    pub vehicle: EntityId,
    pub human: EntityId,
    pub seat: usize,
    pub entered: bool,
}
impl Event for VehicleEvent {}

pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub world: WorldId,
    /// Sprite rect.
    pub rect: Rect,
    pub aabb: Rect,
    pub transform: Vec2,
    pub velocity: Vec2,
    pub direction: Direction,
    pub grid_cell: Option<CellPos>,
    pub world_collisions: bool,
    pub collisions_enabled: bool,
    pub world_interactions: bool,
    pub can_leave_world: bool,
    pub dead: bool,
    pub visible: bool,
    /// Face north or south rather than east or west when moving diagonally.
    pub vertical_diagonal: bool,
    pub controller: Option<Controller>,
    pub role: Role,
}

impl Entity {
    fn new(id: EntityId, kind: EntityKind, world: WorldId, role: Role) -> Self {
        let size = tile_size();
        let rect = Rect::new(0.0, 0.0, size, size);
        Entity {
            id,
            kind,
            world,
            rect,
            aabb: rect,
            transform: rect.center(),
            velocity: Vec2::ZERO,
            direction: Direction::South,
            grid_cell: None,
            world_collisions: true,
            collisions_enabled: true,
            world_interactions: kind == EntityKind::Human,
            can_leave_world: false,
            dead: false,
            visible: true,
            vertical_diagonal: true,
            controller: None,
            role,
        }
    }

    /// A 32x32 human with a half-height AABB, 6 px narrower than the sprite, and a smaller
    /// interaction box around its centre.
    pub(crate) fn new_human(id: EntityId, world: WorldId) -> Self {
        let mut entity = Entity::new(
            id,
            EntityKind::Human,
            world,
            Role::Human {
                vehicle: None,
                interact_aabb: Rect::default(),
            },
        );
        let quarter = entity.rect.width / 4.0;
        let interact_aabb = Rect::new(
            quarter,
            0.0,
            entity.rect.width - quarter * 2.0,
            entity.rect.height * 0.6,
        );
        entity.aabb.height /= 2.0;
        entity.aabb = entity.aabb.inflate(-6.0, 0.0);
        entity.role = Role::Human {
            vehicle: None,
            interact_aabb,
        };
        entity.set_position(entity.aabb.center());
        entity
    }

    pub(crate) fn new_vehicle(id: EntityId, world: WorldId, colour: [u8; 3]) -> Self {
        let mut entity = Entity::new(
            id,
            EntityKind::Vehicle,
            world,
            Role::Vehicle {
                seats: [None; 2],
                colour,
            },
        );
        entity.aabb.height /= 2.0;
        entity.set_position(entity.aabb.center());
        entity
    }

    /// Centres the AABB on `position` and moves the other rects with it. Does not touch the
    /// world grid.
    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.aabb.set_center(position);
        self.transform = position;
        self.sync_rects();
    }

    /// Moves the sprite and interaction rects to follow the AABB.
    fn sync_rects(&mut self) {
        self.transform = self.aabb.center();
        self.rect.set_center(self.aabb.midtop());
        if let Role::Human { interact_aabb, .. } = &mut self.role {
            interact_aabb.set_center(self.aabb.center());
        }
    }

    /// Faces `direction`. Vehicles are twice as long as they are wide.
    pub(crate) fn turn(&mut self, direction: Direction) {
        self.direction = direction;
        if self.kind == EntityKind::Vehicle {
            let length = tile_size() * if direction.is_horizontal() { 2.0 } else { 1.0 };
            self.aabb.width = length;
            self.rect.width = length;
            self.set_position(self.transform);
        }
    }

    /// The facing implied by the current velocity, if moving.
    #[must_use]
    pub fn direction_from_velocity(&self) -> Option<Direction> {
        let Vec2 { x, y } = self.velocity;
        if self.velocity.is_zero() {
            return None;
        }
        let direction = if self.vertical_diagonal {
            if y == 0.0 {
                if x > 0.0 { Direction::East } else { Direction::West }
            } else if y < 0.0 {
                Direction::North
            } else {
                Direction::South
            }
        } else if x == 0.0 {
            if y > 0.0 { Direction::South } else { Direction::North }
        } else if x < 0.0 {
            Direction::West
        } else {
            Direction::East
        };
        Some(direction)
    }

    #[must_use]
    pub fn is_moving(&self) -> bool {
        !self.velocity.is_zero()
    }

    #[must_use]
    pub fn tile(&self) -> TilePos {
        pixel_to_tile(self.transform)
    }

    #[must_use]
    pub fn interact_aabb(&self) -> Option<Rect> {
        match &self.role {
            Role::Human { interact_aabb, .. } => Some(*interact_aabb),
            Role::Vehicle { .. } => None,
        }
    }

    /// The vehicle a human is riding in.
    #[must_use]
    pub fn vehicle(&self) -> Option<EntityId> {
        match &self.role {
            Role::Human { vehicle, .. } => *vehicle,
            Role::Vehicle { .. } => None,
        }
    }

    #[must_use]
    pub fn seats(&self) -> &[Option<EntityId>] {
        match &self.role {
            Role::Vehicle { seats, .. } => seats,
            Role::Human { .. } => &[],
        }
    }

    #[must_use]
    pub fn colour(&self) -> Option<[u8; 3]> {
        match &self.role {
            Role::Vehicle { colour, .. } => Some(*colour),
            Role::Human { .. } => None,
        }
    }

    #[must_use]
    pub fn driver(&self) -> Option<EntityId> {
        self.seats().get(DRIVER_SEAT).copied().flatten()
    }

    pub fn passengers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.seats().iter().flatten().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passengers().next().is_none()
    }

    #[must_use]
    pub fn first_free_seat(&self) -> Option<usize> {
        self.seats().iter().position(Option::is_none)
    }

    #[must_use]
    pub fn first_full_seat(&self) -> Option<usize> {
        self.seats().iter().position(Option::is_some)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("world", &self.world)
            .field("transform", &self.transform)
            .field("direction", &self.direction)
            .field("dead", &self.dead)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_boxes_hang_from_the_aabb() {
        let mut human = Entity::new_human(EntityId(0), WorldId(0));
        assert_eq!((human.aabb.width, human.aabb.height), (26.0, 16.0));
        human.set_position(Vec2::new(100.0, 100.0));
        assert_eq!(human.transform, Vec2::new(100.0, 100.0));
        assert_eq!(human.rect.center(), Vec2::new(100.0, 92.0));
        let interact = human.interact_aabb().unwrap();
        assert_eq!(interact.center(), Vec2::new(100.0, 100.0));
        assert_eq!(interact.width, 16.0);
        assert!((interact.height - 19.2).abs() < 1e-9);
    }

    #[test]
    fn vehicles_stretch_when_horizontal() {
        let mut vehicle = Entity::new_vehicle(EntityId(1), WorldId(0), [200, 80, 10]);
        vehicle.set_position(Vec2::new(64.0, 64.0));
        assert_eq!((vehicle.aabb.width, vehicle.aabb.height), (32.0, 16.0));
        vehicle.turn(Direction::East);
        assert_eq!(vehicle.aabb.width, 64.0);
        assert_eq!(vehicle.aabb.center(), Vec2::new(64.0, 64.0));
        assert_eq!(vehicle.rect.center(), Vec2::new(64.0, 56.0));
        vehicle.turn(Direction::North);
        assert_eq!(vehicle.aabb.width, 32.0);
    }

    #[test]
    fn diagonal_facing_rules() {
        let mut human = Entity::new_human(EntityId(0), WorldId(0));
        assert_eq!(human.direction_from_velocity(), None);
        human.velocity = Vec2::new(10.0, -10.0);
        assert_eq!(human.direction_from_velocity(), Some(Direction::North));
        human.vertical_diagonal = false;
        assert_eq!(human.direction_from_velocity(), Some(Direction::East));
        human.velocity = Vec2::new(0.0, 5.0);
        assert_eq!(human.direction_from_velocity(), Some(Direction::South));
    }

    #[test]
    fn seats_fill_in_order() {
        let mut vehicle = Entity::new_vehicle(EntityId(1), WorldId(0), [0, 0, 0]);
        assert!(vehicle.is_empty());
        assert_eq!(vehicle.first_free_seat(), Some(0));
        if let Role::Vehicle { seats, .. } = &mut vehicle.role {
            seats[1] = Some(EntityId(4));
        }
        assert_eq!(vehicle.driver(), None);
        assert_eq!(vehicle.first_full_seat(), Some(1));
        assert_eq!(vehicle.passengers().collect::<Vec<_>>(), vec![EntityId(4)]);
    }

    #[test]
    fn spawn_types_parse() {
        assert_eq!(EntityKind::parse_spawn_type("Human"), vec![EntityKind::Human]);
        assert_eq!(EntityKind::parse_spawn_type(" vehicle"), vec![EntityKind::Vehicle]);
        assert_eq!(EntityKind::parse_spawn_type("all"), EntityKind::ALL.to_vec());
        assert_eq!(EntityKind::parse_spawn_type("dragon"), EntityKind::ALL.to_vec());
        assert_eq!(EntityKind::parse_spawn_type(""), EntityKind::ALL.to_vec());
    }
}
