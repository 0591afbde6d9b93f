/*!
Buildings: an area of the outside world with sliding doors, windows and an interior world.

Each entrance mat inside creates a door; each sliding door outside supplies the outside
position of the next two doors. Humans walking into a sliding door are moved to the nearest
mat inside, and stepping onto a mat takes them back out.
*/

use crate::block::BlockType;
use crate::context::{Context, DataPlugin, Event};
use crate::entity::{ContextEntityExt, EntityId, EntityKind};
use crate::error::CityError;
use crate::geometry::{distance_sqrd, tile_size, tile_to_pixel, Direction, TilePos, TileRect, Vec2};
use crate::random::ContextRandomExt;
use crate::world::{self, ContextWorldExt, LayerKind, Spawn, WorldId, WorldKind};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

crate::define_rng!(BuildingRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildingId(pub(crate) usize);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building#{}", self.0)
    }
}

/// Emitted when a human goes through a door.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildingMovementEvent {
    pub entity: EntityId,
    pub building: BuildingId,
    pub entered: bool,
}
impl Event for BuildingMovementEvent {}

/// Inside and outside pixel positions of an entrance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Door {
    pub inside: Vec2,
    pub outside: Vec2,
}

#[derive(Debug)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    pub world: WorldId,
    pub inside: WorldId,
    pub rect: TileRect,
    pub doors: Vec<Door>,
    windows: BTreeMap<TilePos, bool>,
}

impl Building {
    fn closest_door(&self, position: Vec2, entering: bool) -> Option<&Door> {
        self.doors.iter().min_by(|a, b| {
            let key = |door: &Door| {
                let target = if entering { door.outside } else { door.inside };
                distance_sqrd(target, position)
            };
            key(a).total_cmp(&key(b))
        })
    }

    /// The outside position for a human leaving from `position` inside.
    #[must_use]
    pub fn closest_exit(&self, position: Vec2) -> Option<Vec2> {
        self.closest_door(position, false).map(|door| door.outside)
    }

    #[must_use]
    pub fn get_window(&self, pos: TilePos) -> Option<bool> {
        self.windows.get(&pos).copied()
    }

    pub fn windows(&self) -> impl Iterator<Item = (TilePos, bool)> + '_ {
        self.windows.iter().map(|(pos, on)| (*pos, *on))
    }
}

#[derive(Default)]
pub struct BuildingData {
    buildings: Vec<Building>,
}

impl DataPlugin for BuildingData {
    fn init() -> Self {
        BuildingData::default()
    }
}

pub trait ContextBuildingExt {
    /// Creates the building covering `rect` in `world`, loading its interior from
    /// `<name>.json` in `map_dir`.
    fn create_building(
        &mut self,
        world: WorldId,
        rect: TileRect,
        name: &str,
        map_dir: &Path,
    ) -> Result<BuildingId, CityError>;

    fn building(&self, id: BuildingId) -> &Building;

    fn building_ids(&self) -> Vec<BuildingId>;

    /// Moves `human` inside through the closest door. Does nothing if they are already inside.
    fn enter_building(&mut self, building: BuildingId, human: EntityId);

    /// Moves `human` out through the closest door. Does nothing if they are not inside.
    fn exit_building(&mut self, building: BuildingId, human: EntityId);

    fn set_window(&mut self, building: BuildingId, pos: TilePos, on: bool) -> Result<(), CityError>;

    /// Flips a random handful of windows to random states.
    fn strobe_windows(&mut self, building: BuildingId) -> Result<(), CityError>;
}

impl ContextBuildingExt for Context {
    fn create_building(
        &mut self,
        world: WorldId,
        rect: TileRect,
        name: &str,
        map_dir: &Path,
    ) -> Result<BuildingId, CityError> {
        let id = BuildingId(
            self.get_data_container::<BuildingData>()
                .map_or(0, |data| data.buildings.len()),
        );
        let inside = world::load_world(
            self,
            &map_dir.join(format!("{name}.json")),
            WorldKind::Interior { building: id },
        )?;

        // find entrance mats inside
        let mut insides = Vec::new();
        let interior = self.world_mut(inside);
        let mats: Vec<TilePos> = interior
            .iterate_blocks(interior.area(), LayerKind::Terrain)
            .filter(|(_, b)| b.is_some_and(|b| b.blocktype == BlockType::EntranceMat))
            .map(|(pos, _)| pos)
            .collect();
        for (x, y) in mats {
            if let Some(block) = interior.get_block_mut((x, y), LayerKind::Terrain) {
                block.building = Some(id);
            }
            let position = tile_to_pixel((x + 1, y));
            insides.push(position);
            interior.add_spawn(EntityKind::Human, Spawn::new(position, Direction::South));
        }

        // find sliding doors in the terrain layer
        let outer = self.world_mut(world);
        let doors: Vec<TilePos> = outer
            .iterate_blocks(rect, LayerKind::Terrain)
            .filter(|(_, b)| b.is_some_and(|b| b.blocktype == BlockType::SlidingDoor))
            .map(|(pos, _)| pos)
            .collect();
        let mut outsides = Vec::new();
        for pos in doors {
            if let Some(block) = outer.get_block_mut(pos, LayerKind::Terrain) {
                block.building = Some(id);
            }
            outsides.push(tile_to_pixel(pos));
            outsides.push(tile_to_pixel(pos));
        }
        if outsides.len() != insides.len() {
            return Err(CityError::MismatchingEntrances {
                building: name.to_string(),
                doors: outsides.len(),
                mats: insides.len(),
            });
        }

        let windows: Vec<TilePos> = outer
            .iterate_blocks(rect, LayerKind::Overterrain)
            .filter(|(_, b)| b.is_some_and(|b| b.blocktype.is_window()))
            .map(|(pos, _)| pos)
            .collect();
        outer.buildings.push(id);

        let building = Building {
            id,
            name: name.to_string(),
            world,
            inside,
            rect,
            doors: insides
                .into_iter()
                .zip(outsides)
                .map(|(inside, outside)| Door { inside, outside })
                .collect(),
            windows: BTreeMap::new(),
        };
        debug!(
            "building '{name}' ({id}) has {} doors and {} windows",
            building.doors.len(),
            windows.len()
        );
        self.get_data_container_mut::<BuildingData>()
            .buildings
            .push(building);

        for pos in windows {
            let power = self.sample_bool::<BuildingRng>(0.5);
            self.set_window(id, pos, power)?;
        }
        Ok(id)
    }

    fn building(&self, id: BuildingId) -> &Building {
        &self
            .get_data_container::<BuildingData>()
            .expect("no buildings have been created")
            .buildings[id.0]
    }

    fn building_ids(&self) -> Vec<BuildingId> {
        self.get_data_container::<BuildingData>()
            .map(|data| data.buildings.iter().map(|b| b.id).collect())
            .unwrap_or_default()
    }

    fn enter_building(&mut self, building: BuildingId, human: EntityId) {
        let (inside, door) = {
            let b = self.building(building);
            if self.entity(human).world == b.inside {
                return;
            }
            match b.closest_door(self.entity(human).transform, true) {
                Some(door) => (b.inside, *door),
                None => return,
            }
        };

        self.entity_mut(human).visible = false;
        self.transfer_entity(human, inside);
        self.move_entity(human, door.inside);
        self.turn_entity(human, Direction::North);
        info!("{human} entered {}", self.building(building).name);
        self.emit_event(BuildingMovementEvent {
            entity: human,
            building,
            entered: true,
        });
    }

    fn exit_building(&mut self, building: BuildingId, human: EntityId) {
        let (outer, door) = {
            let b = self.building(building);
            if self.entity(human).world != b.inside {
                return;
            }
            match b.closest_exit(self.entity(human).transform) {
                Some(door) => (b.world, door),
                None => return,
            }
        };

        // vary the exit point so everyone doesn't appear in the same place
        let tile = tile_size();
        let dx = self.sample_range::<BuildingRng, _, f64>(0.0..tile);
        let dy = self.sample_range::<BuildingRng, _, f64>(0.0..tile / 4.0);
        self.transfer_entity(human, outer);
        self.move_entity(human, Vec2::new(door.x + dx, door.y + tile * 1.5 + dy));
        self.turn_entity(human, Direction::South);
        info!("{human} left {}", self.building(building).name);
        self.emit_event(BuildingMovementEvent {
            entity: human,
            building,
            entered: false,
        });
    }

    fn set_window(&mut self, building: BuildingId, pos: TilePos, on: bool) -> Result<(), CityError> {
        let world = self.building(building).world;
        let blocktype = if on {
            BlockType::BuildingWindowOn
        } else {
            BlockType::BuildingWindowOff
        };
        self.world_mut(world)
            .set_block_type(pos, blocktype, LayerKind::Overterrain)?;
        self.get_data_container_mut::<BuildingData>().buildings[building.0]
            .windows
            .insert(pos, on);
        Ok(())
    }

    fn strobe_windows(&mut self, building: BuildingId) -> Result<(), CityError> {
        let windows: Vec<TilePos> = self.building(building).windows.keys().copied().collect();
        if windows.is_empty() {
            return Ok(());
        }
        let count = self.sample_range::<BuildingRng, _, usize>(2..6);
        for _ in 0..count {
            let pos = windows[self.sample_range::<BuildingRng, _, usize>(0..windows.len())];
            let on = self.sample_bool::<BuildingRng>(0.5);
            self.set_window(building, pos, on)?;
        }
        Ok(())
    }
}
