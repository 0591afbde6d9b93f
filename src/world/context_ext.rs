use super::{loader, LayerKind, World, WorldId, WorldKind};
use crate::context::{Context, DataPlugin};
use crate::entity::{ContextEntityExt, EntityKind};
use crate::error::CityError;
use crate::geometry::pixel_to_tile;
use log::debug;
use std::path::Path;

#[derive(Default)]
pub struct WorldData {
    worlds: Vec<World>,
}

impl DataPlugin for WorldData {
    fn init() -> Self {
        WorldData::default()
    }
}

pub trait ContextWorldExt {
    /// Reserves the id the next added world will get.
    fn next_world_id(&self) -> WorldId;

    fn add_world(&mut self, world: World) -> WorldId;

    /// Loads an outside world, its buildings and their interiors from a map file.
    fn load_world(&mut self, path: &Path) -> Result<WorldId, CityError>;

    fn world(&self, id: WorldId) -> &World;

    fn world_mut(&mut self, id: WorldId) -> &mut World;

    fn world_ids(&self) -> Vec<WorldId>;

    fn outside_world_ids(&self) -> Vec<WorldId>;

    /// Text rendering of a world's terrain with entities drawn on top.
    fn render_ascii(&self, id: WorldId) -> String;
}

impl ContextWorldExt for Context {
    fn next_world_id(&self) -> WorldId {
        WorldId(
            self.get_data_container::<WorldData>()
                .map_or(0, |data| data.worlds.len()),
        )
    }

    fn add_world(&mut self, mut world: World) -> WorldId {
        let data = self.get_data_container_mut::<WorldData>();
        let id = WorldId(data.worlds.len());
        world.id = id;
        debug!("added world '{}' as {id}", world.name);
        data.worlds.push(world);
        id
    }

    fn load_world(&mut self, path: &Path) -> Result<WorldId, CityError> {
        loader::load_world(self, path, WorldKind::Outside)
    }

    fn world(&self, id: WorldId) -> &World {
        &self
            .get_data_container::<WorldData>()
            .expect("no worlds have been added")
            .worlds[id.0]
    }

    fn world_mut(&mut self, id: WorldId) -> &mut World {
        &mut self.get_data_container_mut::<WorldData>().worlds[id.0]
    }

    fn world_ids(&self) -> Vec<WorldId> {
        self.get_data_container::<WorldData>()
            .map(|data| data.worlds.iter().map(|w| w.id).collect())
            .unwrap_or_default()
    }

    fn outside_world_ids(&self) -> Vec<WorldId> {
        self.get_data_container::<WorldData>()
            .map(|data| {
                data.worlds
                    .iter()
                    .filter(|w| w.is_outside())
                    .map(|w| w.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn render_ascii(&self, id: WorldId) -> String {
        let world = self.world(id);
        let mut rows: Vec<Vec<char>> = world
            .to_ascii(LayerKind::Terrain)
            .lines()
            .map(|line| {
                let mut row: Vec<char> = line.chars().collect();
                row.resize(usize::try_from(world.tile_width()).unwrap_or(0), ' ');
                row
            })
            .collect();

        for entity_id in world.entities() {
            let entity = self.entity(*entity_id);
            if entity.dead {
                continue;
            }
            let (x, y) = pixel_to_tile(entity.transform);
            let glyph = match (entity.kind, entity.visible) {
                (EntityKind::Human, true) => 'H',
                (EntityKind::Human, false) => 'h',
                (EntityKind::Vehicle, _) => 'V',
            };
            if let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) {
                if let Some(cell) = rows.get_mut(y).and_then(|row| row.get_mut(x)) {
                    *cell = glyph;
                }
            }
        }

        rows.into_iter()
            .map(|row| row.into_iter().collect::<String>().trim_end().to_string() + "\n")
            .collect()
    }
}
