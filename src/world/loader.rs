/*!
Loading worlds from Tiled JSON maps.

Tile layers are row-major gid arrays named after world layers. Object groups carry the extra
data: `objects` (single tiles anchored one tile low), `_buildings` (rects naming an interior
map), `_spawns` (entity spawn areas) and `_road` (road discovery starts). Object coordinates are
in map file units, `TILESET_RESOLUTION` per tile.
*/

use super::{ContextWorldExt, LayerKind, Spawn, World, WorldId, WorldKind};
use crate::block::Block;
use crate::building::ContextBuildingExt;
use crate::context::Context;
use crate::entity::EntityKind;
use crate::error::CityError;
use crate::geometry::{tile_size, Direction, TilePos, TileRect, Vec2, TILESET_RESOLUTION, TILE_SIZE};
use crate::navigation::NavigationGraph;
use crate::random::ContextRandomExt;
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;

crate::define_rng!(MapRng);

#[derive(Debug, Deserialize)]
pub struct TiledMap {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub layers: Vec<TiledLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TiledLayer {
    #[serde(rename = "tilelayer")]
    Tiles { name: String, data: Vec<u32> },
    #[serde(rename = "objectgroup")]
    Objects {
        name: String,
        #[serde(default)]
        objects: Vec<TiledObject>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
pub struct TiledObject {
    #[serde(default)]
    pub gid: Option<u32>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
pub struct TiledProperty {
    pub name: String,
    pub value: serde_json::Value,
}

impl TiledObject {
    fn property(&self, name: &str) -> Option<String> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| match &p.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    fn tile(&self) -> TilePos {
        (to_tile(self.x), to_tile(self.y))
    }
}

fn to_tile(units: f64) -> i32 {
    units as i32 / TILESET_RESOLUTION
}

impl TiledMap {
    fn objects<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a TiledObject> + 'a {
        self.layers
            .iter()
            .filter_map(move |layer| match layer {
                TiledLayer::Objects { name, objects } if name == group => Some(objects.iter()),
                _ => None,
            })
            .flatten()
    }
}

pub fn parse_map(path: &Path) -> Result<TiledMap, CityError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CityError::MapParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the map at `path` as a new world. Buildings named by the map are loaded from sibling
/// files as interior worlds.
pub fn load_world(
    context: &mut Context,
    path: &Path,
    kind: WorldKind,
) -> Result<WorldId, CityError> {
    let map = parse_map(path)?;
    let name = path
        .file_stem()
        .map_or_else(|| "world".to_string(), |s| s.to_string_lossy().into_owned());
    let mut world = World::new(context.next_world_id(), &name, kind, map.width, map.height);

    for layer in &map.layers {
        if let TiledLayer::Tiles { name, data } = layer {
            load_tile_layer(&mut world, name, data)?;
        }
    }

    for object in map.objects("objects") {
        let gid = object
            .gid
            .ok_or_else(|| CityError::InvalidMap("tile object without a gid".to_string()))?;
        let (x, y) = object.tile();
        world.set_block((x, y - 1), Block::from_gid(gid)?, LayerKind::Objects, true)?;
    }

    let scale = f64::from(TILE_SIZE / TILESET_RESOLUTION);
    for object in map.objects("_spawns") {
        let (x, y) = object.tile();
        let orientation = object.property("orientation");
        let orientation = context
            .sample::<MapRng, _>(|rng| Direction::parse_orientation(orientation.as_deref(), rng));
        let mut spawn = Spawn::new(
            Vec2::new(f64::from(x) * tile_size(), f64::from(y + 1) * tile_size()),
            orientation,
        );
        if object.width > 0.0 {
            spawn.width = object.width * scale;
        }
        if object.height > 0.0 {
            spawn.height = object.height * scale;
        }
        let entitytype = object.property("entitytype").unwrap_or_default();
        for kind in EntityKind::parse_spawn_type(&entitytype) {
            world.add_spawn(kind, spawn);
        }
    }

    let mut roadmap = std::mem::take(&mut world.roadmap);
    for start in map.objects("_road") {
        roadmap.begin_discovery(&world, start.tile());
    }
    world.roadmap = roadmap;

    if world.is_outside() {
        let graph = NavigationGraph::generate_for_pavement(&world);
        if !graph.is_empty() {
            world.nav_graph = Some(graph);
        }
    }

    let world_id = context.add_world(world);

    let map_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for object in map.objects("_buildings") {
        let (x, y) = object.tile();
        let rect = TileRect::new(x, y, to_tile(object.width), to_tile(object.height));
        let building = object
            .property("building")
            .ok_or_else(|| CityError::InvalidMap(format!("building zone at {:?} has no name", (x, y))))?;
        context.create_building(world_id, rect, &building, map_dir)?;
    }

    info!("World loaded: [{}]", path.display());
    debug!(
        "{}: {} roads, {} navigation nodes",
        world_id,
        context.world(world_id).roadmap.roads().len(),
        context
            .world(world_id)
            .nav_graph
            .as_ref()
            .map_or(0, NavigationGraph::node_count)
    );
    Ok(world_id)
}

fn load_tile_layer(world: &mut World, name: &str, data: &[u32]) -> Result<(), CityError> {
    let kind = LayerKind::from_name(name).ok_or_else(|| CityError::UnknownLayer(name.to_string()))?;
    let width = world.tile_width();
    let expected = usize::try_from(width * world.tile_height()).unwrap_or(0);
    if data.len() != expected {
        return Err(CityError::InvalidMap(format!(
            "layer '{name}' has {} tiles, expected {expected}",
            data.len()
        )));
    }

    for (tile, gid) in (0..).zip(data) {
        let block = match gid {
            0 => None,
            gid => Some(Block::from_gid(*gid)?),
        };
        world.place_tile((tile % width, tile / width), block, kind)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;
    use std::io::Write;

    fn write_map(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_layers_objects_and_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_map(
            dir.path(),
            "tiny.json",
            r#"{
                "width": 3, "height": 2,
                "layers": [
                    {"type": "tilelayer", "name": "terrain", "data": [2, 2, 5, 2, 7, 5]},
                    {"type": "objectgroup", "name": "objects",
                     "objects": [{"gid": 9, "x": 16, "y": 32}]},
                    {"type": "objectgroup", "name": "_spawns",
                     "objects": [{"x": 32, "y": 0, "width": 16, "height": 16,
                                  "properties": [{"name": "orientation", "type": "string", "value": "E"},
                                                 {"name": "entitytype", "type": "string", "value": "human"}]}]},
                    {"type": "imagelayer", "name": "background"}
                ]
            }"#,
        );

        let mut context = Context::new();
        context.init_random(1);
        let id = context.load_world(&path).unwrap();
        assert_eq!(id, WorldId(0));
        let world = context.world(id);
        assert_eq!(world.name, "tiny");
        assert_eq!(world.terrain_type((2, 0)), Some(BlockType::Pavement));
        assert_eq!(world.terrain_type((1, 1)), Some(BlockType::Water));
        assert_eq!(
            world.get_block((1, 1), LayerKind::Objects).map(|b| b.blocktype),
            Some(BlockType::Tree)
        );
        let spawn = world.spawn(EntityKind::Human, 0).unwrap();
        assert_eq!(spawn.position, Vec2::new(64.0, 32.0));
        assert_eq!(spawn.orientation, Direction::East);
        assert!((spawn.width - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_spawn_types_spawn_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_map(
            dir.path(),
            "plaza.json",
            r#"{
                "width": 2, "height": 2,
                "layers": [
                    {"type": "tilelayer", "name": "terrain", "data": [5, 5, 5, 5]},
                    {"type": "objectgroup", "name": "_spawns",
                     "objects": [{"x": 16, "y": 0,
                                  "properties": [{"name": "orientation", "type": "string", "value": "N"},
                                                 {"name": "entitytype", "type": "string", "value": "pedestrian"}]}]}
                ]
            }"#,
        );

        let mut context = Context::new();
        let id = context.load_world(&path).unwrap();
        let world = context.world(id);
        for kind in EntityKind::ALL {
            let spawn = world.spawn(kind, 0).unwrap();
            assert_eq!(spawn.position, Vec2::new(32.0, 32.0));
            assert_eq!(spawn.orientation, Direction::North);
        }
    }

    #[test]
    fn rejects_unknown_layers_and_bad_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = write_map(
            dir.path(),
            "unknown.json",
            r#"{"width": 1, "height": 1, "layers": [{"type": "tilelayer", "name": "sky", "data": [1]}]}"#,
        );
        let short = write_map(
            dir.path(),
            "short.json",
            r#"{"width": 2, "height": 1, "layers": [{"type": "tilelayer", "name": "terrain", "data": [1]}]}"#,
        );
        let broken = write_map(dir.path(), "broken.json", "{ not json");

        let mut context = Context::new();
        assert!(matches!(context.load_world(&unknown), Err(CityError::UnknownLayer(_))));
        assert!(matches!(context.load_world(&short), Err(CityError::InvalidMap(_))));
        assert!(matches!(context.load_world(&broken), Err(CityError::MapParse { .. })));
    }
}
