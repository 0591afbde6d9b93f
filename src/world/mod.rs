/*!
Tile worlds.

A world is a stack of tile layers plus a grid of collision rects and a list of interaction
rects. The outside world has an overterrain layer drawn above entities; building interiors
treat blank tiles as walls. Entities are referenced by id: the world only tracks which
entities are in it (through a buffer flushed at the end of each tick) and where they are in
its spatial grid.
*/

mod ascii;
mod context_ext;
mod grid;
mod loader;

pub use context_ext::{ContextWorldExt, WorldData};
pub use grid::{CellPos, EntityGrid};
pub use loader::{load_world, TiledMap};

use crate::block::{Block, BlockType};
use crate::building::BuildingId;
use crate::entity::{EntityId, EntityKind};
use crate::error::CityError;
use crate::geometry::{
    add_direction, pixel_to_tile, tile_size, tile_to_pixel, Direction, Rect, TilePos, TileRect,
    Vec2,
};
use crate::navigation::NavigationGraph;
use crate::roadmap::RoadMap;
use crate::HashMap;
use rand::Rng;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub(crate) usize);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Overterrain,
    Underterrain,
    Terrain,
    Objects,
}

impl LayerKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Overterrain => "overterrain",
            LayerKind::Underterrain => "underterrain",
            LayerKind::Terrain => "terrain",
            LayerKind::Objects => "objects",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<LayerKind> {
        match name {
            "overterrain" => Some(LayerKind::Overterrain),
            "underterrain" => Some(LayerKind::Underterrain),
            "terrain" => Some(LayerKind::Terrain),
            "objects" => Some(LayerKind::Objects),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorldKind {
    Outside,
    Interior { building: BuildingId },
}

pub struct Layer {
    pub kind: LayerKind,
    pub draw_above: bool,
    pub solid_blanks: bool,
    blocks: Vec<Option<Block>>,
}

/// A spawn area in pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Spawn {
    pub position: Vec2,
    pub orientation: Direction,
    pub width: f64,
    pub height: f64,
}

impl Spawn {
    #[must_use]
    pub fn new(position: Vec2, orientation: Direction) -> Self {
        Spawn {
            position,
            orientation,
            width: tile_size(),
            height: tile_size(),
        }
    }
}

pub struct World {
    pub id: WorldId,
    pub name: String,
    pub kind: WorldKind,
    tile_width: i32,
    tile_height: i32,
    layers: Vec<Layer>,
    collision_rects: Vec<Option<Rect>>,
    interact_rects: Vec<Rect>,
    spawns: HashMap<EntityKind, Vec<Spawn>>,
    entities: Vec<EntityId>,
    entity_buffer: Vec<(EntityId, bool)>,
    pub entity_grid: EntityGrid,
    pub half_block_boundaries: bool,
    pub buildings: Vec<BuildingId>,
    pub roadmap: RoadMap,
    pub nav_graph: Option<NavigationGraph>,
}

impl World {
    pub fn new(id: WorldId, name: &str, kind: WorldKind, tile_width: i32, tile_height: i32) -> Self {
        let cells = usize::try_from(tile_width.max(0) * tile_height.max(0)).unwrap_or(0);
        let layer = |kind, draw_above, solid_blanks| Layer {
            kind,
            draw_above,
            solid_blanks,
            blocks: vec![None; cells],
        };
        let (layers, half_block_boundaries) = match kind {
            WorldKind::Outside => (
                vec![
                    layer(LayerKind::Overterrain, true, false),
                    layer(LayerKind::Underterrain, false, false),
                    layer(LayerKind::Terrain, false, false),
                    layer(LayerKind::Objects, false, false),
                ],
                true,
            ),
            WorldKind::Interior { .. } => (
                vec![
                    layer(LayerKind::Underterrain, false, false),
                    layer(LayerKind::Terrain, false, true),
                    layer(LayerKind::Objects, false, false),
                ],
                false,
            ),
        };

        World {
            id,
            name: name.to_string(),
            kind,
            tile_width,
            tile_height,
            layers,
            collision_rects: vec![None; cells],
            interact_rects: Vec::new(),
            spawns: HashMap::default(),
            entities: Vec::new(),
            entity_buffer: Vec::new(),
            entity_grid: EntityGrid::default(),
            half_block_boundaries,
            buildings: Vec::new(),
            roadmap: RoadMap::default(),
            nav_graph: None,
        }
    }

    #[must_use]
    pub fn tile_width(&self) -> i32 {
        self.tile_width
    }

    #[must_use]
    pub fn tile_height(&self) -> i32 {
        self.tile_height
    }

    #[must_use]
    pub fn pixel_width(&self) -> f64 {
        f64::from(self.tile_width) * tile_size()
    }

    #[must_use]
    pub fn pixel_height(&self) -> f64 {
        f64::from(self.tile_height) * tile_size()
    }

    #[must_use]
    pub fn is_outside(&self) -> bool {
        self.kind == WorldKind::Outside
    }

    #[must_use]
    pub fn is_in_range(&self, tile: TilePos) -> bool {
        (0..self.tile_width).contains(&tile.0) && (0..self.tile_height).contains(&tile.1)
    }

    fn index(&self, tile: TilePos) -> Option<usize> {
        self.is_in_range(tile)
            .then(|| usize::try_from(tile.1 * self.tile_width + tile.0).ok())
            .flatten()
    }

    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    fn layer_mut(&mut self, kind: LayerKind) -> Result<&mut Layer, CityError> {
        self.layers
            .iter_mut()
            .find(|l| l.kind == kind)
            .ok_or_else(|| CityError::UnknownLayer(kind.name().to_string()))
    }

    #[must_use]
    pub fn get_block(&self, tile: TilePos, layer: LayerKind) -> Option<&Block> {
        let index = self.index(tile)?;
        self.layer(layer)?.blocks[index].as_ref()
    }

    /// The uppermost collidable or interactable block at `tile`.
    #[must_use]
    pub fn get_solid_block(&self, tile: TilePos) -> Option<&Block> {
        let index = self.index(tile)?;
        self.layers.iter().rev().find_map(|layer| {
            layer.blocks[index].as_ref().filter(|b| {
                b.blocktype.is_collidable() || b.blocktype.is_interactable()
            })
        })
    }

    /// The door or mat at `tile`, on any layer.
    #[must_use]
    pub fn get_interactable_block(&self, tile: TilePos) -> Option<&Block> {
        let index = self.index(tile)?;
        self.layers.iter().rev().find_map(|layer| {
            layer.blocks[index]
                .as_ref()
                .filter(|b| b.blocktype.is_interactable())
        })
    }

    /// A door or mat owned by a building at `tile`.
    #[must_use]
    pub fn get_door_block(&self, tile: TilePos) -> Option<&Block> {
        self.get_interactable_block(tile)
            .filter(|b| b.building.is_some())
    }

    /// Places `block`. Interactable blocks register an interaction rect; collidable blocks on
    /// layers below the entities write their collision rect when `overwrite_collisions` is set.
    pub fn set_block(
        &mut self,
        tile: TilePos,
        block: Block,
        layer: LayerKind,
        overwrite_collisions: bool,
    ) -> Result<(), CityError> {
        let index = self.index(tile).ok_or_else(|| {
            CityError::InvalidMap(format!(
                "tile {tile:?} is outside the {}x{} world '{}'",
                self.tile_width, self.tile_height, self.name
            ))
        })?;
        let layer = self.layer_mut(layer)?;
        let draw_above = layer.draw_above;
        layer.blocks[index] = Some(block);

        let origin = tile_to_pixel(tile);
        if block.blocktype.is_interactable() {
            self.interact_rects
                .push(Rect::new(origin.x, origin.y, tile_size(), tile_size()));
        }
        if overwrite_collisions && !draw_above && block.blocktype.is_collidable() {
            let (offset, size) = block.collision_rect();
            self.collision_rects[index] =
                Some(Rect::new(origin.x + offset.x, origin.y + offset.y, size.x, size.y));
        }
        Ok(())
    }

    pub fn set_block_type(
        &mut self,
        tile: TilePos,
        blocktype: BlockType,
        layer: LayerKind,
    ) -> Result<(), CityError> {
        self.set_block(tile, Block::new(blocktype), layer, true)
    }

    /// Places a tile read from a map. Empty cells stay empty unless the layer treats blanks as
    /// solid; other blocks collide unless the layer is drawn above entities.
    pub(crate) fn place_tile(
        &mut self,
        tile: TilePos,
        block: Option<Block>,
        layer: LayerKind,
    ) -> Result<(), CityError> {
        let solid_blanks = self.layer_mut(layer)?.solid_blanks;
        match block {
            Some(block) if block.blocktype != BlockType::Blank => {
                self.set_block(tile, block, layer, true)
            }
            _ if solid_blanks => self.set_block(tile, Block::new(BlockType::Blank), layer, true),
            _ => Ok(()),
        }
    }

    /// Mutable access for tagging blocks with their building.
    pub fn get_block_mut(&mut self, tile: TilePos, layer: LayerKind) -> Option<&mut Block> {
        let index = self.index(tile)?;
        self.layers
            .iter_mut()
            .find(|l| l.kind == layer)?
            .blocks[index]
            .as_mut()
    }

    /// Collision rects overlapping `rect`. With `interactables`, the door and mat rects instead.
    #[must_use]
    pub fn get_colliding_blocks(&self, rect: &Rect, interactables: bool) -> Vec<Rect> {
        if interactables {
            return self
                .interact_rects
                .iter()
                .filter(|r| rect.collides(r))
                .copied()
                .collect();
        }

        let (x1, y1) = pixel_to_tile(rect.topleft());
        let (x2, y2) = pixel_to_tile(rect.bottomright());
        let mut rects = Vec::new();
        for y in (y1 - 1)..=(y2 + 1) {
            for x in (x1 - 1)..=(x2 + 1) {
                if let Some(r) = self.index((x, y)).and_then(|i| self.collision_rects[i]) {
                    if rect.collides(&r) {
                        rects.push(r);
                    }
                }
            }
        }
        rects
    }

    /// Column-major iteration over an area of one layer, clipped to the world.
    pub fn iterate_blocks(
        &self,
        area: TileRect,
        layer: LayerKind,
    ) -> impl Iterator<Item = (TilePos, Option<&Block>)> + '_ {
        area.tiles()
            .filter(|tile| self.is_in_range(*tile))
            .map(move |tile| (tile, self.get_block(tile, layer)))
    }

    #[must_use]
    pub fn area(&self) -> TileRect {
        TileRect::new(0, 0, self.tile_width, self.tile_height)
    }

    /// The in-range neighbours of `tile` in direction order.
    #[must_use]
    pub fn surrounding_blocks(
        &self,
        tile: TilePos,
        layer: LayerKind,
    ) -> Vec<(Direction, TilePos, Option<&Block>)> {
        Direction::ALL
            .into_iter()
            .map(|d| (d, add_direction(tile, d, 1)))
            .filter(|(_, t)| self.is_in_range(*t))
            .map(|(d, t)| (d, t, self.get_block(t, layer)))
            .collect()
    }

    /// True if the tile next to `tile` in `direction` is off the map or solid.
    #[must_use]
    pub fn is_direction_blocked(&self, tile: TilePos, direction: Direction) -> bool {
        let next = add_direction(tile, direction, 1);
        !self.is_in_range(next)
            || self
                .get_solid_block(next)
                .is_some_and(|b| b.blocktype.is_collidable())
    }

    /// The terrain type at `tile`, treating empty cells as blank.
    #[must_use]
    pub fn terrain_type(&self, tile: TilePos) -> Option<BlockType> {
        self.is_in_range(tile).then(|| {
            self.get_block(tile, LayerKind::Terrain)
                .map_or(BlockType::Blank, |b| b.blocktype)
        })
    }

    /// A random pixel position that fits an entity of `size`.
    pub fn random_location<R: Rng + ?Sized>(&self, size: Vec2, rng: &mut R) -> Vec2 {
        let max_x = (self.pixel_width() - size.x).max(1.0);
        let max_y = (self.pixel_height() - size.y).max(1.0);
        Vec2::new(rng.random_range(0.0..max_x), rng.random_range(0.0..max_y))
    }

    pub fn add_spawn(&mut self, kind: EntityKind, spawn: Spawn) {
        self.spawns.entry(kind).or_default().push(spawn);
    }

    #[must_use]
    pub fn spawns(&self, kind: EntityKind) -> &[Spawn] {
        self.spawns.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn spawn(&self, kind: EntityKind, index: usize) -> Result<&Spawn, CityError> {
        self.spawns(kind)
            .get(index)
            .ok_or(CityError::MissingSpawn { kind, index })
    }

    /// Entities currently in this world, in the order they arrived.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub(crate) fn queue_entity(&mut self, entity: EntityId, entering: bool) {
        self.entity_buffer.push((entity, entering));
    }

    /// Applies queued arrivals and departures.
    pub fn flush_entity_buffer(&mut self) {
        for (entity, entering) in std::mem::take(&mut self.entity_buffer) {
            let present = self.entities.iter().position(|e| *e == entity);
            match (entering, present) {
                (true, None) => self.entities.push(entity),
                (false, Some(index)) => {
                    self.entities.remove(index);
                }
                _ => {}
            }
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("size", &(self.tile_width, self.tile_height))
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outside(width: i32, height: i32) -> World {
        World::new(WorldId(0), "test", WorldKind::Outside, width, height)
    }

    #[test]
    fn collidable_blocks_write_collision_rects() {
        let mut world = outside(4, 4);
        world
            .set_block((1, 1), Block::new(BlockType::Tree), LayerKind::Objects, true)
            .unwrap();
        let hits = world.get_colliding_blocks(&Rect::new(40.0, 40.0, 10.0, 10.0), false);
        assert_eq!(hits, vec![Rect::new(32.0, 32.0, 32.0, 32.0)]);
        assert!(world
            .get_colliding_blocks(&Rect::new(70.0, 70.0, 10.0, 10.0), false)
            .is_empty());
    }

    #[test]
    fn overterrain_never_collides() {
        let mut world = outside(4, 4);
        world
            .set_block_type((2, 2), BlockType::BuildingWindowOn, LayerKind::Overterrain)
            .unwrap();
        assert!(world
            .get_colliding_blocks(&Rect::new(64.0, 64.0, 32.0, 32.0), false)
            .is_empty());
        assert_eq!(
            world.get_solid_block((2, 2)).map(|b| b.blocktype),
            Some(BlockType::BuildingWindowOn)
        );
    }

    #[test]
    fn interactables_register_interact_rects() {
        let mut world = outside(4, 4);
        world
            .set_block_type((0, 3), BlockType::SlidingDoor, LayerKind::Terrain)
            .unwrap();
        let hits = world.get_colliding_blocks(&Rect::new(10.0, 100.0, 4.0, 4.0), true);
        assert_eq!(hits.len(), 1);
        assert!(world.get_interactable_block((0, 3)).is_some());
        assert!(world.get_door_block((0, 3)).is_none());
    }

    #[test]
    fn unknown_layer_and_out_of_range_fail() {
        let mut world = World::new(
            WorldId(1),
            "inside",
            WorldKind::Interior { building: BuildingId(0) },
            2,
            2,
        );
        assert!(matches!(
            world.set_block_type((0, 0), BlockType::Grass, LayerKind::Overterrain),
            Err(CityError::UnknownLayer(_))
        ));
        assert!(matches!(
            world.set_block_type((5, 0), BlockType::Grass, LayerKind::Terrain),
            Err(CityError::InvalidMap(_))
        ));
    }

    #[test]
    fn direction_blocked_by_edges_and_solids() {
        let mut world = outside(3, 3);
        for tile in world.area().tiles() {
            world
                .set_block_type(tile, BlockType::Grass, LayerKind::Terrain)
                .unwrap();
        }
        world
            .set_block_type((2, 1), BlockType::Water, LayerKind::Terrain)
            .unwrap();
        assert!(world.is_direction_blocked((1, 1), Direction::East));
        assert!(!world.is_direction_blocked((1, 1), Direction::West));
        assert!(world.is_direction_blocked((0, 1), Direction::West));
        assert_eq!(world.surrounding_blocks((0, 0), LayerKind::Terrain).len(), 2);
    }

    #[test]
    fn entity_buffer_applies_in_order() {
        let mut world = outside(2, 2);
        world.queue_entity(EntityId(3), true);
        world.queue_entity(EntityId(4), true);
        assert!(world.entities().is_empty());
        world.flush_entity_buffer();
        assert_eq!(world.entities(), &[EntityId(3), EntityId(4)]);
        world.queue_entity(EntityId(3), false);
        world.queue_entity(EntityId(3), true);
        world.flush_entity_buffer();
        assert_eq!(world.entities(), &[EntityId(4), EntityId(3)]);
    }

    #[test]
    fn missing_spawn_is_an_error() {
        let mut world = outside(2, 2);
        world.add_spawn(EntityKind::Human, Spawn::new(Vec2::new(0.0, 0.0), Direction::North));
        assert!(world.spawn(EntityKind::Human, 0).is_ok());
        assert!(matches!(
            world.spawn(EntityKind::Vehicle, 0),
            Err(CityError::MissingSpawn { index: 0, .. })
        ));
    }
}
