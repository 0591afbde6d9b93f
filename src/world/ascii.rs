//! Text rendering of worlds, and a terrain parser for small hand-drawn maps.

use super::{LayerKind, World, WorldId, WorldKind};
use crate::block::{Block, BlockType};
use crate::error::CityError;

impl World {
    /// One line per tile row, one glyph per tile. Empty cells are spaces.
    #[must_use]
    pub fn to_ascii(&self, layer: LayerKind) -> String {
        let mut out = String::new();
        for y in 0..self.tile_height() {
            let row: String = (0..self.tile_width())
                .map(|x| self.get_block((x, y), layer).map_or(' ', |b| b.blocktype.glyph()))
                .collect();
            out.push_str(row.trim_end());
            out.push('\n');
        }
        out
    }

    /// Builds a world whose terrain is drawn with block glyphs, one string per row.
    pub fn from_ascii(
        id: WorldId,
        name: &str,
        kind: WorldKind,
        rows: &[&str],
    ) -> Result<World, CityError> {
        let height = i32::try_from(rows.len())
            .map_err(|_| CityError::InvalidMap("too many rows".to_string()))?;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let width = i32::try_from(width)
            .map_err(|_| CityError::InvalidMap("row too long".to_string()))?;

        let mut world = World::new(id, name, kind, width, height);
        for (y, row) in (0..).zip(rows) {
            let mut glyphs = row.chars();
            for x in 0..width {
                let glyph = glyphs.next().unwrap_or(' ');
                let block = match BlockType::from_glyph(glyph) {
                    Some(BlockType::Blank) => None,
                    Some(blocktype) => Some(Block::new(blocktype)),
                    None => {
                        return Err(CityError::InvalidMap(format!(
                            "unknown glyph '{glyph}' at ({x}, {y})"
                        )));
                    }
                };
                world.place_tile((x, y), block, LayerKind::Terrain)?;
            }
        }
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::BuildingId;

    #[test]
    fn ascii_round_trip_keeps_terrain() {
        let rows = ["..__..", "======", "..__~~"];
        let world = World::from_ascii(WorldId(0), "test", WorldKind::Outside, &rows).unwrap();
        assert_eq!(world.tile_width(), 6);
        assert_eq!(world.terrain_type((2, 0)), Some(BlockType::Pavement));
        assert_eq!(world.terrain_type((4, 2)), Some(BlockType::Water));
        assert_eq!(world.to_ascii(LayerKind::Terrain), "..__..\n======\n..__~~\n");
    }

    #[test]
    fn interior_blanks_are_solid() {
        let rows = ["    ", " -- ", " MM "];
        let world = World::from_ascii(
            WorldId(1),
            "house",
            WorldKind::Interior { building: BuildingId(0) },
            &rows,
        )
        .unwrap();
        assert_eq!(
            world.get_solid_block((0, 0)).map(|b| b.blocktype),
            Some(BlockType::Blank)
        );
        assert!(world.is_direction_blocked((1, 1), crate::geometry::Direction::West));
        assert!(!world.is_direction_blocked((1, 1), crate::geometry::Direction::East));
    }

    #[test]
    fn unknown_glyph_is_rejected() {
        let result = World::from_ascii(WorldId(0), "bad", WorldKind::Outside, &["..?"]);
        assert!(matches!(result, Err(CityError::InvalidMap(_))));
    }
}
