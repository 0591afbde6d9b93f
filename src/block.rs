use crate::building::BuildingId;
use crate::error::CityError;
use crate::geometry::{tile_size, Vec2};
use std::fmt;

const ROTATION_FLAG: u32 = 0x01 << 29;
const VERTICAL_FLAG: u32 = 0x02 << 29;
const HORIZONTAL_FLAG: u32 = 0x04 << 29;
const FLAG_MASK: u32 = ROTATION_FLAG | VERTICAL_FLAG | HORIZONTAL_FLAG;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockType {
    Blank = 0,
    Grass = 1,
    Dirt = 2,
    Road = 3,
    Pavement = 4,
    Sand = 5,
    Water = 6,
    Cobblestone = 7,
    Tree = 8,
    Fence = 9,
    SlidingDoor = 10,
    BuildingWall = 11,
    BuildingWindowOn = 12,
    BuildingWindowOff = 13,
    BuildingRoof = 14,
    BuildingEdge = 15,
    BuildingRoofCorner = 16,
    WoodenFloor = 17,
    EntranceMat = 18,
    Rug = 19,
    RugCorner = 20,
    RugEdge = 21,
}

impl BlockType {
    pub const ALL: [BlockType; 22] = [
        BlockType::Blank,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Road,
        BlockType::Pavement,
        BlockType::Sand,
        BlockType::Water,
        BlockType::Cobblestone,
        BlockType::Tree,
        BlockType::Fence,
        BlockType::SlidingDoor,
        BlockType::BuildingWall,
        BlockType::BuildingWindowOn,
        BlockType::BuildingWindowOff,
        BlockType::BuildingRoof,
        BlockType::BuildingEdge,
        BlockType::BuildingRoofCorner,
        BlockType::WoodenFloor,
        BlockType::EntranceMat,
        BlockType::Rug,
        BlockType::RugCorner,
        BlockType::RugEdge,
    ];

    pub fn from_id(id: u32) -> Result<BlockType, CityError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| BlockType::ALL.get(index).copied())
            .ok_or(CityError::UnknownBlock(id))
    }

    #[must_use]
    pub fn id(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn is_collidable(self) -> bool {
        matches!(
            self,
            BlockType::Water
                | BlockType::Tree
                | BlockType::Fence
                | BlockType::BuildingRoof
                | BlockType::BuildingWall
                | BlockType::BuildingWindowOff
                | BlockType::BuildingWindowOn
                | BlockType::BuildingEdge
                | BlockType::Blank
        )
    }

    #[must_use]
    pub fn is_interactable(self) -> bool {
        matches!(self, BlockType::SlidingDoor | BlockType::EntranceMat)
    }

    /// Unsafe blocks are walkable but dangerous, like roads.
    #[must_use]
    pub fn is_unsafe(self) -> bool {
        matches!(self, BlockType::Road)
    }

    #[must_use]
    pub fn is_window(self) -> bool {
        matches!(self, BlockType::BuildingWindowOn | BlockType::BuildingWindowOff)
    }

    /// Glyph used by the text renderer.
    #[must_use]
    pub fn glyph(self) -> char {
        match self {
            BlockType::Blank => ' ',
            BlockType::Grass => '.',
            BlockType::Dirt => ',',
            BlockType::Road => '=',
            BlockType::Pavement => '_',
            BlockType::Sand => ':',
            BlockType::Water => '~',
            BlockType::Cobblestone => '%',
            BlockType::Tree => 'T',
            BlockType::Fence => '+',
            BlockType::SlidingDoor => 'D',
            BlockType::BuildingWall => '#',
            BlockType::BuildingWindowOn => 'O',
            BlockType::BuildingWindowOff => 'o',
            BlockType::BuildingRoof => '^',
            BlockType::BuildingEdge => '|',
            BlockType::BuildingRoofCorner => '*',
            BlockType::WoodenFloor => '-',
            BlockType::EntranceMat => 'M',
            BlockType::Rug => 'r',
            BlockType::RugCorner => 'c',
            BlockType::RugEdge => 'e',
        }
    }

    #[must_use]
    pub fn from_glyph(glyph: char) -> Option<BlockType> {
        BlockType::ALL.into_iter().find(|b| b.glyph() == glyph)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Flip and rotation flags carried in the top bits of a map gid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rotation {
    pub rotated: bool,
    pub vertical: bool,
    pub horizontal: bool,
}

/// Splits a raw map gid into a block type and its rotation. Gid 0 (no tile) is blank.
pub fn decode_gid(gid: u32) -> Result<(BlockType, Rotation), CityError> {
    let rotation = Rotation {
        rotated: gid & ROTATION_FLAG != 0,
        vertical: gid & VERTICAL_FLAG != 0,
        horizontal: gid & HORIZONTAL_FLAG != 0,
    };
    let id = (gid & !FLAG_MASK).saturating_sub(1);
    Ok((BlockType::from_id(id)?, rotation))
}

/// A placed tile. Doors and mats remember the building they belong to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub blocktype: BlockType,
    pub render_id: u32,
    pub rotation: Rotation,
    pub building: Option<BuildingId>,
}

impl Block {
    #[must_use]
    pub fn new(blocktype: BlockType) -> Self {
        Block {
            blocktype,
            render_id: blocktype.id(),
            rotation: Rotation::default(),
            building: None,
        }
    }

    pub fn from_gid(gid: u32) -> Result<Self, CityError> {
        let (blocktype, rotation) = decode_gid(gid)?;
        Ok(Block {
            blocktype,
            render_id: gid.saturating_sub(1),
            rotation,
            building: None,
        })
    }

    /// Collision rect relative to the tile's top-left corner, as `(offset, size)`.
    #[must_use]
    pub fn collision_rect(&self) -> (Vec2, Vec2) {
        let tile = tile_size();
        if self.blocktype == BlockType::BuildingEdge {
            let width = (tile * 0.8).trunc();
            let offset = if self.rotation.horizontal {
                Vec2::ZERO
            } else {
                Vec2::new((width * 0.2).trunc() + 1.0, 0.0)
            };
            (offset, Vec2::new(width, tile))
        } else {
            (Vec2::ZERO, Vec2::new(tile, tile))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_flags() {
        assert!(BlockType::Blank.is_collidable());
        assert!(BlockType::BuildingWindowOn.is_collidable());
        assert!(!BlockType::Pavement.is_collidable());
        assert!(BlockType::SlidingDoor.is_interactable());
        assert!(BlockType::EntranceMat.is_interactable());
        assert!(!BlockType::SlidingDoor.is_collidable());
        assert!(BlockType::Road.is_unsafe());
    }

    #[test]
    fn gid_decoding_strips_flags() {
        assert_eq!(decode_gid(0).unwrap().0, BlockType::Blank);
        assert_eq!(decode_gid(5).unwrap().0, BlockType::Pavement);
        let (blocktype, rotation) = decode_gid(16 | HORIZONTAL_FLAG).unwrap();
        assert_eq!(blocktype, BlockType::BuildingEdge);
        assert!(rotation.horizontal);
        assert!(!rotation.vertical);
        assert!(matches!(decode_gid(200), Err(CityError::UnknownBlock(199))));
    }

    #[test]
    fn building_edge_collision_rect() {
        let edge = Block::from_gid(16).unwrap();
        let (offset, size) = edge.collision_rect();
        assert_eq!(size, Vec2::new(25.0, 32.0));
        assert_eq!(offset, Vec2::new(6.0, 0.0));

        let flipped = Block::from_gid(16 | HORIZONTAL_FLAG).unwrap();
        assert_eq!(flipped.collision_rect().0, Vec2::ZERO);
        assert_eq!(Block::new(BlockType::Tree).collision_rect().1, Vec2::new(32.0, 32.0));
    }

    #[test]
    fn glyphs_round_trip() {
        for blocktype in BlockType::ALL {
            assert_eq!(BlockType::from_glyph(blocktype.glyph()), Some(blocktype));
        }
    }
}
