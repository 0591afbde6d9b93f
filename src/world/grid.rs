use crate::entity::EntityId;
use crate::geometry::{tile_size, Vec2};
use crate::HashMap;

/// Width of a grid cell in tiles.
const CELL_TILES: f64 = 4.0;

pub type CellPos = (i32, i32);

/// Spatial hash of the entities in a world. Only enabled entities are in the grid;
/// passengers are taken out while they ride.
#[derive(Debug, Default)]
pub struct EntityGrid {
    cells: HashMap<CellPos, Vec<EntityId>>,
}

impl EntityGrid {
    #[must_use]
    pub fn cell_for(position: Vec2) -> CellPos {
        let cell_size = CELL_TILES * tile_size();
        (
            (position.x / cell_size).floor() as i32,
            (position.y / cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, entity: EntityId, cell: CellPos) {
        let members = self.cells.entry(cell).or_default();
        if !members.contains(&entity) {
            members.push(entity);
        }
    }

    pub fn remove(&mut self, entity: EntityId, cell: CellPos) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.retain(|e| *e != entity);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Moves `entity` between cells, returning its new cell.
    pub fn relocate(&mut self, entity: EntityId, from: Option<CellPos>, position: Vec2) -> CellPos {
        let to = Self::cell_for(position);
        if from != Some(to) {
            if let Some(from) = from {
                self.remove(entity, from);
            }
            self.insert(entity, to);
        }
        to
    }

    #[must_use]
    pub fn cell(&self, cell: CellPos) -> &[EntityId] {
        self.cells.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Entities in the 3x3 block of cells around `cell`.
    pub fn neighbours(&self, cell: CellPos) -> impl Iterator<Item = EntityId> + '_ {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (cell.0 + dx, cell.1 + dy)))
            .flat_map(|c| self.cell(c).iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocation_moves_between_cells() {
        let mut grid = EntityGrid::default();
        let a = EntityId(0);
        let cell = grid.relocate(a, None, Vec2::new(10.0, 10.0));
        assert_eq!(cell, (0, 0));
        let cell = grid.relocate(a, Some(cell), Vec2::new(300.0, 10.0));
        assert_eq!(cell, (2, 0));
        assert!(grid.cell((0, 0)).is_empty());
        assert_eq!(grid.cell((2, 0)), &[a]);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn neighbours_cover_adjacent_cells_only() {
        let mut grid = EntityGrid::default();
        grid.insert(EntityId(0), (0, 0));
        grid.insert(EntityId(1), (1, 1));
        grid.insert(EntityId(2), (3, 0));
        let found: Vec<_> = grid.neighbours((0, 0)).collect();
        assert_eq!(found, vec![EntityId(0), EntityId(1)]);
        grid.remove(EntityId(1), (1, 1));
        assert_eq!(grid.neighbours((0, 0)).count(), 1);
    }
}
