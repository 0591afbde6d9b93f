/*!
Pedestrian navigation.

The walkable area is covered greedily with maximal rectangles of the primary block type. Each
rectangle contributes two nodes: its top-left tile and the tile at the far end of its long
axis. Nodes that can see each other along a row or column are joined by an edge whose weight
is the sum of the tiles crossed, so paths prefer pavement but can cross roads.
*/

use crate::block::BlockType;
use crate::geometry::{add_direction, Direction, TilePos, TileRect};
use crate::world::World;
use log::trace;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

pub type Path = Vec<TilePos>;

/// Secondary block types crossable by pedestrians, with their per-tile cost.
pub const PAVEMENT_SECONDARIES: [(BlockType, u32); 2] =
    [(BlockType::Road, 5), (BlockType::Cobblestone, 2)];

#[derive(Clone, Debug, Default)]
pub struct NavigationGraph {
    graph: BTreeMap<TilePos, BTreeMap<TilePos, u32>>,
    rects: Vec<TileRect>,
}

enum TileCheck {
    OutOfRange,
    WrongType,
    Valid,
}

fn check_tile(world: &World, tile: TilePos, blocktype: Option<BlockType>) -> TileCheck {
    match world.terrain_type(tile) {
        None => TileCheck::OutOfRange,
        Some(found) if blocktype.is_some_and(|b| b != found) => TileCheck::WrongType,
        Some(_) => TileCheck::Valid,
    }
}

fn check_rect(world: &World, rect: TileRect, blocktype: Option<BlockType>) -> bool {
    rect.width > 0
        && rect.height > 0
        && rect
            .tiles()
            .all(|tile| matches!(check_tile(world, tile, blocktype), TileCheck::Valid))
}

/// Grows a one-tile rect at `tile` one side at a time, in direction order, until no side can
/// grow without covering a tile of another type. `stop` is checked after every successful
/// expansion and ends the growth early.
fn max_expansion(
    world: &World,
    tile: TilePos,
    blocktype: Option<BlockType>,
    mut stop: impl FnMut(&TileRect) -> bool,
) -> TileRect {
    let mut rect = TileRect::unit(tile);
    let mut open = [true; 4];
    loop {
        let mut expanded = false;
        for direction in Direction::ALL {
            if !open[direction.index()] {
                continue;
            }
            expanded = true;
            rect.expand(direction, 1);
            if check_rect(world, rect, blocktype) {
                if stop(&rect) {
                    return rect;
                }
            } else {
                rect.expand(direction, -1);
                open[direction.index()] = false;
            }
        }
        if !expanded {
            return rect;
        }
    }
}

#[derive(PartialEq)]
struct Frontier {
    priority: f64,
    node: TilePos,
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // lowest priority first out of the max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn heuristic(a: TilePos, b: TilePos) -> f64 {
    f64::from(b.0 - a.0).hypot(f64::from(b.1 - a.1))
}

impl NavigationGraph {
    /// Pavement graph, crossing roads and cobblestones at a higher cost.
    #[must_use]
    pub fn generate_for_pavement(world: &World) -> Self {
        Self::generate(world, BlockType::Pavement, &PAVEMENT_SECONDARIES)
    }

    #[must_use]
    pub fn generate(world: &World, primary: BlockType, secondaries: &[(BlockType, u32)]) -> Self {
        let mut positions: BTreeSet<TilePos> = world
            .area()
            .tiles()
            .filter(|tile| world.terrain_type(*tile) == Some(primary))
            .collect();

        let mut rects = Vec::new();
        while let Some(next) = positions.pop_first() {
            let rect = max_expansion(world, next, Some(primary), |_| false);
            for tile in rect.tiles() {
                positions.remove(&tile);
            }
            rects.push(rect);
        }

        let mut nodes = BTreeSet::new();
        for rect in &rects {
            nodes.insert(rect.topleft());
            let end = if rect.width > rect.height {
                rect.translate(rect.width - rect.height, 0)
            } else {
                rect.translate(0, rect.height - rect.width)
            };
            nodes.insert(end.topleft());
        }

        let mut graph: BTreeMap<TilePos, BTreeMap<TilePos, u32>> =
            nodes.iter().map(|n| (*n, BTreeMap::new())).collect();
        for node in &nodes {
            for direction in Direction::ALL {
                let mut pos = *node;
                let mut total = 0;
                loop {
                    pos = add_direction(pos, direction, 1);
                    let weight = match check_tile(world, pos, Some(primary)) {
                        TileCheck::OutOfRange => break,
                        TileCheck::Valid => 1,
                        TileCheck::WrongType => {
                            let found = world.terrain_type(pos);
                            match secondaries.iter().find(|(b, _)| Some(*b) == found) {
                                Some((_, weight)) => *weight,
                                None => break,
                            }
                        }
                    };
                    total += weight;
                    if nodes.contains(&pos) {
                        for (a, b) in [(*node, pos), (pos, *node)] {
                            let edge = graph.entry(a).or_default().entry(b).or_insert(total);
                            *edge = (*edge).min(total);
                        }
                        break;
                    }
                }
            }
        }

        trace!(
            "navigation graph: {} rects, {} nodes",
            rects.len(),
            graph.len()
        );
        NavigationGraph { graph, rects }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.graph.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, tile: TilePos) -> bool {
        self.graph.contains_key(&tile)
    }

    /// Neighbours of `node` with the edge weight to each.
    pub fn edges(&self, node: TilePos) -> impl Iterator<Item = (TilePos, u32)> + '_ {
        self.graph
            .get(&node)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(n, w)| (*n, *w)))
    }

    /// The rectangles the graph was built from.
    #[must_use]
    pub fn rects(&self) -> &[TileRect] {
        &self.rects
    }

    /// A* between two nodes. `None` when either is not a node or the goal is unreachable.
    #[must_use]
    pub fn find_path(&self, start: TilePos, goal: TilePos) -> Option<Path> {
        if !self.contains(start) || !self.contains(goal) {
            return None;
        }

        let mut frontier = BinaryHeap::new();
        let mut came_from: BTreeMap<TilePos, TilePos> = BTreeMap::new();
        let mut costs: BTreeMap<TilePos, u32> = BTreeMap::new();
        costs.insert(start, 0);
        frontier.push(Frontier {
            priority: heuristic(start, goal),
            node: start,
        });

        while let Some(Frontier { node: current, .. }) = frontier.pop() {
            if current == goal {
                let mut path = vec![goal];
                let mut node = goal;
                while let Some(previous) = came_from.get(&node) {
                    node = *previous;
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }

            let cost = costs[&current];
            for (neighbour, weight) in self.edges(current) {
                let new_cost = cost + weight;
                if costs.get(&neighbour).is_none_or(|c| new_cost < *c) {
                    costs.insert(neighbour, new_cost);
                    came_from.insert(neighbour, current);
                    frontier.push(Frontier {
                        priority: f64::from(new_cost) + heuristic(neighbour, goal),
                        node: neighbour,
                    });
                }
            }
        }
        None
    }

    /// The first node found by growing a rectangle from `tile` over `blocktype`, or over any
    /// block type when that finds nothing.
    #[must_use]
    pub fn find_nearest_node(
        &self,
        world: &World,
        tile: TilePos,
        blocktype: Option<BlockType>,
    ) -> Option<TilePos> {
        if self.contains(tile) {
            return Some(tile);
        }
        let find_node = |rect: &TileRect| rect.tiles().find(|t| self.contains(*t));

        let rect = max_expansion(world, tile, blocktype, |r| find_node(r).is_some());
        if let Some(node) = find_node(&rect) {
            return Some(node);
        }
        let rect = max_expansion(world, tile, None, |r| find_node(r).is_some());
        find_node(&rect)
    }

    /// Straight steps from `src` to `dest`, closing the longer axis first.
    #[must_use]
    pub fn find_direct_path(src: TilePos, dest: TilePos) -> Path {
        let mut path = vec![src];
        let mut current = src;
        while let Some(direction) = Direction::between(current, dest) {
            current = add_direction(current, direction, 1);
            path.push(current);
        }
        path
    }

    /// Walk to the nearest node, through the graph, then on to `dest`.
    #[must_use]
    pub fn find_walking_path(&self, world: &World, src: TilePos, dest: TilePos) -> Option<Path> {
        let start = self.find_nearest_node(world, src, Some(BlockType::Pavement))?;
        let end = self.find_nearest_node(world, dest, Some(BlockType::Pavement))?;

        let mut path = Self::find_direct_path(src, start);
        let main = self.find_path(start, end)?;
        let suffix = Self::find_direct_path(end, dest);
        path.extend(main.into_iter().skip(1));
        path.extend(suffix.into_iter().skip(1));
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::sorted_abs_difference;
    use crate::world::{WorldId, WorldKind};

    // Two pavements joined by a zebra crossing over the road and by a cobbled path.
    const STREET: [&str; 7] = [
        "__________",
        "==========",
        "==========",
        "____%_____",
        "....%.....",
        "....%.....",
        "..........",
    ];

    fn street() -> World {
        World::from_ascii(WorldId(0), "street", WorldKind::Outside, &STREET).unwrap()
    }

    #[test]
    fn rects_cover_every_pavement_tile() {
        let world = street();
        let graph = NavigationGraph::generate_for_pavement(&world);
        let covered: usize = graph
            .rects()
            .iter()
            .map(|r| usize::try_from(r.width * r.height).unwrap())
            .sum();
        assert_eq!(covered, 19);
        assert!(graph.contains((0, 0)));
        assert!(graph.contains((9, 0)));
        assert!(graph.contains((0, 3)));
    }

    #[test]
    fn road_crossings_cost_more() {
        let world = street();
        let graph = NavigationGraph::generate_for_pavement(&world);
        let edges: BTreeMap<TilePos, u32> = graph.edges((0, 0)).collect();
        // two road tiles then pavement
        assert_eq!(edges.get(&(0, 3)), Some(&11));
        assert_eq!(edges.get(&(9, 0)), Some(&9));
    }

    #[test]
    fn path_steps_between_connected_nodes() {
        let world = street();
        let graph = NavigationGraph::generate_for_pavement(&world);
        let path = graph.find_path((9, 0), (0, 3)).unwrap();
        assert_eq!(path.first(), Some(&(9, 0)));
        assert_eq!(path.last(), Some(&(0, 3)));
        for pair in path.windows(2) {
            assert!(graph.edges(pair[0]).any(|(n, _)| n == pair[1]));
        }
        assert!(graph.find_path((9, 0), (5, 5)).is_none());
    }

    #[test]
    fn nearest_node_falls_back_to_any_block() {
        let world = street();
        let graph = NavigationGraph::generate_for_pavement(&world);
        assert_eq!(graph.find_nearest_node(&world, (0, 0), None), Some((0, 0)));
        let node = graph
            .find_nearest_node(&world, (7, 5), Some(BlockType::Pavement))
            .unwrap();
        assert!(graph.contains(node));
    }

    #[test]
    fn direct_path_is_contiguous() {
        let path = NavigationGraph::find_direct_path((0, 0), (3, 1));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(3, 1)));
        assert_eq!(path.len(), 5);
        for pair in path.windows(2) {
            assert_eq!(sorted_abs_difference(pair[0], pair[1]), [0, 1]);
        }
        assert_eq!(NavigationGraph::find_direct_path((2, 2), (2, 2)), vec![(2, 2)]);
    }

    #[test]
    fn walking_path_joins_legs() {
        let world = street();
        let graph = NavigationGraph::generate_for_pavement(&world);
        let path = graph.find_walking_path(&world, (2, 5), (8, 0)).unwrap();
        assert_eq!(path.first(), Some(&(2, 5)));
        assert_eq!(path.last(), Some(&(8, 0)));
    }
}
