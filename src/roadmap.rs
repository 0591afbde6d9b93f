/*!
Road discovery.

Starting from a road tile, the road's width and heading are measured, then a line of road
tiles as wide as the road is pushed forward until it runs off the road. Road tiles found just
past either end of the line are forks: consecutive fork tiles form the start line of a branch
road, which is queued and walked the same way. Every road start becomes a node in the road
graph, linked to the roads starting on its forks.
*/

use crate::block::BlockType;
use crate::geometry::{sorted_abs_difference, tile_size, Rect, TilePos, TileRect};
use crate::world::World;
use log::trace;
use std::collections::BTreeSet;

/// Widest road that will be measured.
const MAX_ROAD_WIDTH: i32 = 8;

type Offset = (i32, i32);

fn offset_tile(tile: TilePos, offset: Offset, amount: i32) -> TilePos {
    (tile.0 + offset.0 * amount, tile.1 + offset.1 * amount)
}

fn move_line(line: &[TilePos], amount: i32, direction: Offset) -> Vec<TilePos> {
    line.iter().map(|t| offset_tile(*t, direction, amount)).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub id: usize,
    pub line: Vec<TilePos>,
    pub end_line: Vec<TilePos>,
    pub road_direction: Offset,
    /// -1 if the road heads towards decreasing coordinates.
    pub direction: i32,
    pub vertical_road: bool,
    pub width: usize,
    pub length: i32,
    pub oneway: bool,
    /// Touches the edge of the world.
    pub is_spawn: bool,
    bounds: Vec<Rect>,
}

impl Road {
    fn new(id: usize, line: Vec<TilePos>, road_direction: Offset, length: i32, world: &World) -> Self {
        let vertical_road = road_direction.0 == 0;
        let heading = if vertical_road { road_direction.1 } else { road_direction.0 };
        let mut road = Road {
            id,
            width: line.len(),
            end_line: line.clone(),
            line,
            road_direction,
            direction: if heading < 0 { -1 } else { 1 },
            vertical_road,
            length: 0,
            oneway: false,
            is_spawn: false,
            bounds: Vec::new(),
        };
        road.set_road_length(length, world);
        road
    }

    /// Recomputes the end line, the spawn flag and the lane bounds for a new length.
    pub fn set_road_length(&mut self, length: i32, world: &World) {
        self.length = length;
        self.end_line = move_line(&self.line, length, self.road_direction);
        let (w, h) = (world.tile_width(), world.tile_height());
        self.is_spawn = self
            .line
            .iter()
            .chain(&self.end_line)
            .any(|&(x, y)| x == 0 || y == 0 || x == w - 1 || y == h - 1);

        let Some(start) = self.line.iter().min().copied() else {
            self.bounds.clear();
            return;
        };
        let s = tile_size();
        let across = self.line.len() as f64 * s;
        let mut spanning = Rect::new(f64::from(start.0) * s, f64::from(start.1) * s, s, s);
        let mut starts = Vec::new();
        if self.oneway {
            if self.vertical_road {
                spanning.width = across;
            } else {
                spanning.height = across;
            }
            starts.push(spanning);
        } else if self.vertical_road {
            spanning.width = across / 2.0;
            starts.push(spanning);
            starts.push(Rect { x: spanning.x + spanning.width, ..spanning });
        } else {
            spanning.height = across / 2.0;
            starts.push(spanning);
            starts.push(Rect { y: spanning.y + spanning.height, ..spanning });
        }

        let shift = f64::from(length * self.direction) * s;
        let mut ends: Vec<Rect> = starts
            .iter()
            .map(|r| {
                if self.vertical_road {
                    Rect { y: r.y + shift, ..*r }
                } else {
                    Rect { x: r.x + shift, ..*r }
                }
            })
            .collect();
        if self.direction < 0 {
            starts.reverse();
            ends.reverse();
        }
        self.bounds = starts;
        self.bounds.append(&mut ends);
    }

    #[must_use]
    pub fn left_lane_start(&self) -> Rect {
        self.bounds[0]
    }

    #[must_use]
    pub fn right_lane_start(&self) -> Rect {
        self.bounds[if self.oneway { 0 } else { 1 }]
    }

    #[must_use]
    pub fn left_lane_end(&self) -> Rect {
        self.bounds[if self.oneway { 1 } else { 2 }]
    }

    #[must_use]
    pub fn right_lane_end(&self) -> Rect {
        self.bounds[if self.oneway { 1 } else { 3 }]
    }

    #[must_use]
    pub fn region(&self) -> TileRect {
        TileRect::bounding(self.line.iter().chain(&self.end_line).copied())
            .unwrap_or_else(|| TileRect::new(0, 0, 0, 0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoadNode {
    pub id: usize,
    pub point: TilePos,
    pub edges: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
struct Fork {
    line: Vec<TilePos>,
    width_direction: Offset,
    road_direction: Offset,
}

enum Pending {
    Start(TilePos),
    Fork(Fork),
}

#[derive(Debug, Default)]
pub struct RoadMap {
    roads: Vec<Road>,
    nodes: Vec<RoadNode>,
    regions: Vec<TileRect>,
}

impl RoadMap {
    #[must_use]
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    #[must_use]
    pub fn nodes(&self) -> &[RoadNode] {
        &self.nodes
    }

    /// Roads that reach the world edge, where traffic can enter.
    pub fn spawn_roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.iter().filter(|r| r.is_spawn)
    }

    /// Walks every road reachable from `start`, adding roads and graph nodes.
    pub fn begin_discovery(&mut self, world: &World, start: TilePos) {
        let mut stack = vec![Pending::Start(start)];
        let mut connected: Vec<(TilePos, Vec<Fork>)> = Vec::new();

        while let Some(pending) = stack.pop() {
            let (pos, width, width_direction, road_direction, start_line) = match pending {
                Pending::Fork(fork) => (
                    fork.line[0],
                    fork.line.len(),
                    Some(fork.width_direction),
                    Some(fork.road_direction),
                    Some(fork.line),
                ),
                Pending::Start(pos) => {
                    let (width, width_direction, road_direction) = find_road_width(world, pos);
                    (pos, width, width_direction, road_direction, None)
                }
            };
            let (Some(width_direction), Some(road_direction)) = (width_direction, road_direction)
            else {
                continue;
            };

            let line = start_line.unwrap_or_else(|| {
                (0..width)
                    .map(|i| offset_tile(pos, width_direction, i as i32))
                    .collect()
            });
            let (end_line, forks) = traverse_road(world, &line, width_direction, road_direction);
            let length = sorted_abs_difference(line[0], end_line[0])[1];
            let road = Road::new(self.roads.len(), line, road_direction, length, world);
            trace!(
                "road {} at {:?}: width {}, length {}, heading {:?}",
                road.id, pos, road.width, road.length, road.road_direction
            );

            let forks = filter_forks(world, forks, &self.regions);
            self.regions.push(road.region());
            self.roads.push(road);
            stack.extend(forks.iter().cloned().map(Pending::Fork));
            connected.push((pos, forks));
        }

        self.build_graph(&connected);
    }

    fn build_graph(&mut self, connected: &[(TilePos, Vec<Fork>)]) {
        let first = self.nodes.len();
        for (i, (point, _)) in connected.iter().enumerate() {
            self.nodes.push(RoadNode {
                id: first + i,
                point: *point,
                edges: Vec::new(),
            });
        }

        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];
        for (i, (_, forks)) in connected.iter().enumerate() {
            let node = first + i;
            for fork in forks {
                let other = self
                    .nodes
                    .iter()
                    .find(|n| fork.line.contains(&n.point))
                    .map(|n| n.id);
                if let Some(other) = other {
                    edges[node].insert(other);
                    edges[other].insert(node);
                }
            }
        }
        for (node, set) in self.nodes.iter_mut().zip(edges) {
            node.edges.extend(set);
            node.edges.sort_unstable();
            node.edges.dedup();
        }
    }
}

fn is_road(world: &World, tile: TilePos) -> bool {
    world.terrain_type(tile) == Some(BlockType::Road)
}

fn valid_road_line(world: &World, line: &[TilePos]) -> bool {
    line.iter().all(|t| is_road(world, *t))
}

/// Measures the road at `start`: the narrowest run of road tiles from it gives the width
/// direction, the longest gives the heading. Single-tile roads are not recognised.
fn find_road_width(world: &World, start: TilePos) -> (usize, Option<Offset>, Option<Offset>) {
    let mut min_width = MAX_ROAD_WIDTH;
    let mut max_width = 0;
    let mut width_direction = None;
    let mut road_direction = None;

    for (direction, tile, _) in world.surrounding_blocks(start, crate::world::LayerKind::Terrain) {
        if !is_road(world, tile) {
            continue;
        }
        let offset = direction.offset();
        let mut width = 1;
        while width < MAX_ROAD_WIDTH && is_road(world, offset_tile(start, offset, width)) {
            width += 1;
        }
        if width < min_width {
            min_width = width;
            width_direction = Some(offset);
        }
        if width > max_width {
            max_width = width;
            road_direction = Some(offset);
        }
    }
    (usize::try_from(min_width).unwrap_or(0), width_direction, road_direction)
}

/// Pushes `line` along `road_direction` until it leaves the road. Returns the last valid line
/// and every road tile seen just past the line's ends, tagged -1 or 1 for the end it is on.
fn traverse_road(
    world: &World,
    line: &[TilePos],
    width_direction: Offset,
    road_direction: Offset,
) -> (Vec<TilePos>, Vec<(i32, TilePos)>) {
    let axis = (width_direction.0.abs(), width_direction.1.abs());
    let mut line = line.to_vec();
    let mut forks = Vec::new();
    loop {
        let moved = move_line(&line, 1, road_direction);
        let low = moved
            .iter()
            .min_by_key(|t| (t.0 * axis.0 + t.1 * axis.1, *t))
            .copied();
        let high = moved
            .iter()
            .max_by_key(|t| (t.0 * axis.0 + t.1 * axis.1, *t))
            .copied();
        if let (Some(low), Some(high)) = (low, high) {
            for (which_end, end) in [(-1, offset_tile(low, axis, -1)), (1, offset_tile(high, axis, 1))] {
                if is_road(world, end) {
                    forks.push((which_end, end));
                }
            }
        }
        if !valid_road_line(world, &moved) {
            return (line, forks);
        }
        line = moved;
    }
}

/// Groups consecutive fork tiles into branch start lines, dropping branches on roads that
/// have already been walked.
fn filter_forks(world: &World, mut forks: Vec<(i32, TilePos)>, regions: &[TileRect]) -> Vec<Fork> {
    forks.sort_unstable();
    forks.dedup();

    let mut result = Vec::new();
    let mut current: Vec<TilePos> = Vec::new();
    let mut last: Option<(i32, TilePos)> = None;
    let mut last_diff = (0, 0);

    for (which_end, fork) in forks {
        match last {
            Some((_, previous)) if sorted_abs_difference(fork, previous) == [0, 1] => {
                last_diff = (fork.0 - previous.0, fork.1 - previous.1);
                current.push(fork);
            }
            Some((previous_end, _)) => {
                add_fork(world, &current, last_diff, previous_end, regions, &mut result);
                current = vec![fork];
            }
            None => current.push(fork),
        }
        last = Some((which_end, fork));
    }
    if let Some((which_end, _)) = last {
        add_fork(world, &current, last_diff, which_end, regions, &mut result);
    }
    result
}

fn add_fork(
    world: &World,
    line: &[TilePos],
    width_direction: Offset,
    which_end: i32,
    regions: &[TileRect],
    forks: &mut Vec<Fork>,
) {
    // a single tile is not a road
    if line.len() < 2 {
        return;
    }
    let mut road_direction = if line[0].0 != line[1].0 { (0, 1) } else { (1, 0) };
    if which_end < 0 {
        road_direction = (-road_direction.0, -road_direction.1);
    }
    if !valid_road_line(world, line) {
        return;
    }
    if regions
        .iter()
        .any(|region| line.iter().any(|t| region.contains(*t)))
    {
        return;
    }
    forks.push(Fork {
        line: line.to_vec(),
        width_direction,
        road_direction,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{WorldId, WorldKind};

    // A two-lane road running east with a branch heading south.
    const JUNCTION: [&str; 8] = [
        "________",
        "========",
        "========",
        "___==___",
        "...==...",
        "...==...",
        "...==...",
        "...==...",
    ];

    fn junction() -> World {
        World::from_ascii(WorldId(0), "junction", WorldKind::Outside, &JUNCTION).unwrap()
    }

    #[test]
    fn measures_road_width_and_heading() {
        let world = junction();
        let (width, width_direction, road_direction) = find_road_width(&world, (0, 1));
        assert_eq!(width, 2);
        assert_eq!(width_direction, Some((0, 1)));
        assert_eq!(road_direction, Some((1, 0)));
    }

    #[test]
    fn discovers_branch_roads() {
        let world = junction();
        let mut roadmap = RoadMap::default();
        roadmap.begin_discovery(&world, (0, 1));

        let roads = roadmap.roads();
        assert_eq!(roads.len(), 2);
        assert_eq!(roads[0].line, vec![(0, 1), (0, 2)]);
        assert_eq!(roads[0].length, 7);
        assert_eq!(roads[0].end_line, vec![(7, 1), (7, 2)]);
        assert!(roads[0].is_spawn);

        assert_eq!(roads[1].line, vec![(3, 3), (4, 3)]);
        assert_eq!(roads[1].road_direction, (0, 1));
        assert_eq!(roads[1].length, 4);
        assert!(roads[1].vertical_road);

        let nodes = roadmap.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].point, (0, 1));
        assert_eq!(nodes[0].edges, vec![1]);
        assert_eq!(nodes[1].edges, vec![0]);
    }

    #[test]
    fn lanes_split_the_road() {
        let world = junction();
        let mut roadmap = RoadMap::default();
        roadmap.begin_discovery(&world, (0, 1));
        let road = &roadmap.roads()[0];
        assert_eq!(road.left_lane_start(), Rect::new(0.0, 32.0, 32.0, 32.0));
        assert_eq!(road.right_lane_start(), Rect::new(0.0, 64.0, 32.0, 32.0));
        assert_eq!(road.left_lane_end(), Rect::new(224.0, 32.0, 32.0, 32.0));
        assert_eq!(road.region(), TileRect::new(0, 1, 8, 2));
    }

    #[test]
    fn non_road_start_finds_nothing() {
        let world = junction();
        let mut roadmap = RoadMap::default();
        roadmap.begin_discovery(&world, (0, 5));
        assert!(roadmap.roads().is_empty());
        assert!(roadmap.nodes().is_empty());
    }
}
