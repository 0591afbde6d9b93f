/*!
Pixel and tile geometry: vectors, rectangles, directions and the conversions between
pixel space (`f64`) and tile space (`i32`).
*/

use rand::Rng;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Size of a tile in pixels.
pub const TILE_SIZE: i32 = 32;
/// Size of a tile in map file units.
pub const TILESET_RESOLUTION: i32 = 16;
/// Scale applied to passengers drawn inside a vehicle.
pub const PASSENGER_SCALE: f64 = 0.6;

pub type TilePos = (i32, i32);

#[inline(always)]
#[must_use]
pub fn tile_size() -> f64 {
    f64::from(TILE_SIZE)
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    #[must_use]
    pub fn length_sqrd(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.length_sqrd().sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    #[must_use]
    pub fn normalized(self) -> Vec2 {
        let length = self.length();
        if length == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / length, self.y / length)
        }
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// The four compass directions. The discriminant doubles as the index into
/// direction-ordered arrays (movement keys, offsets).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North = 0,
    West = 1,
    South = 2,
    East = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::West,
        Direction::South,
        Direction::East,
    ];

    #[must_use]
    pub fn from_index(index: usize) -> Direction {
        Direction::ALL[index % 4]
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn opposite(self) -> Direction {
        Direction::from_index(self.index() + 2)
    }

    #[must_use]
    pub fn are_perpendicular(self, other: Direction) -> bool {
        self.is_horizontal() != other.is_horizontal()
    }

    /// The two directions at right angles, the clockwise one first.
    #[must_use]
    pub fn perpendiculars(self) -> [Direction; 2] {
        [
            Direction::from_index(self.index() + 3),
            Direction::from_index(self.index() + 1),
        ]
    }

    #[must_use]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::West | Direction::East)
    }

    #[must_use]
    pub fn is_vertical(self) -> bool {
        !self.is_horizontal()
    }

    /// North and west point towards decreasing coordinates.
    #[must_use]
    pub fn is_negative(self) -> bool {
        matches!(self, Direction::North | Direction::West)
    }

    #[must_use]
    pub fn offset(self) -> TilePos {
        match self {
            Direction::North => (0, -1),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
        }
    }

    #[must_use]
    pub fn from_offset(offset: TilePos) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.offset() == offset)
    }

    #[must_use]
    pub fn vector(self) -> Vec2 {
        let (x, y) = self.offset();
        Vec2::new(f64::from(x), f64::from(y))
    }

    /// The step along the dominant axis from `from` to `to`, vertical on ties.
    #[must_use]
    pub fn between(from: TilePos, to: TilePos) -> Option<Direction> {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        if dx == 0 && dy == 0 {
            None
        } else if dx.abs() > dy.abs() {
            Direction::from_offset((dx.signum(), 0))
        } else {
            Direction::from_offset((0, dy.signum()))
        }
    }

    /// Pixel-space version of `between`.
    #[must_use]
    pub fn between_points(from: Vec2, to: Vec2) -> Option<Direction> {
        let d = to - from;
        if d.is_zero() {
            None
        } else if d.x.abs() > d.y.abs() {
            Some(if d.x > 0.0 { Direction::East } else { Direction::West })
        } else {
            Some(if d.y > 0.0 { Direction::South } else { Direction::North })
        }
    }

    #[must_use]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Direction {
        Direction::from_index(rng.random_range(0..4))
    }

    /// Parses an orientation from a map property: `N`, `E`, `S`, `W`, or `R` for random.
    /// Anything else faces south.
    pub fn parse_orientation<R: Rng + ?Sized>(value: Option<&str>, rng: &mut R) -> Direction {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("N") => Direction::North,
            Some("E") => Direction::East,
            Some("W") => Direction::West,
            Some("R") => Direction::random(rng),
            _ => Direction::South,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::West => "west",
            Direction::South => "south",
            Direction::East => "east",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    /// The pixel rect covering a tile.
    #[must_use]
    pub fn from_tile(tile: TilePos) -> Self {
        let position = tile_to_pixel(tile);
        Rect::new(position.x, position.y, tile_size(), tile_size())
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn topleft(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[must_use]
    pub fn bottomright(&self) -> Vec2 {
        Vec2::new(self.right(), self.bottom())
    }

    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
    }

    #[must_use]
    pub fn midtop(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y)
    }

    /// Strict overlap: touching edges do not collide.
    #[must_use]
    pub fn collides(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Half-open containment: the left and top edges are inside, the right and bottom are not.
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Grows (or shrinks, for negative values) the rect around its centre.
    #[must_use]
    pub fn inflate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(
            self.x - dx / 2.0,
            self.y - dy / 2.0,
            self.width + dx,
            self.height + dy,
        )
    }

    #[must_use]
    pub fn translate(&self, offset: Vec2) -> Rect {
        Rect::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }
}

/// An axis-aligned rectangle of tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TileRect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        TileRect { x, y, width, height }
    }

    #[must_use]
    pub fn unit(tile: TilePos) -> Self {
        TileRect::new(tile.0, tile.1, 1, 1)
    }

    /// The smallest rect containing every tile in `tiles`.
    #[must_use]
    pub fn bounding(tiles: impl IntoIterator<Item = TilePos>) -> Option<Self> {
        let mut tiles = tiles.into_iter();
        let first = tiles.next()?;
        let (mut x1, mut y1, mut x2, mut y2) = (first.0, first.1, first.0, first.1);
        for (x, y) in tiles {
            x1 = x1.min(x);
            y1 = y1.min(y);
            x2 = x2.max(x);
            y2 = y2.max(y);
        }
        Some(TileRect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1))
    }

    #[must_use]
    pub fn topleft(&self) -> TilePos {
        (self.x, self.y)
    }

    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.0 >= self.x
            && tile.0 < self.x + self.width
            && tile.1 >= self.y
            && tile.1 < self.y + self.height
    }

    /// Grows the rect by `delta` tiles on the side facing `direction`. A negative `delta`
    /// undoes a previous expansion.
    pub fn expand(&mut self, direction: Direction, delta: i32) {
        match direction {
            Direction::North => {
                self.y -= delta;
                self.height += delta;
            }
            Direction::West => {
                self.x -= delta;
                self.width += delta;
            }
            Direction::South => self.height += delta,
            Direction::East => self.width += delta,
        }
    }

    #[must_use]
    pub fn translate(&self, dx: i32, dy: i32) -> TileRect {
        TileRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Column-major iteration over every tile.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + use<> {
        let TileRect { x, y, width, height } = *self;
        (x..x + width).flat_map(move |tx| (y..y + height).map(move |ty| (tx, ty)))
    }

    #[must_use]
    pub fn to_pixels(&self) -> Rect {
        let s = tile_size();
        Rect::new(
            f64::from(self.x) * s,
            f64::from(self.y) * s,
            f64::from(self.width) * s,
            f64::from(self.height) * s,
        )
    }
}

#[must_use]
pub fn pixel_to_tile(position: Vec2) -> TilePos {
    let s = tile_size();
    ((position.x / s).floor() as i32, (position.y / s).floor() as i32)
}

#[must_use]
pub fn tile_to_pixel(tile: TilePos) -> Vec2 {
    let s = tile_size();
    Vec2::new(f64::from(tile.0) * s, f64::from(tile.1) * s)
}

#[must_use]
pub fn tile_centre(tile: TilePos) -> Vec2 {
    let half = tile_size() / 2.0;
    tile_to_pixel(tile) + Vec2::new(half, half)
}

#[must_use]
pub fn add_direction(tile: TilePos, direction: Direction, amount: i32) -> TilePos {
    let (dx, dy) = direction.offset();
    (tile.0 + dx * amount, tile.1 + dy * amount)
}

#[must_use]
pub fn distance_sqrd(a: Vec2, b: Vec2) -> f64 {
    (b - a).length_sqrd()
}

#[must_use]
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    (b - a).length()
}

#[must_use]
pub fn tile_distance_sqrd(a: TilePos, b: TilePos) -> i64 {
    let dx = i64::from(b.0 - a.0);
    let dy = i64::from(b.1 - a.1);
    dx * dx + dy * dy
}

/// Absolute per-axis difference, smallest first. `[0, 1]` means the tiles are adjacent.
#[must_use]
pub fn sorted_abs_difference(a: TilePos, b: TilePos) -> [i32; 2] {
    let dx = (a.0 - b.0).abs();
    let dy = (a.1 - b.1).abs();
    [dx.min(dy), dx.max(dy)]
}
