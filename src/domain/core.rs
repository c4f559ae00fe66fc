//! Core domain types and operations
//!
//! This module defines pure geometric types that work exclusively with
//! screen pixels and have no knowledge of the host or its input stack.

/// Point in screen pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Creates a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other`, `t` in `[0, 1]`
    pub fn lerp(&self, other: Point, t: f32) -> Point {
        let t = t.clamp(0.0, 1.0);
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

/// Rectangle in screen pixel coordinates
///
/// Grid subdivision works on fractional pixels, so unlike window geometry
/// the rectangle keeps `f32` components and is only rounded by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    /// Creates a new rectangle
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns the right edge coordinate
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Returns the bottom edge coordinate
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Returns the center of the rectangle
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Returns one cell of a `rows` x `cols` subdivision of this rectangle
    pub fn subdivide(&self, rows: u32, cols: u32, row: u32, col: u32) -> Rect {
        let cell_w = self.w / cols as f32;
        let cell_h = self.h / rows as f32;
        Rect::new(
            self.x + col as f32 * cell_w,
            self.y + row as f32 * cell_h,
            cell_w,
            cell_h,
        )
    }
}

/// Current screen size in pixels
///
/// Immutable; a rotation or resolution change replaces the whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDimensions {
    width: u32,
    height: u32,
}

impl ScreenDimensions {
    /// Creates screen dimensions. Zero sizes are raised to one pixel so every
    /// derived value stays finite.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The whole screen as a rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }

    /// The shorter side, used to size gestures independently of orientation
    pub fn min_dimension(&self) -> f32 {
        self.width.min(self.height) as f32
    }

    /// Returns true if the point lies on the screen, edges included
    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x <= self.width as f32
            && point.y <= self.height as f32
    }

    /// Clamps a point to `[0, width] x [0, height]`
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0.0, self.width as f32),
            point.y.clamp(0.0, self.height as f32),
        )
    }

    /// `percent` of the width, e.g. `0.5` for half of it
    pub fn percent_of_width(&self, percent: f32) -> f32 {
        self.width as f32 * percent
    }

    /// `percent` of the height
    pub fn percent_of_height(&self, percent: f32) -> f32 {
        self.height as f32 * percent
    }

    /// Density normalisation factor: `sqrt(width * height) / 1000`
    ///
    /// Speeds and sizes are multiplied by this so they feel the same on a
    /// 720p panel and a 4K one.
    pub fn scale_factor(&self) -> f32 {
        ((self.width as f64 * self.height as f64).sqrt() / 1000.0) as f32
    }
}

impl Default for ScreenDimensions {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Logical rotation of the display, clockwise from its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    /// Number of clockwise quarter turns
    pub fn quarter_turns(&self) -> u8 {
        match self {
            Rotation::Rotation0 => 0,
            Rotation::Rotation90 => 1,
            Rotation::Rotation180 => 2,
            Rotation::Rotation270 => 3,
        }
    }

    /// Parses a rotation in degrees; only multiples of 90 are accepted
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Rotation0),
            90 => Some(Rotation::Rotation90),
            180 => Some(Rotation::Rotation180),
            270 => Some(Rotation::Rotation270),
            _ => None,
        }
    }
}

/// One snapshot of the screen feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayInfo {
    pub dimensions: ScreenDimensions,
    pub rotation: Rotation,
}

impl DisplayInfo {
    pub fn new(dimensions: ScreenDimensions, rotation: Rotation) -> Self {
        Self {
            dimensions,
            rotation,
        }
    }
}

/// Axis-aligned direction shared by cursor movement, scrolling and key mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit vector in screen space (y grows downwards)
    pub fn unit_vector(&self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Rotates the direction clockwise by `turns` quarter turns
    pub fn rotate_clockwise(&self, turns: u8) -> Direction {
        let mut dir = *self;
        for _ in 0..(turns % 4) {
            dir = match dir {
                Direction::Up => Direction::Right,
                Direction::Right => Direction::Down,
                Direction::Down => Direction::Left,
                Direction::Left => Direction::Up,
            };
        }
        dir
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    pub fn axis(&self) -> Axis {
        if self.is_horizontal() {
            Axis::Horizontal
        } else {
            Axis::Vertical
        }
    }
}

/// Screen axis a direction moves along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}
