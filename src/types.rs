//! Core geometry types shared across the scanning pipeline.
//!
//! Sizes are unsigned pixel dimensions; rectangles are signed so that
//! placement math may produce negative origins (a cropped preview extends
//! beyond the visible frame). Rotations form a closed 0/90/180/270 set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Width/height pair in pixels, in whatever orientation the context implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    /// Swaps width and height.
    pub fn rotate(self) -> Self {
        Size::new(self.height, self.width)
    }

    /// Scales both dimensions by the rational `n / d`, rounding down.
    pub fn scale(self, n: u32, d: u32) -> Self {
        Size::new(
            (self.width as u64 * n as u64 / d as u64) as u32,
            (self.height as u64 * n as u64 / d as u64) as u32,
        )
    }

    /// Scales preserving aspect ratio so the result fits entirely inside
    /// `into`, letterboxed on one axis. Empty sizes are returned unchanged.
    pub fn scale_fit(self, into: Size) -> Size {
        if self.width == 0 || self.height == 0 {
            return self;
        }
        if self.width as u64 * into.height as u64 >= into.width as u64 * self.height as u64 {
            // Wider than the target: match widths.
            Size::new(
                into.width,
                (self.height as u64 * into.width as u64 / self.width as u64) as u32,
            )
        } else {
            Size::new(
                (self.width as u64 * into.height as u64 / self.height as u64) as u32,
                into.height,
            )
        }
    }

    /// Scales preserving aspect ratio so the result fully covers `into`,
    /// overflowing on one axis. Empty sizes are returned unchanged.
    pub fn scale_crop(self, into: Size) -> Size {
        if self.width == 0 || self.height == 0 {
            return self;
        }
        if self.width as u64 * into.height as u64 <= into.width as u64 * self.height as u64 {
            Size::new(
                into.width,
                (self.height as u64 * into.width as u64 / self.width as u64) as u32,
            )
        } else {
            Size::new(
                (self.width as u64 * into.height as u64 / self.height as u64) as u32,
                into.height,
            )
        }
    }

    /// True when both dimensions fit inside `other`.
    pub fn fits_in(self, other: Size) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl PartialOrd for Size {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: pixel area first, then width/height to stay consistent
/// with equality.
impl Ord for Size {
    fn cmp(&self, other: &Self) -> Ordering {
        self.area()
            .cmp(&other.area())
            .then(self.width.cmp(&other.width))
            .then(self.height.cmp(&other.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Display rotation relative to the device's natural orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Maps a degree value to a rotation; anything not a multiple of 90 in
    /// [0, 360) is rejected.
    pub fn from_degrees(degrees: i32) -> Option<Rotation> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// True for 90/270: camera and display axes are swapped.
    pub fn is_perpendicular(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Integer rectangle with exclusive right/bottom edges. Origin may be
/// negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Rect::new(0, 0, size.width as i32, size.height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// The rectangle's dimensions as a Size; empty rects collapse to 0x0.
    pub fn size(&self) -> Size {
        Size::new(self.width().max(0) as u32, self.height().max(0) as u32)
    }

    /// Moves the rectangle by (dx, dy).
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Shrinks (positive deltas) or grows (negative) symmetrically.
    pub fn inset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.right - dx, self.bottom - dy)
    }

    /// Intersection, or None when the rectangles do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.left, self.top, self.right, self.bottom)
    }
}

/// A detection point in frame coordinates, as reported by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}
