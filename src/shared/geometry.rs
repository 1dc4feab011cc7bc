//! Window geometry

/// Window rectangle, excluding the border.
///
/// Coordinates are signed because hidden clients live at negative x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Width including a border of `bw` on both sides
    pub fn outer_width(&self, bw: i32) -> i32 {
        self.width + 2 * bw
    }

    /// Height including a border of `bw` on both sides
    pub fn outer_height(&self, bw: i32) -> i32 {
        self.height + 2 * bw
    }
}
