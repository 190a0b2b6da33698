use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A normalized bounding box (0.0 to 1.0) locating a face within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner (0.0 = left, 1.0 = right)
    pub x: f64,
    /// Y coordinate of the top-left corner (0.0 = top, 1.0 = bottom)
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the box lies within the frame.
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.001 // float slack
            && self.y + self.height <= 1.001
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}
