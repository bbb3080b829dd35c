// THEORY:
// The region of interest is the part of the camera image that is the touch
// surface. Only pixels inside it are searched for blobs, and its extents define
// the normalized cursor coordinate system: `x_min..x_max` maps to `0..1` left to
// right and `y_max..y_min` maps to `0..1` bottom to top.
//
// The ROI can be changed while the engine runs, so it is always clamped to the
// frame before use. A rectangle that collapses after clamping is rejected rather
// than silently producing a division by zero in the normalization.

use crate::error::ConfigError;
use serde::Deserialize;

/// Axis-aligned rectangle in pixel coordinates. `x_max`/`y_max` are exclusive
/// for pixel membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Roi {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl Default for Roi {
    fn default() -> Self {
        Self {
            x_min: 110,
            x_max: 560,
            y_min: 120,
            y_max: 320,
        }
    }
}

impl Roi {
    /// A rectangle from its bounds, unchecked. Use `clamped` before searching it.
    pub fn new(x_min: u32, x_max: u32, y_min: u32, y_max: u32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// The whole frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, width, 0, height)
    }

    /// Horizontal extent in pixels, zero when inverted.
    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    /// Vertical extent in pixels, zero when inverted.
    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// Clamps the rectangle into a `width`×`height` frame and checks it still has area.
    pub fn clamped(self, width: u32, height: u32) -> Result<Self, ConfigError> {
        let clamped = Self {
            x_min: self.x_min.min(width),
            x_max: self.x_max.min(width),
            y_min: self.y_min.min(height),
            y_max: self.y_max.min(height),
        };
        if clamped.x_max <= clamped.x_min || clamped.y_max <= clamped.y_min {
            return Err(ConfigError::InvalidRoi {
                x_min: self.x_min,
                x_max: self.x_max,
                y_min: self.y_min,
                y_max: self.y_max,
            });
        }
        Ok(clamped)
    }

    /// Whether pixel `(x, y)` is part of the region. Max bounds are exclusive.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }

    /// Maps a pixel-space point to normalized surface coordinates, flipping the
    /// vertical axis so that `y` grows upwards.
    pub fn normalize(&self, x: f32, y: f32) -> (f32, f32) {
        let nx = (x - self.x_min as f32) / (self.x_max as f32 - self.x_min as f32);
        let ny = 1.0 - (y - self.y_min as f32) / (self.y_max as f32 - self.y_min as f32);
        (nx, ny)
    }
}
