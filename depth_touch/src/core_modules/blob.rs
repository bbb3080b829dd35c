// THEORY:
// A `Blob` is a single touch candidate found in one frame: a connected patch of
// touch-mask pixels that survived the area filter, reduced to where it is and how
// big it is.
//
// Key architectural principles:
// 1.  **Transient**: A blob only lives for the frame it was found in. It has no
//     identity; giving detections a persistent identity is the job of the
//     `CursorTracker`.
// 2.  **Pixel Space**: Centroid and bounding box are in full-frame pixel
//     coordinates. Normalization to surface coordinates happens in the tracker,
//     against whatever ROI is active for that frame.

/// A pixel position on the frame grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// One connected region of the touch mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Mean of the member pixel coordinates.
    pub centroid: (f32, f32),
    /// Number of member pixels.
    pub area: usize,
    /// Top-left and bottom-right member pixels (inclusive).
    pub bounding_box: (Point, Point),
}

impl Blob {
    /// A blob at `(x, y)` with the given area and a one-pixel bounding box.
    /// Handy for feeding the tracker directly.
    pub fn at(x: f32, y: f32, area: usize) -> Self {
        let p = Point {
            x: x.max(0.0) as u32,
            y: y.max(0.0) as u32,
        };
        Self {
            centroid: (x, y),
            area,
            bounding_box: (p, p),
        }
    }
}
