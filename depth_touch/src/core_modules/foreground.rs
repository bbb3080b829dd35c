// THEORY:
// Foreground extraction answers one question per pixel: "is something resting
// just above the surface here?". Subtracting the live depth from the background
// gives the height of whatever is in front of the surface (positive when it is
// closer to the camera). A fingertip pressed on the table sits in a narrow band a
// few millimeters high, so a dual threshold keeps that band and rejects both
// sensor noise around zero and taller objects such as the rest of the hand.
//
// The arithmetic is done in `i32` so that invalid readings (depth 0) and very
// close objects produce large heights instead of wrapping around.

use crate::core_modules::background_model::BackgroundFrame;
use crate::core_modules::depth_frame::DepthFrame;
use crate::error::FrameError;

/// Binary per-pixel touch mask, row-major, same resolution as the frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl TouchMask {
    /// An all-clear mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `(x, y)` is inside the touch band.
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = (y as usize) * (self.width as usize) + x as usize;
        self.bits[index] = value;
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

/// Computes the touch mask of `depth` against `background`.
///
/// A pixel is set when `touch_min < background - depth < touch_max`.
pub fn mask(
    depth: &DepthFrame,
    background: &BackgroundFrame,
    touch_min: i32,
    touch_max: i32,
) -> Result<TouchMask, FrameError> {
    let reference = background.frame();
    if depth.dimensions() != reference.dimensions() {
        return Err(FrameError::DimensionMismatch {
            expected: reference.dimensions(),
            found: depth.dimensions(),
        });
    }

    let bits = reference
        .data()
        .iter()
        .zip(depth.data())
        .map(|(&bg, &d)| {
            let height = bg as i32 - d as i32;
            touch_min < height && height < touch_max
        })
        .collect();

    Ok(TouchMask {
        width: depth.width(),
        height: depth.height(),
        bits,
    })
}
