// THEORY:
// A `DepthFrame` is the raw material of the whole engine: one W×H grid of signed
// 16-bit distances in millimeters, as delivered by the depth camera for a single
// capture cycle. It is a "dumb" data container with no memory of other frames.
// It is owned, so the capture path and the processing path never alias the same buffer;
// the processing path always works on its own copy.
//
// The resolution is fixed for the lifetime of the process. Every later stage
// (background, mask, blob search) indexes frames row-major with `y * width + x`.

use crate::error::FrameError;

/// One depth image in millimeters, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<i16>,
}

impl DepthFrame {
    /// Wraps a buffer of `width * height` depth samples.
    pub fn new(width: u32, height: u32, data: Vec<i16>) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Caller guarantees `data.len() == width * height`.
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<i16>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            data,
        }
    }

    /// A frame where every pixel reports the same depth.
    pub fn filled(width: u32, height: u32, depth: i16) -> Self {
        Self {
            width,
            height,
            data: vec![depth; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The raw samples, row-major.
    pub fn data(&self) -> &[i16] {
        &self.data
    }

    /// Depth at `(x, y)`. Panics when out of bounds, like slice indexing.
    pub fn get(&self, x: u32, y: u32) -> i16 {
        self.data[self.index(x, y)]
    }

    /// Overwrites the depth at `(x, y)`. Panics when out of bounds.
    pub fn set(&mut self, x: u32, y: u32, depth: i16) {
        let index = self.index(x, y);
        self.data[index] = depth;
    }

    /// Sets every pixel inside the half-open rectangle to `depth`, clipped to the frame.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, depth: i16) {
        for y in y0.min(self.height)..y1.min(self.height) {
            for x in x0.min(self.width)..x1.min(self.width) {
                self.set(x, y, depth);
            }
        }
    }

    /// True when the frame carries no usable reading. The sensor reports 0 for
    /// pixels it could not measure, so an all-zero frame counts as empty.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&d| d == 0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        (y as usize) * (self.width as usize) + x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = DepthFrame::new(4, 3, vec![0; 11]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferSize {
                expected: 12,
                found: 11
            }
        );
    }

    #[test]
    fn indexes_row_major() {
        let frame = DepthFrame::new(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.get(0, 0), 1);
        assert_eq!(frame.get(2, 0), 3);
        assert_eq!(frame.get(0, 1), 4);
        assert_eq!(frame.get(2, 1), 6);
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut frame = DepthFrame::filled(4, 4, 100);
        frame.fill_rect(2, 2, 10, 10, 7);
        assert_eq!(frame.get(1, 1), 100);
        assert_eq!(frame.get(2, 2), 7);
        assert_eq!(frame.get(3, 3), 7);
    }

    #[test]
    fn blank_frames_are_empty() {
        assert!(DepthFrame::filled(4, 4, 0).is_empty());
        assert!(DepthFrame::new(0, 0, Vec::new()).unwrap().is_empty());

        let mut frame = DepthFrame::filled(4, 4, 0);
        frame.set(1, 1, 900);
        assert!(!frame.is_empty());
    }
}
