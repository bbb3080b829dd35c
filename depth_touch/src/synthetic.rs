//! Synthetic depth scenes for demos and tests.
//!
//! A scene is a flat surface seen from above with a little deterministic sensor
//! noise, then a fingertip pressed on it and dragged left to right, with the rest
//! of the arm hovering well above the touch band, and finally an empty surface
//! again once the finger is lifted.

use crate::core_modules::depth_frame::DepthFrame;
use crate::core_modules::roi::Roi;

#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub width: u32,
    pub height: u32,
    /// Distance from the camera to the surface, in mm.
    pub surface_depth: i16,
    /// Height of the fingertip above the surface, in mm.
    pub finger_height: i16,
    /// Height of the arm above the surface, in mm.
    pub arm_height: i16,
    pub finger_radius: u32,
    /// The finger is dragged across this rectangle's horizontal center line.
    pub roi: Roi,
    pub training_frames: usize,
    pub drag_frames: usize,
    pub lift_frames: usize,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            surface_depth: 1200,
            finger_height: 15,
            arm_height: 80,
            finger_radius: 6,
            roi: Roi::default(),
            training_frames: 30,
            drag_frames: 60,
            lift_frames: 3,
        }
    }
}

impl SyntheticScene {
    /// The full sequence: training, drag, lift.
    pub fn frames(&self) -> Vec<DepthFrame> {
        let total = self.training_frames + self.drag_frames + self.lift_frames;
        (0..total).map(|i| self.frame(i)).collect()
    }

    /// Frame `index` of the sequence.
    pub fn frame(&self, index: usize) -> DepthFrame {
        let mut frame = self.surface(index);
        let drag = index.checked_sub(self.training_frames).filter(|&i| i < self.drag_frames);
        if let Some(step) = drag {
            let (cx, cy) = self.finger_position(step);
            self.press(&mut frame, cx, cy);
        }
        frame
    }

    /// Pixel position of the fingertip at drag step `step`.
    pub fn finger_position(&self, step: usize) -> (u32, u32) {
        let margin = self.finger_radius * 2;
        let start = self.roi.x_min + margin;
        let end = self.roi.x_max.saturating_sub(margin).max(start);
        let t = if self.drag_frames > 1 {
            step as f64 / (self.drag_frames - 1) as f64
        } else {
            0.0
        };
        let x = start as f64 + (end - start) as f64 * t;
        let y = (self.roi.y_min + self.roi.y_max) / 2;
        (x.round() as u32, y)
    }

    fn surface(&self, index: usize) -> DepthFrame {
        let mut frame = DepthFrame::filled(self.width, self.height, self.surface_depth);
        for y in 0..self.height {
            for x in 0..self.width {
                frame.set(x, y, self.surface_depth + noise(x, y, index));
            }
        }
        frame
    }

    fn press(&self, frame: &mut DepthFrame, cx: u32, cy: u32) {
        let r = self.finger_radius as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let (x, y) = (cx as i64 + dx, cy as i64 + dy);
                if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
                    let depth = frame.get(x as u32, y as u32);
                    frame.set(x as u32, y as u32, depth - self.finger_height);
                }
            }
        }

        // The arm reaches in from the bottom edge, far above the touch band.
        let arm_top = cy + self.finger_radius + 1;
        let arm_left = cx.saturating_sub(self.finger_radius);
        let arm_right = (cx + self.finger_radius + 1).min(self.width);
        for y in arm_top.min(self.height)..self.height {
            for x in arm_left..arm_right {
                frame.set(x, y, self.surface_depth - self.arm_height);
            }
        }
    }
}

/// Deterministic noise in `-2..=2` mm.
fn noise(x: u32, y: u32, index: usize) -> i16 {
    ((x as usize * 7 + y as usize * 13 + index * 3) % 5) as i16 - 2
}
