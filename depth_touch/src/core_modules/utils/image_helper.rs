//! 16-bit grayscale PNG encoding of depth frames.
//!
//! Recorded sessions and synthetic test scenes are stored as one PNG per frame,
//! each pixel holding the depth in millimeters. Negative depths cannot be
//! represented and are written as 0 (no reading).

pub mod image_helper {
    use crate::core_modules::depth_frame::DepthFrame;
    use crate::error::FrameError;
    use image::{ImageBuffer, Luma};
    use std::path::Path;

    type Depth16 = ImageBuffer<Luma<u16>, Vec<u16>>;

    /// Writes `frame` as a 16-bit grayscale PNG at `path`.
    pub fn save(path: &Path, frame: &DepthFrame) -> Result<(), image::ImageError> {
        let samples = frame.data().iter().map(|&d| d.max(0) as u16).collect();
        let buffer = Depth16::from_raw(frame.width(), frame.height(), samples).ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        buffer.save_with_format(path, image::ImageFormat::Png)
    }

    /// Loads a depth frame. Color or 8-bit images are converted to 16-bit luma first.
    pub fn load(path: &Path) -> Result<DepthFrame, FrameError> {
        let image = image::open(path)
            .map_err(|e| FrameError::Decode(format!("{}: {e}", path.display())))?;
        to_depth_frame(image.to_luma16())
    }

    fn to_depth_frame(buffer: Depth16) -> Result<DepthFrame, FrameError> {
        let (width, height) = buffer.dimensions();
        let data = buffer
            .into_raw()
            .into_iter()
            .map(|d| d.min(i16::MAX as u16) as i16)
            .collect();
        DepthFrame::new(width, height, data)
    }
}
