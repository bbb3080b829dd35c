// THEORY:
// The background model is the engine's memory of what the empty surface looks
// like. It is trained exactly once, at startup, by averaging a batch of frames
// captured while nothing touches the surface. After that it is frozen: every
// later frame is compared against the same reference, so a hand resting on the
// table never gets absorbed into the background.
//
// The surface must be unoccupied during training. This is not checked; anything
// present while training biases the reference and shows up as a permanent hole.

use crate::core_modules::depth_frame::DepthFrame;
use crate::error::ConfigError;

/// The frozen reference depth map of the uncovered surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundFrame {
    frame: DepthFrame,
}

impl BackgroundFrame {
    pub fn frame(&self) -> &DepthFrame {
        &self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}

/// Builds the background by averaging `frames` pixel by pixel.
///
/// The sums are accumulated in `f64` and the mean is rounded to the nearest
/// millimeter. All frames must share the dimensions of the first one.
pub fn train(frames: &[DepthFrame]) -> Result<BackgroundFrame, ConfigError> {
    let first = frames.first().ok_or(ConfigError::EmptyTraining)?;
    let expected = first.dimensions();

    let mut acc = vec![0.0f64; first.data().len()];
    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != expected {
            return Err(ConfigError::DimensionMismatch {
                index,
                expected,
                found: frame.dimensions(),
            });
        }
        for (sum, &depth) in acc.iter_mut().zip(frame.data()) {
            *sum += depth as f64;
        }
    }

    let count = frames.len() as f64;
    let mean = acc
        .into_iter()
        .map(|sum| (sum / count).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect();

    Ok(BackgroundFrame {
        frame: DepthFrame::from_raw(expected.0, expected.1, mean),
    })
}

impl From<DepthFrame> for BackgroundFrame {
    /// Uses a single, already known reference frame as the background.
    fn from(frame: DepthFrame) -> Self {
        Self { frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_pixel() {
        let a = DepthFrame::new(2, 1, vec![1000, 10]).unwrap();
        let b = DepthFrame::new(2, 1, vec![1002, 20]).unwrap();
        let c = DepthFrame::new(2, 1, vec![1004, 31]).unwrap();

        let background = train(&[a, b, c]).unwrap();
        // (10 + 20 + 31) / 3 = 20.33 rounds down.
        assert_eq!(background.frame().data(), &[1002, 20]);
    }

    #[test]
    fn rounds_to_nearest() {
        let a = DepthFrame::new(1, 1, vec![10]).unwrap();
        let b = DepthFrame::new(1, 1, vec![11]).unwrap();
        let c = DepthFrame::new(1, 1, vec![11]).unwrap();
        assert_eq!(train(&[a, b, c]).unwrap().frame().data(), &[11]);
    }

    #[test]
    fn single_frame_is_its_own_background() {
        let frame = DepthFrame::filled(8, 6, 1234);
        let background = train(std::slice::from_ref(&frame)).unwrap();
        assert_eq!(background.frame(), &frame);
    }

    #[test]
    fn empty_training_set_is_fatal() {
        assert!(matches!(train(&[]), Err(ConfigError::EmptyTraining)));
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let frames = [
            DepthFrame::filled(4, 4, 1),
            DepthFrame::filled(4, 4, 1),
            DepthFrame::filled(4, 5, 1),
        ];
        match train(&frames) {
            Err(ConfigError::DimensionMismatch { index, expected, found }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, (4, 4));
                assert_eq!(found, (4, 5));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
