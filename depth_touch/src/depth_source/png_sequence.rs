use super::{FrameGrabber, Grab};
use crate::core_modules::depth_frame::DepthFrame;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{FrameError, SourceError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Replays a recorded session: a directory of 16-bit grayscale PNG depth
/// frames, played in file name order.
pub struct PngSequenceGrabber {
    files: Vec<PathBuf>,
    next: usize,
    dimensions: (u32, u32),
    frame_interval: Option<Duration>,
    last_frame: Option<Instant>,
    looping: bool,
}

impl PngSequenceGrabber {
    /// Indexes `dir`. The first frame fixes the resolution of the stream.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
            .collect();
        files.sort();

        let first = files.first().ok_or_else(|| {
            SourceError::Unavailable(format!("no PNG frames in {}", dir.display()))
        })?;
        let dimensions = image_helper::load(first)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
            .dimensions();

        debug!(frames = files.len(), dir = %dir.display(), "indexed depth recording");
        Ok(Self {
            files,
            next: 0,
            dimensions,
            frame_interval: None,
            last_frame: None,
            looping: false,
        })
    }

    /// Plays at most `fps` frames per second. Zero, or a rate too slow to
    /// express as a frame interval, disables pacing.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.frame_interval = (fps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / fps).ok())
            .flatten();
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

impl FrameGrabber for PngSequenceGrabber {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn grab(&mut self) -> Result<Grab, FrameError> {
        if self.next == self.files.len() {
            if !self.looping {
                return Ok(Grab::End);
            }
            self.next = 0;
        }
        let path = &self.files[self.next];
        self.next += 1;

        let frame = image_helper::load(path)?;
        self.pace();
        if frame.dimensions() != self.dimensions {
            return Err(FrameError::DimensionMismatch {
                expected: self.dimensions,
                found: frame.dimensions(),
            });
        }
        Ok(Grab::Frame(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, frame: &DepthFrame) {
        image_helper::save(&dir.join(name), frame).unwrap();
    }

    #[test]
    fn plays_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0002.png", &DepthFrame::filled(8, 4, 1002));
        write(dir.path(), "0000.png", &DepthFrame::filled(8, 4, 1000));
        write(dir.path(), "0001.png", &DepthFrame::filled(8, 4, 1001));
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut grabber = PngSequenceGrabber::open(dir.path()).unwrap();
        assert_eq!(grabber.len(), 3);
        assert_eq!(grabber.dimensions(), (8, 4));

        for depth in 1000..1003 {
            assert_eq!(grabber.grab().unwrap(), Grab::Frame(DepthFrame::filled(8, 4, depth)));
        }
        assert_eq!(grabber.grab().unwrap(), Grab::End);
    }

    #[test]
    fn corrupt_files_are_frame_errors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0000.png", &DepthFrame::filled(8, 4, 1000));
        fs::write(dir.path().join("0001.png"), b"truncated").unwrap();
        write(dir.path(), "0002.png", &DepthFrame::filled(6, 4, 1000));

        let mut grabber = PngSequenceGrabber::open(dir.path()).unwrap();
        assert!(matches!(grabber.grab(), Ok(Grab::Frame(_))));
        assert!(matches!(grabber.grab(), Err(FrameError::Decode(_))));
        assert!(matches!(grabber.grab(), Err(FrameError::DimensionMismatch { .. })));
        assert_eq!(grabber.grab().unwrap(), Grab::End);
    }

    #[test]
    fn loops_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0000.png", &DepthFrame::filled(2, 2, 5));

        let mut grabber = PngSequenceGrabber::open(dir.path()).unwrap().looping(true);
        for _ in 0..3 {
            assert!(matches!(grabber.grab(), Ok(Grab::Frame(_))));
        }
    }

    #[test]
    fn unusable_rates_disable_pacing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0000.png", &DepthFrame::filled(2, 2, 5));

        let grabber = PngSequenceGrabber::open(dir.path()).unwrap();
        assert_eq!(grabber.with_fps(1e-300).frame_interval, None);

        let grabber = PngSequenceGrabber::open(dir.path()).unwrap();
        assert_eq!(grabber.with_fps(0.0).frame_interval, None);

        let grabber = PngSequenceGrabber::open(dir.path()).unwrap();
        assert_eq!(grabber.with_fps(50.0).frame_interval, Some(Duration::from_millis(20)));
    }

    #[test]
    fn missing_or_empty_directories_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PngSequenceGrabber::open(dir.path()),
            Err(SourceError::Unavailable(_))
        ));
        assert!(matches!(
            PngSequenceGrabber::open(dir.path().join("missing")),
            Err(SourceError::Unavailable(_))
        ));
    }
}
