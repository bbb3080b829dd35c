// THEORY:
// The `pipeline` module is the top-level API of the touch engine. It wires the
// stages together in the order data flows through them:
//
//     DepthSource → foreground mask → blob detector → cursor tracker → FrameEmitter
//
// `TouchPipeline` owns the only state that outlives a frame: the frozen
// background and the tracker's live cursors. Everything else is rebuilt per
// frame from a private copy of the depth image, so the detection stages need no
// locking. A frame that cannot be processed (empty, wrong size, failed to decode)
// is dropped without emitting anything, and the next frame is processed as if
// nothing happened; the tracker only ever compares a call with the previous one.

use crate::config::TouchConfig;
use crate::core_modules::background_model::{self, BackgroundFrame};
use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::cursor_tracker::{CursorEvent, CursorTracker};
use crate::core_modules::depth_frame::DepthFrame;
use crate::core_modules::foreground;
use crate::core_modules::roi::Roi;
use crate::depth_source::DepthSource;
use crate::emitter::FrameEmitter;
use crate::error::{ConfigError, FrameError, SourceError, TouchError};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::cursor_tracker::{Cursor, CursorId, CursorState};

/// The result of processing one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Blobs that passed the area filter, in pixel space.
    pub blobs: Vec<Blob>,
    /// Events emitted for this frame, in emission order.
    pub events: Vec<CursorEvent>,
    /// Number of pixels inside the touch band, before ROI restriction.
    pub touch_pixels: usize,
}

/// Totals of a `run` loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub dropped: u64,
}

/// The main, top-level struct for the touch engine.
pub struct TouchPipeline {
    background: BackgroundFrame,
    tracker: CursorTracker,
    roi: Roi,
    touch_min: i32,
    touch_max: i32,
    min_area: usize,
    roi_control: Option<watch::Receiver<Roi>>,
    session_start: Instant,
}

impl TouchPipeline {
    /// Builds a pipeline around a trained background. The configured ROI is
    /// clamped to the background's resolution.
    pub fn new(config: &TouchConfig, background: BackgroundFrame) -> Result<Self, ConfigError> {
        let (width, height) = background.dimensions();
        let roi = config.roi.clamped(width, height)?;
        Ok(Self {
            background,
            tracker: CursorTracker::new(),
            roi,
            touch_min: config.touch.depth_min,
            touch_max: config.touch.depth_max,
            min_area: config.touch.min_area,
            roi_control: None,
            session_start: Instant::now(),
        })
    }

    /// Lets another task move the ROI while the pipeline runs. A new value is
    /// picked up at the start of the next frame.
    pub fn with_roi_control(mut self, control: watch::Receiver<Roi>) -> Self {
        self.roi_control = Some(control);
        self
    }

    /// The ROI the next frame will be searched in, already clamped.
    pub fn roi(&self) -> Roi {
        self.roi
    }

    /// Replaces the ROI, clamped to the frame. A degenerate ROI is rejected and
    /// the current one stays active.
    pub fn set_roi(&mut self, roi: Roi) -> Result<(), ConfigError> {
        let (width, height) = self.background.dimensions();
        self.roi = roi.clamped(width, height)?;
        debug!(roi = ?self.roi, "region of interest changed");
        Ok(())
    }

    /// Time since the pipeline was created.
    pub fn session_time(&self) -> Duration {
        self.session_start.elapsed()
    }

    /// Runs the detection stages on one frame and advances the tracker.
    ///
    /// An empty frame or one that does not match the background resolution
    /// is rejected before the tracker sees it, so dropped frames never age
    /// cursors.
    pub fn process_frame(
        &mut self,
        depth: &DepthFrame,
        time: Duration,
    ) -> Result<FrameAnalysis, FrameError> {
        if depth.is_empty() {
            return Err(FrameError::Empty);
        }
        // Stage 0: pick up a pending ROI change before anything reads it.
        self.apply_roi_control();

        // Stage 1: Foreground
        let mask = foreground::mask(depth, &self.background, self.touch_min, self.touch_max)?;

        // Stage 2: Spatial Grouping
        let blobs = blob_detector::extract(&mask, &self.roi, self.min_area);

        // Stage 3: Identity Tracking
        let events = self.tracker.update(&blobs, &self.roi, time);

        Ok(FrameAnalysis {
            blobs,
            events,
            touch_pixels: mask.count(),
        })
    }

    /// `process_frame` followed by delivering the events to `emitter` as one frame.
    pub fn process_and_emit<E: FrameEmitter + ?Sized>(
        &mut self,
        depth: &DepthFrame,
        time: Duration,
        emitter: &mut E,
    ) -> Result<FrameAnalysis, FrameError> {
        let analysis = self.process_frame(depth, time)?;
        emitter.emit_frame(time, &analysis.events);
        Ok(analysis)
    }

    /// Processes frames from `source` until it closes or `shutdown` resolves.
    ///
    /// Bad frames are logged and skipped. Only a failing source ends the loop
    /// with an error.
    pub async fn run<S, E, F>(
        &mut self,
        source: &mut S,
        emitter: &mut E,
        shutdown: F,
    ) -> Result<RunSummary, SourceError>
    where
        S: DepthSource + ?Sized,
        E: FrameEmitter + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut summary = RunSummary::default();

        loop {
            // --- 1. Wait for a frame, or stop ---
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                ready = source.update() => match ready {
                    Ok(()) => {}
                    Err(SourceError::Closed) => {
                        info!("depth source closed");
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }

            // --- 2. Process it; a bad frame only costs itself ---
            let time = self.session_time();
            let result = source
                .get()
                .and_then(|depth| self.process_and_emit(&depth, time, emitter));
            match result {
                Ok(analysis) => {
                    summary.processed += 1;
                    if !analysis.events.is_empty() {
                        debug!(
                            blobs = analysis.blobs.len(),
                            events = analysis.events.len(),
                            live = self.tracker.live_count(),
                            "frame processed"
                        );
                    }
                }
                Err(e) => {
                    summary.dropped += 1;
                    warn!(error = %e, "dropping frame");
                }
            }
        }

        info!(processed = summary.processed, dropped = summary.dropped, "pipeline stopped");
        Ok(summary)
    }

    fn apply_roi_control(&mut self) {
        let Some(control) = self.roi_control.as_mut() else {
            return;
        };
        if !control.has_changed().unwrap_or(false) {
            return;
        }
        let requested = *control.borrow_and_update();
        if let Err(e) = self.set_roi(requested) {
            warn!(error = %e, "ignoring region of interest update");
        }
    }
}

/// Trains the background from the first `count` usable frames of `source`.
///
/// The surface must be clear while this runs. Bad frames are skipped.
pub async fn train_from_source<S: DepthSource + ?Sized>(
    source: &mut S,
    count: usize,
) -> Result<BackgroundFrame, TouchError> {
    if count == 0 {
        return Err(ConfigError::EmptyTraining.into());
    }

    info!(count, "training background, keep the surface clear");
    let mut frames = Vec::with_capacity(count);
    while frames.len() < count {
        source.update().await?;
        match source.get() {
            Ok(frame) if !frame.is_empty() => frames.push(frame),
            Ok(_) => warn!("skipping empty training frame"),
            Err(e) => warn!(error = %e, "skipping training frame"),
        }
    }

    let background = background_model::train(&frames)?;
    info!("background trained");
    Ok(background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EventLog;

    const SURFACE: i16 = 1000;

    fn config() -> TouchConfig {
        let mut config = TouchConfig::default();
        config.sensor.width = 64;
        config.sensor.height = 48;
        config.roi = Roi::new(8, 56, 8, 40);
        config.touch.min_area = 20;
        config
    }

    fn pipeline() -> TouchPipeline {
        let background = BackgroundFrame::from(DepthFrame::filled(64, 48, SURFACE));
        TouchPipeline::new(&config(), background).unwrap()
    }

    fn touch_at(x: u32, y: u32) -> DepthFrame {
        let mut frame = DepthFrame::filled(64, 48, SURFACE);
        frame.fill_rect(x - 3, y - 3, x + 3, y + 3, SURFACE - 15);
        frame
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn touch_becomes_a_normalized_cursor() {
        let mut pipeline = pipeline();
        let mut log = EventLog::new();

        // 6×6 square centred on (32, 24): centroid (31.5, 23.5).
        let analysis = pipeline.process_and_emit(&touch_at(32, 24), ms(0), &mut log).unwrap();

        assert_eq!(analysis.blobs.len(), 1);
        assert_eq!(analysis.touch_pixels, 36);
        match analysis.events[..] {
            [CursorEvent::Add { id, x, y }] => {
                assert_eq!(id, CursorId(0));
                assert!((x - 23.5 / 48.0).abs() < 1e-6);
                assert!((y - (1.0 - 15.5 / 32.0)).abs() < 1e-6);
            }
            ref other => panic!("unexpected events {other:?}"),
        }
        assert_eq!(log.frames().len(), 1);
    }

    #[test]
    fn lifted_touch_is_removed_after_grace() {
        let mut pipeline = pipeline();
        let clear = DepthFrame::filled(64, 48, SURFACE);

        pipeline.process_frame(&touch_at(32, 24), ms(0)).unwrap();
        assert!(pipeline.process_frame(&clear, ms(33)).unwrap().events.is_empty());
        let events = pipeline.process_frame(&clear, ms(66)).unwrap().events;
        assert_eq!(events, vec![CursorEvent::Remove { id: CursorId(0) }]);
    }

    #[test]
    fn touches_outside_the_roi_are_ignored() {
        let mut pipeline = pipeline();
        let analysis = pipeline.process_frame(&touch_at(4, 4), ms(0)).unwrap();
        assert!(analysis.blobs.is_empty());
        assert!(analysis.events.is_empty());
    }

    #[test]
    fn empty_and_mismatched_frames_are_dropped_silently() {
        let mut pipeline = pipeline();
        let mut log = EventLog::new();

        let empty = DepthFrame::filled(64, 48, 0);
        let err = pipeline.process_and_emit(&empty, ms(0), &mut log).unwrap_err();
        assert_eq!(err, FrameError::Empty);

        let small = DepthFrame::filled(32, 24, SURFACE);
        assert!(matches!(
            pipeline.process_and_emit(&small, ms(0), &mut log),
            Err(FrameError::DimensionMismatch { .. })
        ));
        assert!(log.frames().is_empty());
    }

    #[test]
    fn dropped_frames_do_not_age_cursors() {
        let mut pipeline = pipeline();
        let empty = DepthFrame::filled(64, 48, 0);

        pipeline.process_frame(&touch_at(32, 24), ms(0)).unwrap();
        for _ in 0..5 {
            assert!(pipeline.process_frame(&empty, ms(10)).is_err());
        }
        let events = pipeline.process_frame(&touch_at(33, 24), ms(20)).unwrap().events;
        assert!(matches!(events[..], [CursorEvent::Update { id: CursorId(0), .. }]));
    }

    #[test]
    fn roi_updates_are_clamped_or_rejected() {
        let mut pipeline = pipeline();
        pipeline.set_roi(Roi::new(0, 500, 0, 500)).unwrap();
        assert_eq!(pipeline.roi(), Roi::full(64, 48));

        assert!(pipeline.set_roi(Roi::new(30, 30, 0, 10)).is_err());
        assert_eq!(pipeline.roi(), Roi::full(64, 48));
    }

    #[test]
    fn roi_control_applies_on_next_frame() {
        let (control, rx) = watch::channel(Roi::new(8, 56, 8, 40));
        let mut pipeline = pipeline().with_roi_control(rx);

        control.send(Roi::new(0, 16, 0, 16)).unwrap();
        let analysis = pipeline.process_frame(&touch_at(32, 24), ms(0)).unwrap();
        assert_eq!(pipeline.roi(), Roi::new(0, 16, 0, 16));
        assert!(analysis.blobs.is_empty());

        // A degenerate update is ignored.
        control.send(Roi::new(10, 5, 0, 16)).unwrap();
        pipeline.process_frame(&touch_at(32, 24), ms(33)).unwrap();
        assert_eq!(pipeline.roi(), Roi::new(0, 16, 0, 16));
    }
}
