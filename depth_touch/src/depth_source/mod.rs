// THEORY:
// The depth source is the boundary between the camera and the touch engine. It
// owns everything about capture (device handle, frame buffers, the capture task)
// and exposes only two operations to the processing path:
//
// - `update()` waits, without spinning, until a new frame has been completed.
// - `get()` copies the most recently completed frame out.
//
// Capture runs on its own blocking task and publishes each result into a
// `watch` channel, which only ever holds the latest value. Capture therefore
// never waits for processing, and a slow processing path silently skips frames
// instead of falling behind. The copy-out in `get()` happens under the channel's
// short read lock, so the two paths never share a buffer.
//
// Shutdown is a one-shot stop signal followed by waiting for the capture task.
// A grabber must never block indefinitely: when no frame is ready it reports
// `Grab::Pending` so the capture task gets to look at the stop signal again.

mod png_sequence;
mod scripted;

pub use png_sequence::PngSequenceGrabber;
pub use scripted::{FeedGrabber, ScriptedGrabber};

use crate::core_modules::depth_frame::DepthFrame;
use crate::error::{FrameError, SourceError};
use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one capture cycle. Decode failures travel to the processing path
/// so it can drop the frame and carry on.
pub type Capture = Result<DepthFrame, FrameError>;

/// Outcome of one `FrameGrabber::grab` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grab {
    /// A completed frame.
    Frame(DepthFrame),
    /// No frame arrived within the grabber's wait; ask again.
    Pending,
    /// The stream is over.
    End,
}

/// Blocking frame producer driven by the capture task, e.g. a camera driver.
pub trait FrameGrabber: Send + 'static {
    /// Resolution of every frame this grabber produces.
    fn dimensions(&self) -> (u32, u32);

    /// Waits a bounded time for the next frame.
    fn grab(&mut self) -> Result<Grab, FrameError>;
}

/// What the processing path sees of a camera.
#[async_trait]
pub trait DepthSource: Send {
    fn dimensions(&self) -> (u32, u32);

    /// Waits until a frame newer than the last one returned by `get()` exists.
    async fn update(&mut self) -> Result<(), SourceError>;

    /// Copies out the most recently completed frame. Non-blocking.
    fn get(&mut self) -> Capture;
}

/// A `DepthSource` backed by a capture task running a `FrameGrabber`.
pub struct CaptureSource {
    dimensions: (u32, u32),
    frames: watch::Receiver<Option<Capture>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CaptureSource {
    /// Starts capturing. Must be called from within a tokio runtime.
    pub fn start<G: FrameGrabber>(grabber: G) -> Self {
        let dimensions = grabber.dimensions();
        let (frame_tx, frames) = watch::channel(None);
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::task::spawn_blocking(move || capture_loop(grabber, frame_tx, stop_rx));
        info!(width = dimensions.0, height = dimensions.1, "capture started");

        Self {
            dimensions,
            frames,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Signals the capture task to stop and waits for it to finish.
    pub async fn shutdown(mut self) -> Result<(), SourceError> {
        if let Some(stop) = self.stop.take() {
            // The task may already have ended on its own.
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        info!("capture stopped");
        Ok(())
    }
}

#[async_trait]
impl DepthSource for CaptureSource {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    async fn update(&mut self) -> Result<(), SourceError> {
        self.frames.changed().await.map_err(|_| SourceError::Closed)
    }

    fn get(&mut self) -> Capture {
        match &*self.frames.borrow_and_update() {
            Some(capture) => capture.clone(),
            None => Err(FrameError::Empty),
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn capture_loop<G: FrameGrabber>(
    mut grabber: G,
    frames: watch::Sender<Option<Capture>>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut captured = 0u64;
    loop {
        if !matches!(stop.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            debug!("capture received stop signal");
            break;
        }
        if frames.is_closed() {
            debug!("no frame consumers left");
            break;
        }

        match grabber.grab() {
            Ok(Grab::Frame(frame)) => {
                captured += 1;
                frames.send_replace(Some(Ok(frame)));
            }
            Ok(Grab::Pending) => {}
            Ok(Grab::End) => {
                info!(captured, "depth stream ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "capture produced a bad frame");
                frames.send_replace(Some(Err(e)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_frames_and_closes_at_end_of_stream() {
        let (feed, grabber) = FeedGrabber::new(4, 2);
        let mut source = CaptureSource::start(grabber);

        feed.send(Ok(DepthFrame::filled(4, 2, 700))).unwrap();
        source.update().await.unwrap();
        assert_eq!(source.get().unwrap(), DepthFrame::filled(4, 2, 700));

        feed.send(Err(FrameError::Decode("corrupt".into()))).unwrap();
        source.update().await.unwrap();
        assert!(matches!(source.get(), Err(FrameError::Decode(_))));

        drop(feed);
        assert!(matches!(source.update().await, Err(SourceError::Closed)));
        source.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn get_before_any_frame_is_empty() {
        let (feed, grabber) = FeedGrabber::new(4, 2);
        let mut source = CaptureSource::start(grabber);
        assert_eq!(source.get(), Err(FrameError::Empty));
        drop(feed);
        source.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn slow_consumer_sees_only_the_latest_frame() {
        let frames: Vec<_> = (1..=5).map(|d| DepthFrame::filled(2, 2, d)).collect();
        let (done_tx, done_rx) = mpsc::channel();
        let grabber = ScriptedGrabber::new(2, 2, frames.into_iter().map(Ok).collect())
            .on_finish(done_tx);
        let mut source = CaptureSource::start(grabber);

        // Wait until capture has gone through the whole script.
        tokio::task::spawn_blocking(move || done_rx.recv()).await.unwrap().unwrap();

        source.update().await.unwrap();
        assert_eq!(source.get().unwrap(), DepthFrame::filled(2, 2, 5));
        assert!(matches!(source.update().await, Err(SourceError::Closed)));
        source.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_returns_while_the_feed_is_still_open() {
        let (feed, grabber) = FeedGrabber::new(4, 2);
        let mut source = CaptureSource::start(grabber);

        feed.send(Ok(DepthFrame::filled(4, 2, 700))).unwrap();
        source.update().await.unwrap();

        let stopped = tokio::time::timeout(Duration::from_secs(2), source.shutdown()).await;
        assert!(matches!(stopped, Ok(Ok(()))), "capture task did not stop");
        drop(feed);
    }

    #[tokio::test]
    async fn shutdown_stops_an_endless_grabber() {
        let grabber = ScriptedGrabber::new(2, 2, vec![Ok(DepthFrame::filled(2, 2, 9))]).looping();
        let mut source = CaptureSource::start(grabber);
        source.update().await.unwrap();
        source.shutdown().await.unwrap();
    }
}
