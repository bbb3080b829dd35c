use super::{Capture, FrameGrabber, Grab};
use crate::error::FrameError;
use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// Longest a `FeedGrabber` waits for a pushed frame before reporting `Pending`.
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Replays an in-memory list of capture results, optionally paced and looped.
pub struct ScriptedGrabber {
    dimensions: (u32, u32),
    script: Vec<Capture>,
    pending: VecDeque<Capture>,
    interval: Option<Duration>,
    looping: bool,
    on_finish: Option<mpsc::Sender<()>>,
}

impl ScriptedGrabber {
    pub fn new(width: u32, height: u32, script: Vec<Capture>) -> Self {
        Self {
            dimensions: (width, height),
            pending: script.iter().cloned().collect(),
            script,
            interval: None,
            looping: false,
            on_finish: None,
        }
    }

    /// Sleeps `interval` before each frame, imitating a camera's frame rate.
    pub fn paced(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Starts over instead of ending the stream.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Notifies `done` once the script has been played to the end.
    pub fn on_finish(mut self, done: mpsc::Sender<()>) -> Self {
        self.on_finish = Some(done);
        self
    }
}

impl FrameGrabber for ScriptedGrabber {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn grab(&mut self) -> Result<Grab, FrameError> {
        if self.pending.is_empty() && self.looping && !self.script.is_empty() {
            self.pending.extend(self.script.iter().cloned());
        }
        let Some(next) = self.pending.pop_front() else {
            if let Some(done) = self.on_finish.take() {
                let _ = done.send(());
            }
            return Ok(Grab::End);
        };
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        next.map(Grab::Frame)
    }
}

/// Frames pushed one at a time through a channel. The stream ends when every
/// sender is dropped. While the feed is quiet `grab` returns `Pending` every
/// `FEED_POLL_INTERVAL`, so a capture task on it can always be stopped.
pub struct FeedGrabber {
    dimensions: (u32, u32),
    feed: mpsc::Receiver<Capture>,
}

impl FeedGrabber {
    pub fn new(width: u32, height: u32) -> (mpsc::Sender<Capture>, Self) {
        let (tx, feed) = mpsc::channel();
        (
            tx,
            Self {
                dimensions: (width, height),
                feed,
            },
        )
    }
}

impl FrameGrabber for FeedGrabber {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn grab(&mut self) -> Result<Grab, FrameError> {
        match self.feed.recv_timeout(FEED_POLL_INTERVAL) {
            Ok(capture) => capture.map(Grab::Frame),
            Err(RecvTimeoutError::Timeout) => Ok(Grab::Pending),
            Err(RecvTimeoutError::Disconnected) => Ok(Grab::End),
        }
    }
}
