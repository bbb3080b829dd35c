// THEORY:
// The frame emitter is the outbound side of the engine: whatever speaks the
// cursor protocol to the outside world (a TUIO server, a test harness, a log).
// Each processed frame is delivered as a bracketed batch:
//
//     begin(time) → add / update / remove … → commit()
//
// The engine never looks inside the sink; delivery guarantees and wire encoding
// belong to it. The sinks in this module cover the in-process cases: recording,
// logging, and fanning frames out to any number of async consumers.

use crate::core_modules::cursor_tracker::{CursorEvent, CursorId};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Receiver of the per-frame cursor protocol.
pub trait FrameEmitter {
    fn begin(&mut self, time: Duration);
    fn add(&mut self, id: CursorId, x: f32, y: f32);
    fn update(&mut self, id: CursorId, x: f32, y: f32);
    fn remove(&mut self, id: CursorId);
    fn commit(&mut self);

    /// Delivers a whole frame. Sinks normally keep this default.
    fn emit_frame(&mut self, time: Duration, events: &[CursorEvent]) {
        self.begin(time);
        for event in events {
            match *event {
                CursorEvent::Add { id, x, y } => self.add(id, x, y),
                CursorEvent::Update { id, x, y } => self.update(id, x, y),
                CursorEvent::Remove { id } => self.remove(id),
            }
        }
        self.commit();
    }
}

/// One committed frame of cursor events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TouchFrame {
    /// Session time of the frame.
    #[serde(serialize_with = "as_secs_f64")]
    pub time: Duration,
    pub events: Vec<CursorEvent>,
}

fn as_secs_f64<S: serde::Serializer>(time: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(time.as_secs_f64())
}

/// Assembles events between `begin` and `commit` into a `TouchFrame`.
#[derive(Debug, Default)]
struct FrameBuilder {
    open: Option<TouchFrame>,
}

impl FrameBuilder {
    fn begin(&mut self, time: Duration) {
        self.open = Some(TouchFrame {
            time,
            events: Vec::new(),
        });
    }

    fn push(&mut self, event: CursorEvent) {
        if let Some(frame) = self.open.as_mut() {
            frame.events.push(event);
        }
    }

    fn finish(&mut self) -> Option<TouchFrame> {
        self.open.take()
    }
}

/// Keeps every committed frame in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    builder: FrameBuilder,
    frames: Vec<TouchFrame>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed frames, oldest first.
    pub fn frames(&self) -> &[TouchFrame] {
        &self.frames
    }

    /// All events of all frames, in emission order.
    pub fn events(&self) -> impl Iterator<Item = &CursorEvent> {
        self.frames.iter().flat_map(|f| f.events.iter())
    }
}

impl FrameEmitter for EventLog {
    fn begin(&mut self, time: Duration) {
        self.builder.begin(time);
    }

    fn add(&mut self, id: CursorId, x: f32, y: f32) {
        self.builder.push(CursorEvent::Add { id, x, y });
    }

    fn update(&mut self, id: CursorId, x: f32, y: f32) {
        self.builder.push(CursorEvent::Update { id, x, y });
    }

    fn remove(&mut self, id: CursorId) {
        self.builder.push(CursorEvent::Remove { id });
    }

    fn commit(&mut self) {
        if let Some(frame) = self.builder.finish() {
            self.frames.push(frame);
        }
    }
}

/// Logs the cursor protocol through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEmitter {
    time: Duration,
    events: usize,
}

impl FrameEmitter for TracingEmitter {
    fn begin(&mut self, time: Duration) {
        self.time = time;
        self.events = 0;
    }

    fn add(&mut self, id: CursorId, x: f32, y: f32) {
        self.events += 1;
        debug!(%id, x, y, "add cursor");
    }

    fn update(&mut self, id: CursorId, x: f32, y: f32) {
        self.events += 1;
        debug!(%id, x, y, "update cursor");
    }

    fn remove(&mut self, id: CursorId) {
        self.events += 1;
        debug!(%id, "remove cursor");
    }

    fn commit(&mut self) {
        trace!(time = self.time.as_secs_f64(), events = self.events, "frame committed");
    }
}

/// Publishes each committed frame on a broadcast channel.
///
/// Frames are dropped while nobody is subscribed; lagging subscribers lose the
/// oldest frames, as usual for `broadcast`.
#[derive(Debug)]
pub struct BroadcastEmitter {
    builder: FrameBuilder,
    frames_tx: broadcast::Sender<TouchFrame>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (frames_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            builder: FrameBuilder::default(),
            frames_tx,
        }
    }

    /// A receiver for every frame committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TouchFrame> {
        self.frames_tx.subscribe()
    }
}

impl FrameEmitter for BroadcastEmitter {
    fn begin(&mut self, time: Duration) {
        self.builder.begin(time);
    }

    fn add(&mut self, id: CursorId, x: f32, y: f32) {
        self.builder.push(CursorEvent::Add { id, x, y });
    }

    fn update(&mut self, id: CursorId, x: f32, y: f32) {
        self.builder.push(CursorEvent::Update { id, x, y });
    }

    fn remove(&mut self, id: CursorId) {
        self.builder.push(CursorEvent::Remove { id });
    }

    fn commit(&mut self) {
        if let Some(frame) = self.builder.finish() {
            // No subscribers is not an error for a broadcast sink.
            let _ = self.frames_tx.send(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CursorEvent> {
        vec![
            CursorEvent::Add { id: CursorId(3), x: 0.25, y: 0.5 },
            CursorEvent::Update { id: CursorId(1), x: 0.75, y: 0.5 },
            CursorEvent::Remove { id: CursorId(0) },
        ]
    }

    #[test]
    fn event_log_records_frames_in_order() {
        let mut log = EventLog::new();
        log.emit_frame(Duration::from_millis(10), &sample());
        log.emit_frame(Duration::from_millis(20), &[]);

        assert_eq!(log.frames().len(), 2);
        assert_eq!(log.frames()[0].events, sample());
        assert_eq!(log.frames()[1].time, Duration::from_millis(20));
        assert!(log.frames()[1].events.is_empty());
        assert_eq!(log.events().count(), 3);
    }

    #[test]
    fn events_outside_a_frame_are_ignored() {
        let mut log = EventLog::new();
        log.remove(CursorId(9));
        log.commit();
        assert!(log.frames().is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let mut emitter = BroadcastEmitter::new(4);
        let mut a = emitter.subscribe();
        let mut b = emitter.subscribe();

        emitter.emit_frame(Duration::from_secs(1), &sample());

        let expected = TouchFrame {
            time: Duration::from_secs(1),
            events: sample(),
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        let mut emitter = BroadcastEmitter::new(1);
        emitter.emit_frame(Duration::ZERO, &sample());
    }
}
