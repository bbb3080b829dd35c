// THEORY:
// The `cursor_tracker` module adds "object permanence" to the touch engine. It
// takes the stateless list of `Blob`s from a single frame and associates them
// with the cursors it was tracking in the previous frame, solving the data
// association problem with a greedy nearest-neighbor rule.
//
// Lifecycle of a cursor:
// - **Birth**: A blob whose nearest cursor is missing or already claimed in this
//   frame creates a new cursor with the next identity. (`Add`)
// - **Tracking**: Otherwise the nearest cursor moves to the blob. (`Update`)
// - **Stopping**: A moving cursor that nothing touched this frame is marked
//   `Stopped`. This is bookkeeping only and emits nothing.
// - **Death**: A cursor that was already stopped and is still untouched is
//   removed. (`Remove`) A single missed detection therefore never makes a touch
//   flicker.
//
// Identities come from a monotonically increasing counter and are never reused.
//
// Known limitation: matching has no distance cutoff. The nearest cursor is
// always the candidate however far away it is, so a lifted touch and an
// unrelated new touch appearing elsewhere in the same frame can share an
// identity when no other cursor is closer.

use crate::core_modules::blob::Blob;
use crate::core_modules::roi::Roi;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::trace;

const PATH_HISTORY_SIZE: usize = 10;

/// Persistent identity of a tracked touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CursorId(pub u64);

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    Moving,
    Stopped,
}

/// One step of the per-frame cursor protocol, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CursorEvent {
    Add { id: CursorId, x: f32, y: f32 },
    Update { id: CursorId, x: f32, y: f32 },
    Remove { id: CursorId },
}

impl CursorEvent {
    /// The cursor this event is about.
    pub fn id(&self) -> CursorId {
        match self {
            CursorEvent::Add { id, .. }
            | CursorEvent::Update { id, .. }
            | CursorEvent::Remove { id } => *id,
        }
    }
}

/// A touch that is being tracked across frames.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub id: CursorId,
    /// Normalized surface position, `0..1` on both axes, `y` pointing up.
    pub position: (f32, f32),
    pub state: CursorState,
    /// Normalized units per second, zero once the cursor stops.
    pub velocity: (f32, f32),
    /// Most recent positions, oldest first.
    pub path: VecDeque<(f32, f32)>,
    /// Index of the last frame a blob was assigned to this cursor.
    last_touched_frame: u64,
    /// Session time of the last position change.
    last_update_time: Duration,
}

impl Cursor {
    fn new(id: CursorId, position: (f32, f32), frame: u64, time: Duration) -> Self {
        let mut path = VecDeque::with_capacity(PATH_HISTORY_SIZE);
        path.push_back(position);
        Self {
            id,
            position,
            state: CursorState::Moving,
            velocity: (0.0, 0.0),
            path,
            last_touched_frame: frame,
            last_update_time: time,
        }
    }

    /// Moves the cursor and derives its velocity from the previous update.
    /// Two updates at the same session time keep the old velocity.
    fn update(&mut self, position: (f32, f32), frame: u64, time: Duration) {
        let dt = time.saturating_sub(self.last_update_time).as_secs_f32();
        if dt > 0.0 {
            self.velocity = (
                (position.0 - self.position.0) / dt,
                (position.1 - self.position.1) / dt,
            );
        }

        self.position = position;
        self.path.push_back(position);
        if self.path.len() > PATH_HISTORY_SIZE {
            self.path.pop_front();
        }

        self.state = CursorState::Moving;
        self.last_touched_frame = frame;
        self.last_update_time = time;
    }

    /// Magnitude of the velocity.
    pub fn speed(&self) -> f32 {
        self.velocity.0.hypot(self.velocity.1)
    }

    fn distance_to(&self, position: (f32, f32)) -> f32 {
        (self.position.0 - position.0).hypot(self.position.1 - position.1)
    }
}

/// Owns the live cursor set and runs the per-frame assignment.
#[derive(Debug, Default)]
pub struct CursorTracker {
    cursors: Vec<Cursor>,
    next_id: u64,
    frame: u64,
}

impl CursorTracker {
    /// An empty tracker. The first cursor gets id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live cursors, oldest first.
    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    /// Number of live cursors, stopped ones included.
    pub fn live_count(&self) -> usize {
        self.cursors.len()
    }

    /// Feeds one frame's blobs to the tracker and returns the resulting events.
    ///
    /// `roi` is the region the blobs were extracted from and defines the
    /// normalization; `time` is the session time of the frame.
    pub fn update(&mut self, blobs: &[Blob], roi: &Roi, time: Duration) -> Vec<CursorEvent> {
        self.frame += 1;
        let frame = self.frame;
        let mut events = Vec::with_capacity(blobs.len());

        // --- 1. Assignment ---
        for blob in blobs {
            let position = roi.normalize(blob.centroid.0, blob.centroid.1);

            // Nearest live cursor, claimed or not.
            let nearest = self
                .cursors
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.distance_to(position).total_cmp(&b.distance_to(position))
                })
                .map(|(index, _)| index);

            // A cursor already claimed this frame (or born in it) cannot take a
            // second blob; that blob becomes a new cursor.
            match nearest {
                Some(index) if self.cursors[index].last_touched_frame != frame => {
                    let cursor = &mut self.cursors[index];
                    cursor.update(position, frame, time);
                    events.push(CursorEvent::Update {
                        id: cursor.id,
                        x: position.0,
                        y: position.1,
                    });
                }
                _ => {
                    let id = CursorId(self.next_id);
                    self.next_id += 1;
                    self.cursors.push(Cursor::new(id, position, frame, time));
                    trace!(%id, area = blob.area, "new cursor");
                    events.push(CursorEvent::Add {
                        id,
                        x: position.0,
                        y: position.1,
                    });
                }
            }
        }

        // --- 2. Aging ---
        // Stopped cursors left untouched are removed; moving ones only stop.
        self.cursors.retain_mut(|cursor| {
            if cursor.last_touched_frame == frame {
                return true;
            }
            match cursor.state {
                CursorState::Moving => {
                    trace!(id = %cursor.id, "cursor stopped");
                    cursor.state = CursorState::Stopped;
                    cursor.velocity = (0.0, 0.0);
                    true
                }
                CursorState::Stopped => {
                    trace!(id = %cursor.id, "cursor removed");
                    events.push(CursorEvent::Remove { id: cursor.id });
                    false
                }
            }
        });

        events
    }
}
