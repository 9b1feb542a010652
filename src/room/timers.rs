//! Match timer and match-start bookkeeping
//!
//! One table maps rooms to their scheduled timeout timers, one to their
//! start instants. Both entries are cleared in settlement; shutdown cancels
//! everything outstanding.

use crate::matchmaking::deadline::DeadlineTimer;
use crate::types::RoomId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Process-wide tables of match timers and start instants
#[derive(Debug, Default)]
pub struct MatchTimers {
    timers: Mutex<HashMap<RoomId, DeadlineTimer>>,
    starts: Mutex<HashMap<RoomId, DateTime<Utc>>>,
}

impl MatchTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a room's timer and start instant. A replaced timer is
    /// cancelled.
    pub fn insert(&self, room_id: RoomId, timer: DeadlineTimer, started_at: DateTime<Utc>) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(previous) = timers.insert(room_id, timer) {
                previous.cancel();
            }
        }
        if let Ok(mut starts) = self.starts.lock() {
            starts.insert(room_id, started_at);
        }
    }

    /// Cancel and remove a room's timer and start entry. Safe to call from
    /// any settlement path, including the timer's own firing.
    pub fn clear(&self, room_id: &RoomId) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(timer) = timers.remove(room_id) {
                timer.cancel();
            }
        }
        if let Ok(mut starts) = self.starts.lock() {
            starts.remove(room_id);
        }
    }

    pub fn start_of(&self, room_id: &RoomId) -> Option<DateTime<Utc>> {
        self.starts
            .lock()
            .ok()
            .and_then(|starts| starts.get(room_id).copied())
    }

    pub fn active_count(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    /// Cancel every outstanding timer (shutdown path).
    pub fn shutdown(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            debug!("Cancelling {} outstanding match timers", timers.len());
            for (_, timer) in timers.drain() {
                timer.cancel();
            }
        }
        if let Ok(mut starts) = self.starts.lock() {
            starts.clear();
        }
    }
}
