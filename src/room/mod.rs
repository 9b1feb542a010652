//! Duel room engine
//!
//! Each room is a two-player state machine from creation through live play
//! to terminal settlement. All mutations to a room are serialized behind
//! its lock; settlement runs at most once.

pub mod engine;
pub mod timers;

pub use engine::{DuelCandidate, RoomEngine};
pub use timers::MatchTimers;

use std::time::Duration;

/// Wall-clock duration of a duel before forced settlement
pub const MATCH_DURATION: Duration = Duration::from_secs(30 * 60);

/// Longest chat message relayed between duel participants
pub const MAX_CHAT_MESSAGE_LEN: usize = 500;
