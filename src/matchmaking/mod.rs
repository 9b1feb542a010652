//! Matchmaking for head-to-head duels
//!
//! This module holds the in-memory waiting set, the per-player deadline
//! timers, and the pairing protocol that turns two compatible players into
//! a duel room.

pub mod deadline;
pub mod manager;
pub mod queue;

pub use deadline::DeadlineTimer;
pub use manager::{MatchmakingManager, MatchmakingStatus, PairingOutcome};
pub use queue::MatchQueue;

/// How long a player may wait in the queue before eviction
pub const MATCHMAKING_TIMEOUT_MS: u64 = 30_000;

/// Maximum rating distance between paired players
pub const RATING_WINDOW: i32 = 200;
