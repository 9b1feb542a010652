//! Duel Arena - Coordination core for a competitive-programming platform
//!
//! This crate pairs connected players into rated head-to-head duels,
//! manages each duel room from creation through settlement, and dispatches
//! code-execution jobs to out-of-process judge workers.

pub mod config;
pub mod error;
pub mod httpapi;
pub mod judge;
pub mod matchmaking;
pub mod metrics;
pub mod rating;
pub mod room;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ArenaError, Result};
pub use types::*;

// Re-export key components
pub use judge::{JobCache, JudgeClient};
pub use matchmaking::MatchmakingManager;
pub use room::RoomEngine;
pub use session::{SessionRegistry, SessionSink};
pub use store::{InMemoryStore, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
