//! Rating systems for duels and contests
//!
//! Pure, deterministic rating math. Duels use a clamped Elo update; contest
//! settlement uses an expected-rank performance model. Both share the Elo
//! expected-score curve from `skillratings`.

pub mod contest;
pub mod elo;

pub use contest::{contest_rating_changes, settle_contest, ContestRatingUpdate, ContestStanding};
pub use elo::{duel_rating_changes, expected_score, tier_for, DuelOutcome, DuelPlayer};
