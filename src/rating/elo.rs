//! Duel (head-to-head) Elo rating calculations
//!
//! The expected-score curve comes from `skillratings`; the K-factor policy,
//! swing clamp, and rating bounds are the platform's own.

use crate::types::RatingChange;
use skillratings::elo::EloRating;

/// Lowest rating a duel can leave a player at
pub const DUEL_RATING_FLOOR: i32 = 100;

/// Highest rating a duel can leave a player at
pub const DUEL_RATING_CEIL: i32 = 4000;

/// Largest single-duel rating swing
pub const MAX_DUEL_SWING: i32 = 50;

/// Outcome of a duel from player A's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    WinA,
    WinB,
    Draw,
}

impl DuelOutcome {
    /// Actual score S for (A, B)
    fn scores(&self) -> (f64, f64) {
        match self {
            DuelOutcome::WinA => (1.0, 0.0),
            DuelOutcome::WinB => (0.0, 1.0),
            DuelOutcome::Draw => (0.5, 0.5),
        }
    }
}

/// Rating-relevant snapshot of one duel participant
#[derive(Debug, Clone, Copy)]
pub struct DuelPlayer {
    pub rating: i32,
    pub games_played: u32,
}

/// Probability that a player rated `rating_a` beats one rated `rating_b`
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    let (e_a, _) = skillratings::elo::expected_score(
        &EloRating {
            rating: rating_a as f64,
        },
        &EloRating {
            rating: rating_b as f64,
        },
    );
    e_a
}

/// K-factor for duels: provisional and low-rated players move fast,
/// high-rated players move slowly.
pub fn k_factor(player: &DuelPlayer) -> f64 {
    if player.games_played < 30 || player.rating < 1200 {
        40.0
    } else if player.rating >= 2000 {
        10.0
    } else {
        20.0
    }
}

fn apply_delta(rating: i32, delta: i32) -> RatingChange {
    let clamped = delta.clamp(-MAX_DUEL_SWING, MAX_DUEL_SWING);
    let new_rating = (rating + clamped).clamp(DUEL_RATING_FLOOR, DUEL_RATING_CEIL);
    RatingChange {
        old_rating: rating,
        new_rating,
        rating_change: new_rating - rating,
    }
}

/// Compute both players' rating changes for a duel outcome.
pub fn duel_rating_changes(
    a: &DuelPlayer,
    b: &DuelPlayer,
    outcome: DuelOutcome,
) -> (RatingChange, RatingChange) {
    let e_a = expected_score(a.rating, b.rating);
    let e_b = 1.0 - e_a;
    let (s_a, s_b) = outcome.scores();

    let delta_a = (k_factor(a) * (s_a - e_a)).round() as i32;
    let delta_b = (k_factor(b) * (s_b - e_b)).round() as i32;

    (apply_delta(a.rating, delta_a), apply_delta(b.rating, delta_b))
}

/// Display tier for a rating
pub fn tier_for(rating: i32) -> &'static str {
    match rating {
        r if r < 1200 => "Newbie",
        r if r < 1400 => "Pupil",
        r if r < 1600 => "Specialist",
        r if r < 1900 => "Expert",
        r if r < 2100 => "Candidate Master",
        r if r < 2300 => "Master",
        _ => "Grandmaster",
    }
}
