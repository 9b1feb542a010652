//! Contest rating calculations
//!
//! Each participant's expected rank is derived from pairwise win
//! probabilities against the rest of the field; the rating change scales
//! with how far the actual rank beat (or missed) the expectation.

use crate::types::{RatingChange, UserId};
use skillratings::elo::EloRating;

/// Largest single-contest rating swing in either direction
pub const MAX_CONTEST_SWING: i32 = 100;

/// Lowest rating contest settlement can leave a player at
pub const CONTEST_RATING_FLOOR: i32 = 0;

/// Highest rating contest settlement can leave a player at
pub const CONTEST_RATING_CEIL: i32 = 4000;

/// Provisional players (few games) get a bonus multiplier on gains
const NEW_USER_GAMES: u32 = 6;
const NEW_USER_BONUS: f64 = 1.2;

/// One participant's final standing in a contest
#[derive(Debug, Clone)]
pub struct ContestStanding {
    pub user_id: UserId,
    pub rating: i32,
    pub games_played: u32,
    pub score: i64,
}

/// Settlement output for one participant
#[derive(Debug, Clone)]
pub struct ContestRatingUpdate {
    pub user_id: UserId,
    pub rank: u32,
    pub change: RatingChange,
}

/// K-factor for contests, stepped by experience and strength.
pub fn contest_k_factor(rating: i32, games_played: u32) -> f64 {
    if games_played < NEW_USER_GAMES {
        40.0
    } else if rating < 1400 {
        32.0
    } else if rating < 1800 {
        24.0
    } else if rating < 2200 {
        16.0
    } else {
        8.0
    }
}

fn pairwise_expected(rating_other: i32, rating_own: i32) -> f64 {
    let (e_other, _) = skillratings::elo::expected_score(
        &EloRating {
            rating: rating_other as f64,
        },
        &EloRating {
            rating: rating_own as f64,
        },
    );
    e_other
}

/// Expected rank: 1 plus the sum of probabilities that each opponent
/// finishes ahead.
fn expected_rank(standings: &[ContestStanding], idx: usize) -> f64 {
    let own = standings[idx].rating;
    1.0 + standings
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != idx)
        .map(|(_, other)| pairwise_expected(other.rating, own))
        .sum::<f64>()
}

/// Compute rating updates for an already-ranked field.
///
/// `standings` must be ordered by final rank (best first); ranks are
/// assigned 1..n in that order.
pub fn contest_rating_changes(standings: &[ContestStanding]) -> Vec<ContestRatingUpdate> {
    standings
        .iter()
        .enumerate()
        .map(|(idx, standing)| {
            let rank = (idx + 1) as u32;
            let exp_rank = expected_rank(standings, idx);
            let performance = (exp_rank - rank as f64) / exp_rank;

            let k = contest_k_factor(standing.rating, standing.games_played);
            let mut delta = (k * performance).round() as i32;
            if standing.games_played < NEW_USER_GAMES && delta > 0 {
                delta = (delta as f64 * NEW_USER_BONUS).round() as i32;
            }
            let delta = delta.clamp(-MAX_CONTEST_SWING, MAX_CONTEST_SWING);

            let new_rating =
                (standing.rating + delta).clamp(CONTEST_RATING_FLOOR, CONTEST_RATING_CEIL);

            ContestRatingUpdate {
                user_id: standing.user_id.clone(),
                rank,
                change: RatingChange {
                    old_rating: standing.rating,
                    new_rating,
                    rating_change: new_rating - standing.rating,
                },
            }
        })
        .collect()
}

/// Rank an unordered field by score (descending, stable) and settle it.
pub fn settle_contest(mut field: Vec<ContestStanding>) -> Vec<ContestRatingUpdate> {
    field.sort_by(|a, b| b.score.cmp(&a.score));
    contest_rating_changes(&field)
}
