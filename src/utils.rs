//! Utility functions for the coordination core

use crate::types::{JobId, RoomId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique room ID
pub fn generate_room_id() -> RoomId {
    Uuid::new_v4()
}

/// Generate a new unique job ID
pub fn generate_job_id() -> JobId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> i32 {
    (rating1 - rating2).abs()
}

/// Check if two ratings fall inside the given matchmaking window
pub fn ratings_within_window(rating1: i32, rating2: i32, window: i32) -> bool {
    rating_difference(rating1, rating2) <= window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_room_id();
        let id2 = generate_room_id();
        assert_ne!(id1, id2);

        let job1 = generate_job_id();
        let job2 = generate_job_id();
        assert_ne!(job1, job2);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1500, 1400), 100);
        assert_eq!(rating_difference(1400, 1500), 100);
        assert_eq!(rating_difference(1500, 1500), 0);
    }

    #[test]
    fn test_ratings_within_window() {
        assert!(ratings_within_window(1500, 1450, 200));
        assert!(ratings_within_window(1500, 1300, 200));
        assert!(!ratings_within_window(1500, 1299, 200));
    }
}
