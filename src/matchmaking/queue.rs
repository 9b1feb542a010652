//! In-memory matchmaking waiting set
//!
//! A rating-indexed set of players waiting for an opponent. Each user
//! appears at most once; eviction happens on match, cancel, disconnect, or
//! deadline. The queue itself is a pure data structure; the manager owns
//! the mutex and the deadline timers.

use crate::types::{QueuedPlayer, UserId};
use crate::utils::rating_difference;
use std::collections::HashMap;

/// Waiting set with rating-window candidate search
#[derive(Debug, Default)]
pub struct MatchQueue {
    players: HashMap<UserId, QueuedPlayer>,
    rating_window: i32,
}

impl MatchQueue {
    pub fn new(rating_window: i32) -> Self {
        Self {
            players: HashMap::new(),
            rating_window,
        }
    }

    /// Insert a player. If the user is already queued the previous entry is
    /// replaced (the caller cancels the old deadline).
    pub fn add(&mut self, player: QueuedPlayer) -> Option<QueuedPlayer> {
        self.players.insert(player.user_id.clone(), player)
    }

    /// Remove a player, returning the entry if present.
    pub fn remove(&mut self, user_id: &UserId) -> Option<QueuedPlayer> {
        self.players.remove(user_id)
    }

    /// Find the best opponent for `player` without removing it: any queued
    /// entry (other than the player) within the rating window, preferring
    /// the smallest rating difference and breaking ties by earliest join.
    pub fn find_match(&self, player: &QueuedPlayer) -> Option<&QueuedPlayer> {
        self.players
            .values()
            .filter(|candidate| candidate.user_id != player.user_id)
            .filter(|candidate| {
                rating_difference(candidate.rating, player.rating) <= self.rating_window
            })
            .min_by(|a, b| {
                rating_difference(a.rating, player.rating)
                    .cmp(&rating_difference(b.rating, player.rating))
                    .then(a.joined_at.cmp(&b.joined_at))
            })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&QueuedPlayer> {
        self.players.get(user_id)
    }
}
