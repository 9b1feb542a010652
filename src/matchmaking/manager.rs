//! Matchmaking orchestration: the pairing protocol
//!
//! The manager owns the queue mutex and the per-player deadline timers.
//! The find-then-remove critical section runs entirely under the queue
//! lock, so two concurrent seekers cannot claim the same opponent.

use crate::error::{ArenaError, Result};
use crate::matchmaking::deadline::DeadlineTimer;
use crate::matchmaking::queue::MatchQueue;
use crate::metrics::MetricsCollector;
use crate::room::engine::{DuelCandidate, RoomEngine};
use crate::session::events::{MatchmakingStatusPayload, MessagePayload, ServerEvent};
use crate::session::registry::SessionSink;
use crate::types::{QueuedPlayer, RoomId, UserId};
use crate::utils::current_timestamp;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Result of a findMatch request
#[derive(Debug, Clone, PartialEq)]
pub enum PairingOutcome {
    /// Paired immediately; a room was created
    Matched { room_id: RoomId },
    /// Queued; the deadline timer is armed
    Searching { queue_position: usize },
}

/// Queue status for one user
#[derive(Debug, Clone)]
pub struct MatchmakingStatus {
    pub in_queue: bool,
    pub queue_size: usize,
    /// Seconds waited so far, when queued
    pub wait_time: Option<u64>,
}

/// The matchmaking manager
pub struct MatchmakingManager {
    queue: Mutex<MatchQueue>,
    deadlines: StdMutex<HashMap<UserId, DeadlineTimer>>,
    engine: Arc<RoomEngine>,
    sink: Arc<dyn SessionSink>,
    metrics: Arc<MetricsCollector>,
    timeout: Duration,
}

impl MatchmakingManager {
    pub fn new(
        engine: Arc<RoomEngine>,
        sink: Arc<dyn SessionSink>,
        metrics: Arc<MetricsCollector>,
        rating_window: i32,
        timeout: Duration,
    ) -> Self {
        Self {
            queue: Mutex::new(MatchQueue::new(rating_window)),
            deadlines: StdMutex::new(HashMap::new()),
            engine,
            sink,
            metrics,
            timeout,
        }
    }

    /// Run the pairing protocol for one seeker.
    pub async fn find_match(self: &Arc<Self>, candidate: DuelCandidate) -> Result<PairingOutcome> {
        if self.engine.is_in_live_room(&candidate.user_id).await {
            return Err(ArenaError::conflict("Already in an active match").into());
        }

        let mut queue = self.queue.lock().await;

        if queue.contains(&candidate.user_id) {
            return Err(ArenaError::conflict("Already searching for a match").into());
        }

        let now = current_timestamp();
        let seeker = QueuedPlayer {
            user_id: candidate.user_id.clone(),
            username: candidate.username.clone(),
            rating: candidate.rating,
            games_played: candidate.games_played,
            joined_at: now,
            deadline: now
                + ChronoDuration::from_std(self.timeout)
                    .unwrap_or_else(|_| ChronoDuration::seconds(30)),
        };

        if let Some(opponent) = queue.find_match(&seeker).cloned() {
            // Claim the opponent while still holding the queue lock; the
            // seeker itself was never added.
            queue.remove(&opponent.user_id);
            self.cancel_deadline(&opponent.user_id);
            self.metrics.record_queue_size(queue.len());
            drop(queue);

            let opponent_candidate = DuelCandidate {
                user_id: opponent.user_id.clone(),
                username: opponent.username.clone(),
                rating: opponent.rating,
                games_played: opponent.games_played,
            };

            info!(
                "Paired {} ({}) with {} ({})",
                candidate.username, candidate.rating, opponent.username, opponent.rating
            );
            self.metrics.record_pair_matched();

            let room_id = self
                .engine
                .create_room(opponent_candidate, candidate)
                .await?;

            return Ok(PairingOutcome::Matched { room_id });
        }

        // No opponent: arm the deadline, then enqueue.
        let manager = Arc::clone(self);
        let user_id = candidate.user_id.clone();
        let timer = DeadlineTimer::schedule(self.timeout, async move {
            manager.handle_deadline(user_id).await;
        });

        if let Ok(mut deadlines) = self.deadlines.lock() {
            if let Some(previous) = deadlines.insert(candidate.user_id.clone(), timer) {
                previous.cancel();
            }
        }

        queue.add(seeker);
        let queue_position = queue.len();
        self.metrics.record_player_queued(queue_position);
        drop(queue);

        let _ = self
            .sink
            .send(
                &candidate.user_id,
                ServerEvent::MatchmakingStatus(MatchmakingStatusPayload {
                    in_queue: true,
                    queue_size: queue_position,
                    wait_time: Some(0),
                }),
            )
            .await;

        Ok(PairingOutcome::Searching { queue_position })
    }

    /// Deadline firing: evict and notify if the player is still waiting.
    async fn handle_deadline(&self, user_id: UserId) {
        let evicted = {
            let mut queue = self.queue.lock().await;
            let evicted = queue.remove(&user_id).is_some();
            if evicted {
                self.metrics.record_queue_size(queue.len());
            }
            evicted
        };

        if let Ok(mut deadlines) = self.deadlines.lock() {
            deadlines.remove(&user_id);
        }

        if evicted {
            info!("Matchmaking deadline expired for {}", user_id);
            self.metrics.record_matchmaking_timeout();
            if let Err(e) = self
                .sink
                .send(
                    &user_id,
                    ServerEvent::MatchmakingTimeout(MessagePayload {
                        message: "No opponent found in time, please try again".to_string(),
                    }),
                )
                .await
            {
                warn!("Failed to notify {} of matchmaking timeout: {}", user_id, e);
            }
        }
    }

    /// Explicit dequeue. Returns whether the user was waiting.
    pub async fn cancel(&self, user_id: &UserId) -> bool {
        let removed = {
            let mut queue = self.queue.lock().await;
            let removed = queue.remove(user_id).is_some();
            if removed {
                self.metrics.record_queue_size(queue.len());
            }
            removed
        };
        self.cancel_deadline(user_id);
        removed
    }

    /// Queue status for one user.
    pub async fn status(&self, user_id: &UserId) -> MatchmakingStatus {
        let queue = self.queue.lock().await;
        let entry = queue.get(user_id);
        MatchmakingStatus {
            in_queue: entry.is_some(),
            queue_size: queue.len(),
            wait_time: entry.map(|p| {
                (current_timestamp() - p.joined_at).num_seconds().max(0) as u64
            }),
        }
    }

    /// Terminal session event: silently evict.
    pub async fn handle_disconnect(&self, user_id: &UserId) {
        self.cancel(user_id).await;
    }

    /// Cancel every outstanding deadline (shutdown path).
    pub fn shutdown(&self) {
        if let Ok(mut deadlines) = self.deadlines.lock() {
            for (_, timer) in deadlines.drain() {
                timer.cancel();
            }
        }
    }

    /// Outstanding deadline timers (for health reporting).
    pub fn deadline_count(&self) -> usize {
        self.deadlines
            .lock()
            .map(|deadlines| deadlines.len())
            .unwrap_or(0)
    }

    /// Current queue depth.
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    fn cancel_deadline(&self, user_id: &UserId) {
        if let Ok(mut deadlines) = self.deadlines.lock() {
            if let Some(timer) = deadlines.remove(user_id) {
                timer.cancel();
            }
        }
    }
}
