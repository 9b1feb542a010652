//! Room lifecycle: create, submit, forfeit, timeout, rejoin, settle
//!
//! Live rooms are held in memory and mirrored to the store on every
//! mutation; completed rooms are served from the store. A per-room async
//! mutex serializes submit/forfeit/timeout, and settlement is guarded by
//! the terminal-state check under that lock, so a timer firing that races
//! a final submission converges on a single `matchFinished`.

use crate::error::{ArenaError, Result};
use crate::judge::evaluator::{Evaluation, Evaluator};
use crate::metrics::MetricsCollector;
use crate::matchmaking::deadline::DeadlineTimer;
use crate::room::timers::MatchTimers;
use crate::room::{MATCH_DURATION, MAX_CHAT_MESSAGE_LEN};
use crate::rating::elo::{duel_rating_changes, DuelOutcome, DuelPlayer};
use crate::session::events::{
    ChatMessagePayload, MatchFinishedPayload, MatchFoundPayload, MessagePayload, RoomSnapshot,
    ScoreUpdatePayload, ServerEvent, SubmissionUpdatePayload, UserActionPayload,
};
use crate::session::registry::SessionSink;
use crate::store::Store;
use crate::types::{
    Language, MatchEndReason, Problem, Room, RoomId, RoomStatus, RoomUser, RatingChange,
    SubmissionStatus, UserId,
};
use crate::utils::{current_timestamp, generate_room_id};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// A player entering a duel, snapshotted from matchmaking
#[derive(Debug, Clone)]
pub struct DuelCandidate {
    pub user_id: UserId,
    pub username: String,
    pub rating: i32,
    pub games_played: u32,
}

/// In-memory state of one live room
struct ActiveRoom {
    room: Room,
    problem: Problem,
    ends_at: DateTime<Utc>,
    /// Sessions currently attached to this room's broadcasts
    attached: HashSet<UserId>,
    /// Games-played snapshots for K-factor selection at settlement
    games_played: HashMap<UserId, u32>,
}

impl ActiveRoom {
    fn snapshot(&self) -> RoomSnapshot {
        let remaining = (self.ends_at - current_timestamp()).num_milliseconds().max(0);
        RoomSnapshot {
            room_id: self.room.room_id,
            problem_id: self.room.problem_id.clone(),
            room_status: self.room.room_status,
            users: self.room.users.clone(),
            is_active: self.room.is_active,
            remaining_time: remaining as u64,
        }
    }
}

/// The duel room engine
pub struct RoomEngine {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<ActiveRoom>>>>,
    timers: MatchTimers,
    store: Arc<dyn Store>,
    evaluator: Arc<dyn Evaluator>,
    sink: Arc<dyn SessionSink>,
    metrics: Arc<MetricsCollector>,
    match_duration: Duration,
}

impl RoomEngine {
    pub fn new(
        store: Arc<dyn Store>,
        evaluator: Arc<dyn Evaluator>,
        sink: Arc<dyn SessionSink>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_match_duration(store, evaluator, sink, metrics, MATCH_DURATION)
    }

    pub fn with_match_duration(
        store: Arc<dyn Store>,
        evaluator: Arc<dyn Evaluator>,
        sink: Arc<dyn SessionSink>,
        metrics: Arc<MetricsCollector>,
        match_duration: Duration,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            timers: MatchTimers::new(),
            store,
            evaluator,
            sink,
            metrics,
            match_duration,
        }
    }

    /// Number of live rooms
    pub fn live_room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Whether the user is a member of any live room
    pub async fn is_in_live_room(&self, user_id: &UserId) -> bool {
        let handles: Vec<_> = self
            .rooms
            .read()
            .map(|rooms| rooms.values().cloned().collect())
            .unwrap_or_default();

        for handle in handles {
            let active = handle.lock().await;
            if active.room.is_member(user_id) {
                return true;
            }
        }
        false
    }

    fn room_handle(&self, room_id: &RoomId) -> Option<Arc<Mutex<ActiveRoom>>> {
        self.rooms
            .read()
            .ok()
            .and_then(|rooms| rooms.get(room_id).cloned())
    }

    fn drop_room(&self, room_id: &RoomId) {
        if let Ok(mut rooms) = self.rooms.write() {
            rooms.remove(room_id);
        }
    }

    async fn broadcast(&self, active: &ActiveRoom, event: ServerEvent) {
        for user_id in &active.attached {
            if let Err(e) = self.sink.send(user_id, event.clone()).await {
                warn!("Failed to deliver room event to {}: {}", user_id, e);
            }
        }
    }

    /// Create a room for two paired players. Both sessions are notified of
    /// the match or of the failure.
    pub async fn create_room(
        self: &Arc<Self>,
        first: DuelCandidate,
        second: DuelCandidate,
    ) -> Result<RoomId> {
        let problem = match self.store.random_problem().await {
            Ok(Some(problem)) => problem,
            Ok(None) => {
                let payload = MessagePayload {
                    message: "No problems available for a duel".to_string(),
                };
                for candidate in [&first, &second] {
                    let _ = self
                        .sink
                        .send(
                            &candidate.user_id,
                            ServerEvent::MatchmakingError(payload.clone()),
                        )
                        .await;
                }
                return Err(ArenaError::internal("Problem pool is empty").into());
            }
            Err(e) => {
                let payload = MessagePayload {
                    message: "Failed to start the duel".to_string(),
                };
                for candidate in [&first, &second] {
                    let _ = self
                        .sink
                        .send(
                            &candidate.user_id,
                            ServerEvent::MatchmakingError(payload.clone()),
                        )
                        .await;
                }
                return Err(e);
            }
        };

        let room_id = generate_room_id();
        let started_at = current_timestamp();
        let ends_at = started_at
            + chrono::Duration::from_std(self.match_duration)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));

        let room = Room {
            room_id,
            problem_id: problem.id.clone(),
            users: vec![
                RoomUser::new(first.user_id.clone(), first.username.clone(), first.rating),
                RoomUser::new(second.user_id.clone(), second.username.clone(), second.rating),
            ],
            room_status: RoomStatus::Live,
            is_active: true,
            created_at: started_at,
        };

        self.store.upsert_room(room.clone()).await?;

        let active = ActiveRoom {
            room: room.clone(),
            problem: problem.clone(),
            ends_at,
            attached: [first.user_id.clone(), second.user_id.clone()]
                .into_iter()
                .collect(),
            games_played: [
                (first.user_id.clone(), first.games_played),
                (second.user_id.clone(), second.games_played),
            ]
            .into_iter()
            .collect(),
        };

        if let Ok(mut rooms) = self.rooms.write() {
            rooms.insert(room_id, Arc::new(Mutex::new(active)));
        }

        // Schedule the forced settlement.
        let engine = Arc::clone(self);
        let timer = DeadlineTimer::schedule(self.match_duration, async move {
            engine.handle_timeout(room_id).await;
        });
        self.timers.insert(room_id, timer, started_at);

        let payload = MatchFoundPayload {
            room_id,
            problem,
            users: room.users.clone(),
            started_at,
            ends_at,
        };
        for candidate in [&first, &second] {
            if let Err(e) = self
                .sink
                .send(&candidate.user_id, ServerEvent::MatchFound(payload.clone()))
                .await
            {
                warn!("Failed to notify {} of match: {}", candidate.user_id, e);
            }
        }

        self.metrics.record_room_created();
        info!(
            room_id = %room_id,
            problem_id = %payload.problem.id,
            "Duel room created for {} vs {}",
            first.username,
            second.username
        );

        Ok(room_id)
    }

    /// Handle a member's submission: evaluate, record, broadcast, and
    /// settle if every member is done.
    pub async fn submit(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        code: &str,
        language_raw: &str,
    ) -> Result<Evaluation> {
        let language = Language::parse(language_raw).ok_or_else(|| {
            ArenaError::bad_input(format!("Unsupported language: {}", language_raw))
        })?;

        let handle = self
            .room_handle(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;
        let mut active = handle.lock().await;

        if active.room.room_status != RoomStatus::Live {
            return Err(ArenaError::conflict("Match is already completed").into());
        }
        let member = active
            .room
            .member(user_id)
            .ok_or_else(|| ArenaError::Forbidden {
                reason: "Not a member of this match".to_string(),
            })?;
        if member.submission_status != SubmissionStatus::Pending {
            return Err(ArenaError::conflict("Solution already submitted").into());
        }

        let username = member.username.clone();
        self.broadcast(
            &active,
            ServerEvent::UserSubmitting(UserActionPayload {
                room_id: *room_id,
                user_id: user_id.clone(),
                username,
            }),
        )
        .await;

        // The evaluator result is always recorded, even when it arrives
        // after the deadline; the room lock is held across the call.
        let evaluation = self
            .evaluator
            .evaluate(&active.problem, code, language)
            .await?;

        let now = current_timestamp();
        if let Some(member) = active.room.member_mut(user_id) {
            member.score = evaluation.score;
            member.submission_status = SubmissionStatus::Submitted;
            member.submission_time = Some(now);
        }

        if let Err(e) = self.store.upsert_room(active.room.clone()).await {
            error!(room_id = %room_id, "Failed to persist submission: {}", e);
        }

        self.broadcast(
            &active,
            ServerEvent::ScoreUpdate(ScoreUpdatePayload {
                room_id: *room_id,
                users: active.room.users.clone(),
            }),
        )
        .await;
        self.broadcast(
            &active,
            ServerEvent::SubmissionUpdate(SubmissionUpdatePayload {
                room_id: *room_id,
                user_id: user_id.clone(),
                score: evaluation.score,
                passed_testcases: evaluation.passed_testcases,
            }),
        )
        .await;

        let everyone_done = active
            .room
            .users
            .iter()
            .all(|u| u.submission_status != SubmissionStatus::Pending);
        let settled = if everyone_done {
            self.settle_locked(&mut active, MatchEndReason::AllSubmitted)
                .await
        } else {
            false
        };

        drop(active);
        if settled {
            self.drop_room(room_id);
        }

        Ok(evaluation)
    }

    /// Handle a member leaving mid-match.
    pub async fn forfeit(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        let handle = self
            .room_handle(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;
        let mut active = handle.lock().await;

        if active.room.room_status != RoomStatus::Live {
            return Err(ArenaError::conflict("Match is already completed").into());
        }
        let member = active
            .room
            .member(user_id)
            .ok_or_else(|| ArenaError::Forbidden {
                reason: "Not a member of this match".to_string(),
            })?;
        // Submission state is monotonic: only a pending player can leave.
        if member.submission_status != SubmissionStatus::Pending {
            return Err(ArenaError::conflict("Submission already recorded").into());
        }

        let username = member.username.clone();
        if let Some(member) = active.room.member_mut(user_id) {
            member.submission_status = SubmissionStatus::Forfeited;
            member.score = 0;
        }

        self.broadcast(
            &active,
            ServerEvent::OpponentLeft(UserActionPayload {
                room_id: *room_id,
                user_id: user_id.clone(),
                username,
            }),
        )
        .await;

        let alive = active
            .room
            .users
            .iter()
            .filter(|u| u.submission_status != SubmissionStatus::Forfeited)
            .count();
        let settled = if alive <= 1 {
            self.settle_locked(&mut active, MatchEndReason::Forfeit).await
        } else {
            if let Err(e) = self.store.upsert_room(active.room.clone()).await {
                error!(room_id = %room_id, "Failed to persist forfeit: {}", e);
            }
            false
        };

        drop(active);
        if settled {
            self.drop_room(room_id);
        }

        Ok(())
    }

    /// Forced settlement when the match duration expires. Idempotent: a
    /// room that settled first makes this a no-op.
    pub async fn handle_timeout(&self, room_id: RoomId) {
        let Some(handle) = self.room_handle(&room_id) else {
            return;
        };
        let mut active = handle.lock().await;

        if active.room.room_status != RoomStatus::Live {
            return;
        }

        info!(room_id = %room_id, "Match duration expired, settling");
        let settled = self
            .settle_locked(&mut active, MatchEndReason::Timeout)
            .await;

        drop(active);
        if settled {
            self.drop_room(&room_id);
        }
    }

    /// Reattach a member's session to a live room's broadcast set.
    pub async fn rejoin(&self, room_id: &RoomId, user_id: &UserId) -> Result<RoomSnapshot> {
        let handle = self
            .room_handle(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;
        let mut active = handle.lock().await;

        if !active.room.is_member(user_id) {
            return Err(ArenaError::Forbidden {
                reason: "Not a member of this match".to_string(),
            }
            .into());
        }

        let newly_attached = active.attached.insert(user_id.clone());
        if newly_attached {
            let username = active
                .room
                .member(user_id)
                .map(|m| m.username.clone())
                .unwrap_or_default();
            let payload = UserActionPayload {
                room_id: *room_id,
                user_id: user_id.clone(),
                username,
            };
            for other in active.attached.iter().filter(|id| *id != user_id) {
                let _ = self
                    .sink
                    .send(other, ServerEvent::OpponentReconnected(payload.clone()))
                    .await;
            }
        }

        Ok(active.snapshot())
    }

    /// Room snapshot for status queries; completed rooms come from the
    /// store.
    pub async fn status(&self, room_id: &RoomId) -> Result<RoomSnapshot> {
        if let Some(handle) = self.room_handle(room_id) {
            let active = handle.lock().await;
            return Ok(active.snapshot());
        }

        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or_else(|| ArenaError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;

        Ok(RoomSnapshot {
            room_id: room.room_id,
            problem_id: room.problem_id.clone(),
            room_status: room.room_status,
            users: room.users.clone(),
            is_active: room.is_active,
            remaining_time: 0,
        })
    }

    /// Snapshots of every live room the user belongs to.
    pub async fn active_matches(&self, user_id: &UserId) -> Vec<RoomSnapshot> {
        let handles: Vec<_> = self
            .rooms
            .read()
            .map(|rooms| rooms.values().cloned().collect())
            .unwrap_or_default();

        let mut snapshots = Vec::new();
        for handle in handles {
            let active = handle.lock().await;
            if active.room.is_member(user_id) {
                snapshots.push(active.snapshot());
            }
        }
        snapshots
    }

    /// Relay a chat message to everyone attached to the room.
    pub async fn send_chat(&self, room_id: &RoomId, user_id: &UserId, message: &str) -> Result<()> {
        let handle = self
            .room_handle(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound {
                room_id: room_id.to_string(),
            })?;
        let active = handle.lock().await;

        let member = active
            .room
            .member(user_id)
            .ok_or_else(|| ArenaError::Forbidden {
                reason: "Not a member of this match".to_string(),
            })?;

        let truncated: String = message.chars().take(MAX_CHAT_MESSAGE_LEN).collect();
        let payload = ChatMessagePayload {
            room_id: *room_id,
            user_id: user_id.clone(),
            username: member.username.clone(),
            message: truncated,
            timestamp: current_timestamp(),
        };
        self.broadcast(&active, ServerEvent::NewMessage(payload)).await;

        Ok(())
    }

    /// Detach a disconnecting session from its rooms and tell the
    /// remaining members. Disconnection never forfeits; the match timer is
    /// the implicit reconnection window.
    pub async fn handle_disconnect(&self, user_id: &UserId) {
        let handles: Vec<_> = self
            .rooms
            .read()
            .map(|rooms| rooms.values().cloned().collect())
            .unwrap_or_default();

        for handle in handles {
            let mut active = handle.lock().await;
            if active.attached.remove(user_id) {
                let payload = crate::session::events::OpponentDisconnectedPayload {
                    room_id: active.room.room_id,
                    user_id: user_id.clone(),
                    temporary: true,
                };
                for other in active.attached.iter() {
                    let _ = self
                        .sink
                        .send(other, ServerEvent::OpponentDisconnected(payload.clone()))
                        .await;
                }
            }
        }
    }

    /// Cancel all timers (shutdown path).
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    /// Outstanding match timers (for health reporting).
    pub fn timer_count(&self) -> usize {
        self.timers.active_count()
    }

    /// One-shot settlement. Returns true when this call performed the
    /// settlement; callers then remove the room from the live map.
    async fn settle_locked(&self, active: &mut ActiveRoom, reason: MatchEndReason) -> bool {
        if active.room.room_status != RoomStatus::Live {
            return false;
        }

        let room_id = active.room.room_id;
        self.timers.clear(&room_id);

        // Final standing: score, then earliest submission, then having
        // submitted at all; the sort is stable beyond that.
        active.room.users.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| match (a.submission_time, b.submission_time) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });

        let users = active.room.users.clone();
        let is_draw = users.len() == 2 && users[0].score == users[1].score;

        // Forfeit hands the win to the surviving player regardless of
        // scores; otherwise the sort order decides, draws excepted.
        let (first, second, outcome) = match reason {
            MatchEndReason::Forfeit => {
                let survivor_idx = users
                    .iter()
                    .position(|u| u.submission_status != SubmissionStatus::Forfeited)
                    .unwrap_or(0);
                let other_idx = 1 - survivor_idx;
                (&users[survivor_idx], &users[other_idx], DuelOutcome::WinA)
            }
            _ if is_draw => (&users[0], &users[1], DuelOutcome::Draw),
            _ => (&users[0], &users[1], DuelOutcome::WinA),
        };

        let player_a = DuelPlayer {
            rating: first.rating,
            games_played: active.games_played.get(&first.user_id).copied().unwrap_or(0),
        };
        let player_b = DuelPlayer {
            rating: second.rating,
            games_played: active
                .games_played
                .get(&second.user_id)
                .copied()
                .unwrap_or(0),
        };
        let (change_a, change_b) = duel_rating_changes(&player_a, &player_b, outcome);

        let mut rating_changes: HashMap<UserId, RatingChange> = HashMap::new();
        rating_changes.insert(first.user_id.clone(), change_a.clone());
        rating_changes.insert(second.user_id.clone(), change_b.clone());

        // Rating writes are best-effort and parallel; a store failure is
        // logged and settlement still completes.
        let (write_a, write_b) = tokio::join!(
            self.store
                .update_user_rating(&first.user_id, change_a.new_rating),
            self.store
                .update_user_rating(&second.user_id, change_b.new_rating),
        );
        for (user, result) in [(&first.user_id, write_a), (&second.user_id, write_b)] {
            if let Err(e) = result {
                error!(room_id = %room_id, "Rating write failed for {}: {}", user, e);
            }
        }

        active.room.room_status = RoomStatus::Completed;
        active.room.is_active = false;
        if let Err(e) = self.store.upsert_room(active.room.clone()).await {
            error!(room_id = %room_id, "Failed to persist settled room: {}", e);
        }

        let winner = if matches!(reason, MatchEndReason::Forfeit) {
            Some(first.user_id.clone())
        } else if is_draw {
            None
        } else {
            Some(first.user_id.clone())
        };

        let payload = MatchFinishedPayload {
            room_id,
            reason,
            users: active.room.users.clone(),
            winner,
            is_draw: !matches!(reason, MatchEndReason::Forfeit) && is_draw,
            rating_changes,
        };
        self.broadcast(&active, ServerEvent::MatchFinished(payload)).await;

        self.metrics.record_room_settled(reason);
        info!(room_id = %room_id, reason = ?reason, "Duel settled");

        true
    }
}
