//! Socket event types exchanged with clients
//!
//! Client events carry an `ackId`; the gateway answers each one with a
//! single `ack` carrying the same id. Server emits are fire-and-forget.

use crate::types::{
    MatchEndReason, Problem, RatingChange, RoomId, RoomStatus, RoomUser, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope for every client-to-server event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvelope {
    pub ack_id: u64,
    #[serde(flatten)]
    pub event: ClientEvent,
}

/// Client-to-server events
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    FindMatch,
    CancelMatchmaking,
    GetMatchmakingStatus,
    #[serde(rename_all = "camelCase")]
    SubmitSolution {
        room_id: RoomId,
        code: String,
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    LeaveMatch { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    GetRoomStatus { room_id: RoomId },
    GetActiveMatches,
    #[serde(rename_all = "camelCase")]
    RejoinMatch { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    SendMessage { room_id: RoomId, message: String },
}

/// Server-to-client events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Ack(AckPayload),
    MatchFound(MatchFoundPayload),
    MatchmakingStatus(MatchmakingStatusPayload),
    MatchmakingTimeout(MessagePayload),
    MatchmakingError(MessagePayload),
    UserSubmitting(UserActionPayload),
    ScoreUpdate(ScoreUpdatePayload),
    SubmissionUpdate(SubmissionUpdatePayload),
    MatchFinished(MatchFinishedPayload),
    OpponentLeft(UserActionPayload),
    OpponentDisconnected(OpponentDisconnectedPayload),
    OpponentReconnected(UserActionPayload),
    NewMessage(ChatMessagePayload),
}

/// Acknowledgement for one client event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub ack_id: u64,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

impl AckPayload {
    pub fn new<T: Serialize>(ack_id: u64, body: &T) -> Self {
        Self {
            ack_id,
            body: serde_json::to_value(body).unwrap_or_else(|_| serde_json::json!({})),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFoundPayload {
    pub room_id: RoomId,
    pub problem: Problem,
    pub users: Vec<RoomUser>,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingStatusPayload {
    pub in_queue: bool,
    pub queue_size: usize,
    /// Seconds spent waiting so far, if queued
    pub wait_time: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActionPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatePayload {
    pub room_id: RoomId,
    pub users: Vec<RoomUser>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpdatePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub score: i64,
    pub passed_testcases: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFinishedPayload {
    pub room_id: RoomId,
    pub reason: MatchEndReason,
    /// Users sorted by final standing, winner first
    pub users: Vec<RoomUser>,
    pub winner: Option<UserId>,
    pub is_draw: bool,
    pub rating_changes: HashMap<UserId, RatingChange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentDisconnectedPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub temporary: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Room snapshot returned by status and rejoin queries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub problem_id: String,
    pub room_status: RoomStatus,
    pub users: Vec<RoomUser>,
    pub is_active: bool,
    /// Milliseconds until the match timer fires; 0 once terminal
    pub remaining_time: u64,
}
