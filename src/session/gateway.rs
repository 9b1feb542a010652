//! Per-connection authenticated event loop
//!
//! One task per socket: inbound frames are decoded into client events and
//! dispatched; outbound events (acks included) funnel through the
//! connection's channel so ordering matches the room lock's release order.

use crate::error::Result;
use crate::judge::evaluator::Evaluation;
use crate::matchmaking::manager::{MatchmakingManager, PairingOutcome};
use crate::room::engine::{DuelCandidate, RoomEngine};
use crate::session::auth::{extract_token, TokenVerifier};
use crate::session::events::{AckPayload, ClientEnvelope, ClientEvent, RoomSnapshot, ServerEvent};
use crate::session::registry::{SessionRegistry, SessionSink};
use crate::store::Store;
use crate::types::{User, UserId};
use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared dependencies for every connection
pub struct SessionGateway {
    pub registry: Arc<SessionRegistry>,
    pub verifier: TokenVerifier,
    pub store: Arc<dyn Store>,
    pub matchmaking: Arc<MatchmakingManager>,
    pub rooms: Arc<RoomEngine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindMatchAck {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    room_id: Option<crate::types::RoomId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAck {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passed_testcases: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotAck {
    success: bool,
    #[serde(flatten)]
    snapshot: RoomSnapshot,
}

impl SessionGateway {
    pub fn new(
        registry: Arc<SessionRegistry>,
        verifier: TokenVerifier,
        store: Arc<dyn Store>,
        matchmaking: Arc<MatchmakingManager>,
        rooms: Arc<RoomEngine>,
    ) -> Self {
        Self {
            registry,
            verifier,
            store,
            matchmaking,
            rooms,
        }
    }

    /// Verify the token from the connection headers and load the user.
    pub async fn authenticate(
        &self,
        cookie_header: Option<&str>,
        auth_header: Option<&str>,
    ) -> Result<User> {
        let token = extract_token(cookie_header, auth_header).ok_or_else(|| {
            crate::error::ArenaError::Unauthorized {
                reason: "Missing access token".to_string(),
            }
        })?;

        let claims = self.verifier.verify(&token)?;

        self.store
            .get_user(&claims.id)
            .await?
            .ok_or_else(|| {
                crate::error::ArenaError::Unauthorized {
                    reason: "Unknown user".to_string(),
                }
                .into()
            })
    }

    /// Drive one authenticated connection until it closes.
    pub async fn handle_socket(self: Arc<Self>, mut socket: WebSocket, user: User) {
        let (connection_id, mut rx) = self
            .registry
            .register(user.id.clone(), user.username.clone());

        info!("Session connected: {} ({})", user.username, user.id);

        loop {
            tokio::select! {
                // Outbound: forward queued events to the socket.
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            let Ok(encoded) = serde_json::to_string(&event) else { continue };
                            if socket.send(Message::Text(encoded)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                // Inbound: decode and dispatch client events.
                maybe_msg = socket.recv() => {
                    match maybe_msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&user, &text).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            debug!("Socket error for {}: {}", user.id, e);
                            break;
                        }
                    }
                }
            }
        }

        self.handle_disconnect(&user.id, connection_id).await;
        info!("Session disconnected: {} ({})", user.username, user.id);
    }

    /// Decode one frame and answer it with exactly one ack.
    async fn handle_frame(&self, user: &User, text: &str) {
        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Undecodable frame from {}: {}", user.id, e);
                return;
            }
        };
        let ack_id = raw.get("ackId").and_then(Value::as_u64).unwrap_or(0);

        let body = match serde_json::from_value::<ClientEnvelope>(raw) {
            Ok(envelope) => self.dispatch(user, envelope.event).await,
            Err(e) => json!({"success": false, "message": format!("Invalid event: {}", e)}),
        };

        let ack = ServerEvent::Ack(AckPayload { ack_id, body });
        let _ = self.registry.send(&user.id, ack).await;
    }

    /// Route one client event; the returned value becomes the ack body.
    async fn dispatch(&self, user: &User, event: ClientEvent) -> Value {
        match event {
            ClientEvent::FindMatch => self.on_find_match(user).await,
            ClientEvent::CancelMatchmaking => {
                if self.matchmaking.cancel(&user.id).await {
                    json!({"success": true, "message": "Matchmaking cancelled"})
                } else {
                    json!({"success": false, "message": "Not searching for a match"})
                }
            }
            ClientEvent::GetMatchmakingStatus => {
                let status = self.matchmaking.status(&user.id).await;
                json!({
                    "success": true,
                    "inQueue": status.in_queue,
                    "queueSize": status.queue_size,
                    "waitTime": status.wait_time,
                })
            }
            ClientEvent::SubmitSolution {
                room_id,
                code,
                language,
            } => {
                match self.rooms.submit(&room_id, &user.id, &code, &language).await {
                    Ok(Evaluation {
                        score,
                        passed_testcases,
                    }) => to_value(&SubmitAck {
                        success: true,
                        score: Some(score),
                        passed_testcases: Some(passed_testcases),
                        message: None,
                    }),
                    Err(e) => to_value(&SubmitAck {
                        success: false,
                        score: None,
                        passed_testcases: None,
                        message: Some(error_message(&e)),
                    }),
                }
            }
            ClientEvent::LeaveMatch { room_id } => {
                match self.rooms.forfeit(&room_id, &user.id).await {
                    Ok(()) => json!({"success": true, "message": "Left the match"}),
                    Err(e) => json!({"success": false, "message": error_message(&e)}),
                }
            }
            ClientEvent::GetRoomStatus { room_id } => {
                match self.rooms.status(&room_id).await {
                    Ok(snapshot) => to_value(&SnapshotAck {
                        success: true,
                        snapshot,
                    }),
                    Err(e) => json!({"success": false, "message": error_message(&e)}),
                }
            }
            ClientEvent::GetActiveMatches => {
                let matches = self.rooms.active_matches(&user.id).await;
                json!({"success": true, "matches": matches})
            }
            ClientEvent::RejoinMatch { room_id } => {
                match self.rooms.rejoin(&room_id, &user.id).await {
                    Ok(snapshot) => to_value(&SnapshotAck {
                        success: true,
                        snapshot,
                    }),
                    Err(e) => json!({"success": false, "message": error_message(&e)}),
                }
            }
            ClientEvent::SendMessage { room_id, message } => {
                match self.rooms.send_chat(&room_id, &user.id, &message).await {
                    Ok(()) => json!({"success": true}),
                    Err(e) => json!({"success": false, "message": error_message(&e)}),
                }
            }
        }
    }

    async fn on_find_match(&self, user: &User) -> Value {
        // Re-read the user so the queue carries the current rating.
        let fresh = match self.store.get_user(&user.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) | Err(_) => user.clone(),
        };

        let candidate = DuelCandidate {
            user_id: fresh.id.clone(),
            username: fresh.username.clone(),
            rating: fresh.rating,
            games_played: fresh.games_played,
        };

        match self.matchmaking.find_match(candidate).await {
            Ok(PairingOutcome::Matched { room_id }) => to_value(&FindMatchAck {
                success: true,
                message: "Match found".to_string(),
                status: Some("matched"),
                queue_position: None,
                room_id: Some(room_id),
            }),
            Ok(PairingOutcome::Searching { queue_position }) => to_value(&FindMatchAck {
                success: true,
                message: "Searching for an opponent".to_string(),
                status: Some("searching"),
                queue_position: Some(queue_position),
                room_id: None,
            }),
            Err(e) => to_value(&FindMatchAck {
                success: false,
                message: error_message(&e),
                status: None,
                queue_position: None,
                room_id: None,
            }),
        }
    }

    /// Terminal session event: dequeue, detach from rooms, deregister.
    /// Never forfeits; the match timer is the implicit reconnection window.
    async fn handle_disconnect(&self, user_id: &UserId, connection_id: uuid::Uuid) {
        self.matchmaking.handle_disconnect(user_id).await;
        self.rooms.handle_disconnect(user_id).await;
        if !self.registry.unregister(user_id, connection_id) {
            debug!("Stale connection for {} already superseded", user_id);
        }
    }
}

fn to_value<T: Serialize>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or_else(|e| {
        warn!("Failed to encode ack body: {}", e);
        json!({"success": false, "message": "Internal error"})
    })
}

/// User-facing message for a handler error: domain errors verbatim,
/// anything else generic.
fn error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<crate::error::ArenaError>() {
        Some(domain) => domain.to_string(),
        None => "Internal error".to_string(),
    }
}
