//! Session gateway: authenticated per-connection event handling
//!
//! Each client connection is a bidirectional channel bound to a user. The
//! gateway dispatches typed client events into matchmaking and the room
//! engine, acknowledges every event exactly once, and relays server emits
//! back through the registry.

pub mod auth;
pub mod events;
pub mod gateway;
pub mod registry;

pub use auth::{AccessClaims, TokenVerifier};
pub use events::{ClientEnvelope, ClientEvent, ServerEvent};
pub use gateway::SessionGateway;
pub use registry::{MockSessionSink, SessionRegistry, SessionSink};
