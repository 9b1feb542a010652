//! Error types for the coordination core
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific coordination scenarios
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("Bad input: {reason}")]
    BadInput { reason: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Problem not found: {problem_id}")]
    ProblemNotFound { problem_id: String },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Contest not found: {contest_id}")]
    ContestNotFound { contest_id: String },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Cache operation failed: {message}")]
    CacheFailed { message: String },

    #[error("Evaluation failed: {reason}")]
    EvaluationFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl ArenaError {
    pub fn bad_input(reason: impl Into<String>) -> Self {
        ArenaError::BadInput {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        ArenaError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ArenaError::InternalError {
            message: message.into(),
        }
    }
}
