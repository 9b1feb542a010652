//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! duel-arena coordination service, including environment variable loading
//! and validation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub auth: AuthSettings,
    pub cache: CacheSettings,
    pub matchmaking: MatchmakingSettings,
    pub duel: DuelSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the HTTP + WebSocket listener
    pub port: u16,
    /// Allowed CORS origin
    pub cors_origin: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret used to verify access tokens
    pub access_token_secret: String,
}

/// Cache (Redis-equivalent) settings for the judge queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Cache connection URL
    pub url: String,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// How long a player may wait in the queue before eviction
    pub timeout_ms: u64,
    /// Maximum rating difference for pairing
    pub rating_window: i32,
}

/// Duel room settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelSettings {
    /// Match duration before forced settlement
    pub duration_seconds: u64,
    /// Maximum chat message length relayed between players
    pub max_chat_message_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            auth: AuthSettings::default(),
            cache: CacheSettings::default(),
            matchmaking: MatchmakingSettings::default(),
            duel: DuelSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "duel-arena".to_string(),
            log_level: "info".to_string(),
            port: 8080,
            cors_origin: "*".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token_secret: "dev-secret-change-in-production".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            timeout_ms: crate::matchmaking::MATCHMAKING_TIMEOUT_MS,
            rating_window: crate::matchmaking::RATING_WINDOW,
        }
    }
}

impl Default for DuelSettings {
    fn default() -> Self {
        Self {
            duration_seconds: crate::room::MATCH_DURATION.as_secs(),
            max_chat_message_len: crate::room::MAX_CHAT_MESSAGE_LEN,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("PORT") {
            config.service.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(origin) = env::var("CORS_ORIGIN") {
            config.service.cors_origin = origin;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Auth settings
        if let Ok(secret) = env::var("ACCESS_TOKEN_SECRET") {
            config.auth.access_token_secret = secret;
        }

        // Cache settings
        if let Ok(url) = env::var("REDIS_URL") {
            config.cache.url = url;
        }

        // Matchmaking settings
        if let Ok(timeout) = env::var("MATCHMAKING_TIMEOUT_MS") {
            config.matchmaking.timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid MATCHMAKING_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(window) = env::var("MATCHMAKING_RATING_WINDOW") {
            config.matchmaking.rating_window = window
                .parse()
                .map_err(|_| anyhow!("Invalid MATCHMAKING_RATING_WINDOW value: {}", window))?;
        }

        // Duel settings
        if let Ok(duration) = env::var("MATCH_DURATION_SECONDS") {
            config.duel.duration_seconds = duration
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_DURATION_SECONDS value: {}", duration))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get matchmaking deadline as Duration
    pub fn matchmaking_timeout(&self) -> Duration {
        Duration::from_millis(self.matchmaking.timeout_ms)
    }

    /// Get match duration as Duration
    pub fn match_duration(&self) -> Duration {
        Duration::from_secs(self.duel.duration_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.port == 0 {
        return Err(anyhow!("Service port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.auth.access_token_secret.is_empty() {
        return Err(anyhow!("ACCESS_TOKEN_SECRET cannot be empty"));
    }

    if config.cache.url.is_empty() {
        return Err(anyhow!("Cache URL cannot be empty"));
    }

    if config.matchmaking.timeout_ms == 0 {
        return Err(anyhow!("Matchmaking timeout must be greater than 0"));
    }
    if config.matchmaking.rating_window <= 0 {
        return Err(anyhow!("Matchmaking rating window must be positive"));
    }

    if config.duel.duration_seconds == 0 {
        return Err(anyhow!("Match duration must be greater than 0"));
    }
    if config.duel.max_chat_message_len == 0 {
        return Err(anyhow!("Chat message limit must be greater than 0"));
    }

    Ok(())
}
