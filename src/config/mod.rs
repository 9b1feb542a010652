//! Configuration management for the coordination core

pub mod app;

pub use app::{
    validate_config, AppConfig, AuthSettings, CacheSettings, DuelSettings, MatchmakingSettings,
    ServiceSettings,
};
