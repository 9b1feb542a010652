//! Main application state and service coordination
//!
//! AppState builds every component, wires the session gateway into the
//! router, runs the listener, and tears everything down (timers included)
//! on shutdown.

use crate::config::AppConfig;
use crate::httpapi::{self, handlers::ApiContext};
use crate::judge::cache::{InMemoryJobCache, JobCache, RedisJobCache};
use crate::judge::client::JudgeClient;
use crate::judge::evaluator::{Evaluator, QueueBackedEvaluator};
use crate::matchmaking::manager::MatchmakingManager;
use crate::metrics::MetricsCollector;
use crate::room::engine::RoomEngine;
use crate::session::auth::TokenVerifier;
use crate::session::gateway::SessionGateway;
use crate::session::registry::SessionRegistry;
use crate::store::{InMemoryStore, Store};
use chrono::{DateTime, Utc};
use deadpool_redis::Runtime;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache connection error: {message}")]
    CacheConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn Store>,
    registry: Arc<SessionRegistry>,
    matchmaking: Arc<MatchmakingManager>,
    rooms: Arc<RoomEngine>,
    judge: Arc<JudgeClient>,
    metrics: Arc<MetricsCollector>,
    gateway: Arc<SessionGateway>,
    started_at: DateTime<Utc>,
    is_running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
    server_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies. The document
    /// store and job cache collaborators default to the in-process
    /// implementations unless a cache URL points at a reachable broker.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        Self::with_store(config, store).await
    }

    /// Initialize with an explicit store collaborator.
    pub async fn with_store(
        config: AppConfig,
        store: Arc<dyn Store>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing duel-arena coordination service");

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to build metrics registry: {}", e),
            }
        })?);

        let cache = Self::initialize_cache(&config)?;
        let judge = Arc::new(JudgeClient::new(cache, store.clone()));
        let evaluator: Arc<dyn Evaluator> =
            Arc::new(QueueBackedEvaluator::new(judge.clone()));

        let registry = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomEngine::with_match_duration(
            store.clone(),
            evaluator,
            registry.clone(),
            metrics.clone(),
            config.match_duration(),
        ));

        let matchmaking = Arc::new(MatchmakingManager::new(
            rooms.clone(),
            registry.clone(),
            metrics.clone(),
            config.matchmaking.rating_window,
            config.matchmaking_timeout(),
        ));

        let verifier = TokenVerifier::new(&config.auth.access_token_secret);
        let gateway = Arc::new(SessionGateway::new(
            registry.clone(),
            verifier,
            store.clone(),
            matchmaking.clone(),
            rooms.clone(),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            store,
            registry,
            matchmaking,
            rooms,
            judge,
            metrics,
            gateway,
            started_at: crate::utils::current_timestamp(),
            is_running: Arc::new(RwLock::new(false)),
            shutdown_tx,
            server_task: None,
        })
    }

    fn initialize_cache(config: &AppConfig) -> Result<Arc<dyn JobCache>, ServiceError> {
        match deadpool_redis::Config::from_url(&config.cache.url)
            .create_pool(Some(Runtime::Tokio1))
        {
            Ok(pool) => Ok(Arc::new(RedisJobCache::new(pool))),
            Err(e) => {
                error!(
                    "Cache pool unavailable ({}), falling back to in-memory job cache",
                    e
                );
                Ok(Arc::new(InMemoryJobCache::new()))
            }
        }
    }

    /// Bind the listener and start serving.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let ctx = ApiContext {
            store: self.store.clone(),
            judge: self.judge.clone(),
            verifier: TokenVerifier::new(&self.config.auth.access_token_secret),
            gateway: self.gateway.clone(),
            metrics: self.metrics.clone(),
            cors_origin: self.config.service.cors_origin.clone(),
        };
        let app = httpapi::router(ctx);

        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.service.port)
            .parse()
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid listen address: {}", e),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to bind {}: {}", addr, e),
            })?;

        info!("Listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Server shutdown signal received");
        });

        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        }));

        *self.is_running.write().await = true;
        Ok(())
    }

    /// Stop serving and release every outstanding timer.
    pub async fn stop(&mut self) {
        info!("Stopping service components...");
        *self.is_running.write().await = false;

        let _ = self.shutdown_tx.send(());
        self.matchmaking.shutdown();
        self.rooms.shutdown();

        if let Some(task) = self.server_task.take() {
            let _ = task.await;
        }
        info!("Service components stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn queue_size(&self) -> usize {
        self.matchmaking.queue_size().await
    }

    pub fn live_room_count(&self) -> usize {
        self.rooms.live_room_count()
    }

    pub fn outstanding_timers(&self) -> usize {
        self.rooms.timer_count() + self.matchmaking.deadline_count()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}
