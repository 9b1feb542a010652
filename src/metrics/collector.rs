//! Metrics collection using Prometheus
//!
//! One registry carries the matchmaking, duel, and judge gauges/counters
//! exposed on the `/metrics` endpoint.

use crate::types::MatchEndReason;
use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Matchmaking queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Players currently waiting
    pub players_waiting: IntGauge,
    /// Total players that entered the queue
    pub players_queued_total: IntCounter,
    /// Total pairings made
    pub pairs_matched_total: IntCounter,
    /// Total queue deadline evictions
    pub timeouts_total: IntCounter,
}

/// Duel room metrics
#[derive(Clone)]
pub struct DuelMetrics {
    /// Rooms currently live
    pub active_rooms: IntGauge,
    /// Total rooms created
    pub rooms_created_total: IntCounter,
    /// Total settlements by reason
    pub rooms_settled_total: IntCounterVec,
}

/// Judge dispatch metrics
#[derive(Clone)]
pub struct JudgeMetrics {
    /// Total jobs enqueued by mode
    pub jobs_enqueued_total: IntCounterVec,
    /// Total poll requests served
    pub polls_total: IntCounter,
}

/// Main metrics collector for the coordination core
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    pub queue: QueueMetrics,
    pub duel: DuelMetrics,
    pub judge: JudgeMetrics,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let queue = QueueMetrics {
            players_waiting: IntGauge::with_opts(Opts::new(
                "arena_players_waiting",
                "Players currently in the matchmaking queue",
            ))?,
            players_queued_total: IntCounter::with_opts(Opts::new(
                "arena_players_queued_total",
                "Total players that entered the matchmaking queue",
            ))?,
            pairs_matched_total: IntCounter::with_opts(Opts::new(
                "arena_pairs_matched_total",
                "Total matchmaking pairings",
            ))?,
            timeouts_total: IntCounter::with_opts(Opts::new(
                "arena_matchmaking_timeouts_total",
                "Total matchmaking deadline evictions",
            ))?,
        };

        let duel = DuelMetrics {
            active_rooms: IntGauge::with_opts(Opts::new(
                "arena_active_rooms",
                "Duel rooms currently live",
            ))?,
            rooms_created_total: IntCounter::with_opts(Opts::new(
                "arena_rooms_created_total",
                "Total duel rooms created",
            ))?,
            rooms_settled_total: IntCounterVec::new(
                Opts::new("arena_rooms_settled_total", "Total duel settlements"),
                &["reason"],
            )?,
        };

        let judge = JudgeMetrics {
            jobs_enqueued_total: IntCounterVec::new(
                Opts::new("arena_jobs_enqueued_total", "Total judge jobs enqueued"),
                &["mode"],
            )?,
            polls_total: IntCounter::with_opts(Opts::new(
                "arena_job_polls_total",
                "Total judge job polls served",
            ))?,
        };

        registry.register(Box::new(queue.players_waiting.clone()))?;
        registry.register(Box::new(queue.players_queued_total.clone()))?;
        registry.register(Box::new(queue.pairs_matched_total.clone()))?;
        registry.register(Box::new(queue.timeouts_total.clone()))?;
        registry.register(Box::new(duel.active_rooms.clone()))?;
        registry.register(Box::new(duel.rooms_created_total.clone()))?;
        registry.register(Box::new(duel.rooms_settled_total.clone()))?;
        registry.register(Box::new(judge.jobs_enqueued_total.clone()))?;
        registry.register(Box::new(judge.polls_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            queue,
            duel,
            judge,
        })
    }

    pub fn record_player_queued(&self, waiting_now: usize) {
        self.queue.players_queued_total.inc();
        self.queue.players_waiting.set(waiting_now as i64);
    }

    pub fn record_queue_size(&self, waiting_now: usize) {
        self.queue.players_waiting.set(waiting_now as i64);
    }

    pub fn record_pair_matched(&self) {
        self.queue.pairs_matched_total.inc();
    }

    pub fn record_matchmaking_timeout(&self) {
        self.queue.timeouts_total.inc();
    }

    pub fn record_room_created(&self) {
        self.duel.rooms_created_total.inc();
        self.duel.active_rooms.inc();
    }

    pub fn record_room_settled(&self, reason: MatchEndReason) {
        let label = match reason {
            MatchEndReason::AllSubmitted => "all_submitted",
            MatchEndReason::Timeout => "timeout",
            MatchEndReason::Forfeit => "forfeit",
        };
        self.duel.rooms_settled_total.with_label_values(&[label]).inc();
        self.duel.active_rooms.dec();
    }

    pub fn record_job_enqueued(&self, mode: &str) {
        self.judge.jobs_enqueued_total.with_label_values(&[mode]).inc();
    }

    pub fn record_job_polled(&self) {
        self.judge.polls_total.inc();
    }

    /// Render the registry in Prometheus text format.
    pub fn export(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to build metrics registry")
    }
}
