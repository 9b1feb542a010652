//! Metrics and monitoring for the coordination core

pub mod collector;

pub use collector::{DuelMetrics, JudgeMetrics, MetricsCollector, QueueMetrics};
