//! Judge dispatch: enqueue code-execution jobs and poll their results
//!
//! The judge itself runs out-of-process in per-language workers. The core
//! writes a job hash and a queue descriptor into the shared cache, then
//! serves polls; a completed submit job is persisted as a Solution exactly
//! once.

pub mod cache;
pub mod client;
pub mod evaluator;

pub use cache::{InMemoryJobCache, JobCache, JobDescriptor, JobRecord, RedisJobCache};
pub use client::{EnqueueRequest, JudgeClient, PollResponse};
pub use evaluator::{Evaluation, Evaluator, FixedEvaluator, QueueBackedEvaluator};

use crate::types::{JobId, Language};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TTL applied to run-job results once read
pub const RUN_RESULT_TTL: Duration = Duration::from_secs(120);

/// TTL applied to submit-job results once read
pub const SUBMIT_RESULT_TTL: Duration = Duration::from_secs(600);

/// Execution mode of a judge job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Run,
    Submit,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Run => "run",
            JobMode::Submit => "submit",
        }
    }

    pub fn result_ttl(&self) -> Duration {
        match self {
            JobMode::Run => RUN_RESULT_TTL,
            JobMode::Submit => SUBMIT_RESULT_TTL,
        }
    }
}

/// Lifecycle state of a judge job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Cache key of a job hash
pub fn job_key(job_id: &JobId) -> String {
    format!("job:{}", job_id)
}

/// Cache key of the per-language, per-mode FIFO list. Workers drain the
/// submit list before the run list for their language.
pub fn queue_key(language: Language, mode: JobMode) -> String {
    format!("code_jobs:{}:{}", language.as_str(), mode.as_str())
}
