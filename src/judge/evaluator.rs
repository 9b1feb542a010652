//! Evaluator seam for duel submissions
//!
//! A duel submission needs a score synchronously (the room lock is held
//! open across the call). The queue-backed implementation routes through
//! the judge workers and waits for the result; the fixed implementation
//! backs tests.

use crate::error::{ArenaError, Result};
use crate::judge::client::{EnqueueRequest, JudgeClient};
use crate::judge::{JobMode, JobStatus};
use crate::types::{Language, Problem};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Outcome of evaluating one duel submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub score: i64,
    pub passed_testcases: u32,
}

/// Trait for scoring duel submissions
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        problem: &Problem,
        code: &str,
        language: Language,
    ) -> Result<Evaluation>;
}

/// Evaluator that dispatches through the judge queue and polls for the
/// result. Every duel language is routed to its worker pool via
/// [`Language::judge_pool`], so C submissions run on the cpp workers.
pub struct QueueBackedEvaluator {
    client: Arc<JudgeClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl QueueBackedEvaluator {
    pub fn new(client: Arc<JudgeClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timing(client: Arc<JudgeClient>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            poll_interval,
            timeout,
        }
    }
}

#[async_trait]
impl Evaluator for QueueBackedEvaluator {
    async fn evaluate(
        &self,
        problem: &Problem,
        code: &str,
        language: Language,
    ) -> Result<Evaluation> {
        let job_id = self
            .client
            .enqueue(EnqueueRequest {
                mode: JobMode::Run,
                code: code.to_string(),
                language: language.judge_pool().as_str().to_string(),
                problem_id: Some(problem.id.clone()),
                test_cases: Some(problem.test_cases.clone()),
            })
            .await?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let response = self.client.poll(&job_id).await?;
            match response.status {
                JobStatus::Completed => {
                    return Ok(Evaluation {
                        score: response.score.unwrap_or(0),
                        passed_testcases: response.passed.unwrap_or(0),
                    });
                }
                JobStatus::Failed => {
                    return Err(ArenaError::EvaluationFailed {
                        reason: format!("Judge worker failed job {}", job_id),
                    }
                    .into());
                }
                JobStatus::Queued | JobStatus::Running => {
                    if tokio::time::Instant::now() >= deadline {
                        warn!(job_id = %job_id, "Evaluation timed out waiting for worker");
                        return Err(ArenaError::EvaluationFailed {
                            reason: format!("Evaluation timed out for job {}", job_id),
                        }
                        .into());
                    }
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Evaluator returning a preconfigured result; used in tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedEvaluator {
    evaluation: Evaluation,
}

impl FixedEvaluator {
    pub fn new(score: i64, passed_testcases: u32) -> Self {
        Self {
            evaluation: Evaluation {
                score,
                passed_testcases,
            },
        }
    }
}

impl Default for FixedEvaluator {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[async_trait]
impl Evaluator for FixedEvaluator {
    async fn evaluate(
        &self,
        _problem: &Problem,
        _code: &str,
        _language: Language,
    ) -> Result<Evaluation> {
        Ok(self.evaluation)
    }
}
