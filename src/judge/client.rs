//! Judge queue client: enqueue and poll
//!
//! Enqueue validates the payload, writes the job hash, and pushes a
//! descriptor onto the per-language queue. Poll reads the hash, persists a
//! completed submit job as a Solution exactly once, and refreshes the
//! result TTL.

use crate::error::{ArenaError, Result};
use crate::judge::cache::{JobCache, JobDescriptor, JobRecord};
use crate::judge::{queue_key, JobMode, JobStatus};
use crate::store::Store;
use crate::types::{JobId, Language, ProblemId, Solution, TestCase, TestCaseResult};
use crate::utils::{current_timestamp, generate_job_id};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Validated enqueue request
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub mode: JobMode,
    pub code: String,
    pub language: String,
    pub problem_id: Option<ProblemId>,
    pub test_cases: Option<Vec<TestCase>>,
}

/// Poll result returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<JobMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TestCaseResult>>,
}

impl PollResponse {
    fn pending(status: JobStatus) -> Self {
        Self {
            status,
            mode: None,
            score: None,
            passed: None,
            total: None,
            results: None,
        }
    }
}

/// Client for the out-of-process judge workers
pub struct JudgeClient {
    cache: Arc<dyn JobCache>,
    store: Arc<dyn Store>,
}

impl JudgeClient {
    pub fn new(cache: Arc<dyn JobCache>, store: Arc<dyn Store>) -> Self {
        Self { cache, store }
    }

    /// Validate and enqueue a job, returning its id.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<JobId> {
        if request.code.trim().is_empty() {
            return Err(ArenaError::bad_input("Code is required").into());
        }

        let language = Language::parse(&request.language)
            .filter(Language::has_judge_worker)
            .ok_or_else(|| {
                ArenaError::bad_input(format!("Unsupported language: {}", request.language))
            })?;

        let test_cases = request
            .test_cases
            .ok_or_else(|| ArenaError::bad_input("Test cases are required"))?;

        if request.mode == JobMode::Submit && request.problem_id.is_none() {
            return Err(ArenaError::bad_input("problemId is required for submissions").into());
        }

        let job_id = generate_job_id();
        let record = JobRecord::new(
            job_id,
            request.mode,
            language,
            request.code.clone(),
            request.problem_id.clone(),
        );

        self.cache.put_job(&record).await?;

        let descriptor = JobDescriptor {
            job_id,
            mode: request.mode,
            language,
            code: request.code,
            problem_id: request.problem_id,
            test_cases,
        };
        self.cache
            .push_descriptor(&queue_key(language, request.mode), &descriptor)
            .await?;

        info!(
            job_id = %job_id,
            mode = request.mode.as_str(),
            language = language.as_str(),
            "Judge job queued"
        );

        Ok(job_id)
    }

    /// Poll a job. Completed submit jobs are persisted as Solutions at most
    /// once; every read of a completed result refreshes the TTL.
    pub async fn poll(&self, job_id: &JobId) -> Result<PollResponse> {
        let job = self
            .cache
            .get_job(job_id)
            .await?
            .ok_or_else(|| ArenaError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        if job.status != JobStatus::Completed {
            return Ok(PollResponse::pending(job.status));
        }

        let results = parse_results(&job)?;

        if job.mode == JobMode::Submit && !job.persisted {
            // The guard claims exactly one winner across concurrent polls.
            if self.cache.try_mark_persisted(job_id).await? {
                if let Err(e) = self.persist_solution(&job, &results).await {
                    error!(job_id = %job_id, "Failed to persist solution: {}", e);
                    return Err(e);
                }
            }
        }

        self.cache.refresh_ttl(job_id, job.mode.result_ttl()).await?;

        Ok(PollResponse {
            status: job.status,
            mode: Some(job.mode),
            score: job.score,
            passed: job.passed,
            total: job.total,
            results: Some(results),
        })
    }

    async fn persist_solution(&self, job: &JobRecord, results: &[TestCaseResult]) -> Result<()> {
        let problem_id = job.problem_id.clone().ok_or_else(|| {
            ArenaError::internal(format!("Submit job {} has no problemId", job.job_id))
        })?;

        let max_score = match self.store.get_problem(&problem_id).await? {
            Some(problem) => problem.actual_max_score(),
            None => {
                warn!(
                    job_id = %job.job_id,
                    "Problem {} missing at persist time, deriving max score",
                    problem_id
                );
                job.total.unwrap_or(results.len() as u32) as i64 * 100
            }
        };

        let solution = Solution {
            id: String::new(),
            user_id: String::new(),
            contest_id: None,
            problem_id,
            solution_code: job.code.clone(),
            language_used: job.language,
            score: job.score.unwrap_or(0),
            max_score,
            test_cases: results.to_vec(),
            time_occupied: None,
            memory_occupied: None,
            time_given_on_solution: None,
            created_at: current_timestamp(),
        };

        let stored = self.store.insert_solution(solution).await?;
        info!(
            job_id = %job.job_id,
            solution_id = %stored.id,
            "Submit job persisted as solution"
        );

        Ok(())
    }
}

/// Decode the worker's JSON results payload.
fn parse_results(job: &JobRecord) -> Result<Vec<TestCaseResult>> {
    match &job.results {
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            ArenaError::internal(format!(
                "Job {} has malformed results payload: {}",
                job.job_id, e
            ))
            .into()
        }),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::cache::InMemoryJobCache;
    use crate::store::InMemoryStore;
    use crate::types::{Problem, TestVerdict};

    fn test_problem(id: &str, cases: usize) -> Problem {
        Problem {
            id: id.to_string(),
            title: "t".into(),
            description: "d".into(),
            difficulty: "easy".into(),
            examples: vec![],
            constraints: vec![],
            test_cases: (0..cases)
                .map(|i| TestCase {
                    input: format!("{}", i),
                    expected_output: format!("{}", i),
                })
                .collect(),
            max_score: 100,
            canonical_solution: None,
        }
    }

    fn client_with(cases: usize) -> (JudgeClient, Arc<InMemoryJobCache>, Arc<InMemoryStore>) {
        let cache = Arc::new(InMemoryJobCache::new());
        let store = Arc::new(InMemoryStore::new());
        store.seed_problem(test_problem("p1", cases));
        let client = JudgeClient::new(cache.clone(), store.clone());
        (client, cache, store)
    }

    fn submit_request() -> EnqueueRequest {
        EnqueueRequest {
            mode: JobMode::Submit,
            code: "print(1)".into(),
            language: "Python".into(),
            problem_id: Some("p1".into()),
            test_cases: Some(vec![TestCase {
                input: "1".into(),
                expected_output: "1".into(),
            }]),
        }
    }

    fn results_json() -> String {
        serde_json::to_string(&vec![TestCaseResult {
            input: "1".into(),
            expected_output: "1".into(),
            actual_output: "1".into(),
            status: TestVerdict::Passed,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_validates_language() {
        let (client, _, _) = client_with(1);
        let mut request = submit_request();
        request.language = "cobol".into();
        assert!(client.enqueue(request).await.is_err());

        // C has no judge worker even though duels accept it.
        let mut request = submit_request();
        request.language = "c".into();
        assert!(client.enqueue(request).await.is_err());
    }

    #[tokio::test]
    async fn test_enqueue_requires_problem_for_submit() {
        let (client, _, _) = client_with(1);
        let mut request = submit_request();
        request.problem_id = None;
        assert!(client.enqueue(request).await.is_err());
    }

    #[tokio::test]
    async fn test_enqueue_pushes_to_language_queue() {
        let (client, cache, _) = client_with(1);
        let job_id = client.enqueue(submit_request()).await.unwrap();

        let queued = cache.queued("code_jobs:python:submit");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].job_id, job_id);
    }

    #[tokio::test]
    async fn test_poll_unknown_job() {
        let (client, _, _) = client_with(1);
        assert!(client.poll(&generate_job_id()).await.is_err());
    }

    #[tokio::test]
    async fn test_poll_pending_returns_status_only() {
        let (client, _, _) = client_with(1);
        let job_id = client.enqueue(submit_request()).await.unwrap();

        let response = client.poll(&job_id).await.unwrap();
        assert_eq!(response.status, JobStatus::Queued);
        assert!(response.score.is_none());
    }

    #[tokio::test]
    async fn test_poll_persists_exactly_once() {
        let (client, cache, store) = client_with(5);
        let job_id = client.enqueue(submit_request()).await.unwrap();
        cache.complete_job(&job_id, 80, 4, 5, &results_json());

        let mut responses = Vec::new();
        for _ in 0..5 {
            responses.push(client.poll(&job_id).await.unwrap());
        }

        assert_eq!(store.solution_count(), 1);
        for response in &responses {
            assert_eq!(response.status, JobStatus::Completed);
            assert_eq!(response.score, Some(80));
            assert_eq!(response.passed, Some(4));
            assert_eq!(response.total, Some(5));
        }
        // TTL refreshed to the submit window on each read.
        assert_eq!(cache.ttl_of(&job_id), Some(crate::judge::SUBMIT_RESULT_TTL));
    }

    #[tokio::test]
    async fn test_run_jobs_never_persist() {
        let (client, cache, store) = client_with(1);
        let mut request = submit_request();
        request.mode = JobMode::Run;
        request.problem_id = None;

        let job_id = client.enqueue(request).await.unwrap();
        cache.complete_job(&job_id, 100, 1, 1, &results_json());

        client.poll(&job_id).await.unwrap();
        assert_eq!(store.solution_count(), 0);
        assert_eq!(cache.ttl_of(&job_id), Some(crate::judge::RUN_RESULT_TTL));
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_without_persisting() {
        let (client, cache, store) = client_with(1);
        let job_id = client.enqueue(submit_request()).await.unwrap();
        cache.fail_job(&job_id);

        let response = client.poll(&job_id).await.unwrap();
        assert_eq!(response.status, JobStatus::Failed);
        assert_eq!(store.solution_count(), 0);
    }
}
