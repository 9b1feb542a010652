//! Job cache interface and implementations
//!
//! The shared cache holds one hash per job plus per-language FIFO lists of
//! job descriptors. The Redis implementation is the production path; the
//! in-memory implementation backs tests and broker-less runs with the same
//! semantics, including the `persisted` compare-and-set guard.

use crate::error::{ArenaError, Result};
use crate::types::{JobId, Language, ProblemId, TestCase};
use crate::judge::{job_key, JobMode, JobStatus};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool as RedisPool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Job state as stored in the cache hash
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: JobId,
    pub mode: JobMode,
    pub language: Language,
    pub code: String,
    pub problem_id: Option<ProblemId>,
    pub status: JobStatus,
    pub score: Option<i64>,
    pub passed: Option<u32>,
    pub total: Option<u32>,
    /// JSON-encoded list of per-test-case results, set by the worker
    pub results: Option<String>,
    pub persisted: bool,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(
        job_id: JobId,
        mode: JobMode,
        language: Language,
        code: String,
        problem_id: Option<ProblemId>,
    ) -> Self {
        Self {
            job_id,
            mode,
            language,
            code,
            problem_id,
            status: JobStatus::Queued,
            score: None,
            passed: None,
            total: None,
            results: None,
            persisted: false,
            created_at: current_timestamp(),
        }
    }

    /// Field pairs written to the hash on enqueue. `persisted` is absent
    /// until claimed, so HSETNX can serve as the claim.
    fn to_field_pairs(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("status".to_string(), self.status.as_str().to_string()),
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("language".to_string(), self.language.as_str().to_string()),
            ("code".to_string(), self.code.clone()),
            ("createdAt".to_string(), self.created_at.to_rfc3339()),
        ];
        if let Some(problem_id) = &self.problem_id {
            fields.push(("problemId".to_string(), problem_id.clone()));
        }
        fields
    }

    /// Rebuild a record from raw hash fields, coercing numerics from their
    /// cache string representation.
    fn from_fields(job_id: JobId, fields: &HashMap<String, String>) -> Result<Self> {
        let mode = match fields.get("mode").map(String::as_str) {
            Some("run") => JobMode::Run,
            Some("submit") => JobMode::Submit,
            other => {
                return Err(ArenaError::CacheFailed {
                    message: format!("Job {} has invalid mode {:?}", job_id, other),
                }
                .into())
            }
        };

        let language = fields
            .get("language")
            .and_then(|raw| Language::parse(raw))
            .ok_or_else(|| ArenaError::CacheFailed {
                message: format!("Job {} has invalid language", job_id),
            })?;

        let status = fields
            .get("status")
            .and_then(|raw| JobStatus::parse(raw))
            .ok_or_else(|| ArenaError::CacheFailed {
                message: format!("Job {} has invalid status", job_id),
            })?;

        let created_at = fields
            .get("createdAt")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(current_timestamp);

        Ok(Self {
            job_id,
            mode,
            language,
            code: fields.get("code").cloned().unwrap_or_default(),
            problem_id: fields.get("problemId").cloned(),
            status,
            score: fields.get("score").and_then(|raw| raw.parse().ok()),
            passed: fields.get("passed").and_then(|raw| raw.parse().ok()),
            total: fields.get("total").and_then(|raw| raw.parse().ok()),
            results: fields.get("results").cloned(),
            persisted: fields.get("persisted").map(String::as_str) == Some("true"),
            created_at,
        })
    }
}

/// Descriptor pushed onto the worker queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub mode: JobMode,
    pub language: Language,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<ProblemId>,
    pub test_cases: Vec<TestCase>,
}

/// Trait for job cache operations
#[async_trait]
pub trait JobCache: Send + Sync {
    /// Write the initial job hash.
    async fn put_job(&self, job: &JobRecord) -> Result<()>;

    /// Read the job hash, if present.
    async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>>;

    /// Claim the persist step. Returns true exactly once per job; the
    /// `persisted` field doubles as the compare-and-set guard.
    async fn try_mark_persisted(&self, job_id: &JobId) -> Result<bool>;

    /// Push a descriptor onto the given worker queue (FIFO).
    async fn push_descriptor(&self, queue: &str, descriptor: &JobDescriptor) -> Result<()>;

    /// Reset the job hash expiry.
    async fn refresh_ttl(&self, job_id: &JobId, ttl: Duration) -> Result<()>;
}

/// Redis-backed job cache
pub struct RedisJobCache {
    pool: RedisPool,
}

impl RedisJobCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            ArenaError::CacheFailed {
                message: format!("Failed to get cache connection: {}", e),
            }
            .into()
        })
    }
}

#[async_trait]
impl JobCache for RedisJobCache {
    async fn put_job(&self, job: &JobRecord) -> Result<()> {
        let mut conn = self.connection().await?;
        let key = job_key(&job.job_id);

        let mut cmd = redis::cmd("HSET");
        cmd.arg(&key);
        for (field, value) in job.to_field_pairs() {
            cmd.arg(field).arg(value);
        }
        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ArenaError::CacheFailed {
                message: format!("Failed to write job hash: {}", e),
            })?;

        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        let mut conn = self.connection().await?;

        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(job_key(job_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| ArenaError::CacheFailed {
                message: format!("Failed to read job hash: {}", e),
            })?;

        if fields.is_empty() {
            return Ok(None);
        }

        JobRecord::from_fields(*job_id, &fields).map(Some)
    }

    async fn try_mark_persisted(&self, job_id: &JobId) -> Result<bool> {
        let mut conn = self.connection().await?;

        let claimed: i64 = redis::cmd("HSETNX")
            .arg(job_key(job_id))
            .arg("persisted")
            .arg("true")
            .query_async(&mut conn)
            .await
            .map_err(|e| ArenaError::CacheFailed {
                message: format!("Failed to claim persist guard: {}", e),
            })?;

        Ok(claimed == 1)
    }

    async fn push_descriptor(&self, queue: &str, descriptor: &JobDescriptor) -> Result<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(descriptor)?;

        redis::cmd("RPUSH")
            .arg(queue)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ArenaError::CacheFailed {
                message: format!("Failed to push job descriptor: {}", e),
            })?;

        Ok(())
    }

    async fn refresh_ttl(&self, job_id: &JobId, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;

        redis::cmd("EXPIRE")
            .arg(job_key(job_id))
            .arg(ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| ArenaError::CacheFailed {
                message: format!("Failed to refresh job TTL: {}", e),
            })?;

        Ok(())
    }
}

/// In-memory job cache mirroring the Redis semantics
#[derive(Debug, Default)]
pub struct InMemoryJobCache {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    queues: Mutex<HashMap<String, Vec<String>>>,
    ttls: Mutex<HashMap<JobId, Duration>>,
}

impl InMemoryJobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a worker completing a job (test helper).
    pub fn complete_job(
        &self,
        job_id: &JobId,
        score: i64,
        passed: u32,
        total: u32,
        results_json: &str,
    ) {
        if let Ok(mut jobs) = self.jobs.lock() {
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = JobStatus::Completed;
                job.score = Some(score);
                job.passed = Some(passed);
                job.total = Some(total);
                job.results = Some(results_json.to_string());
            }
        }
    }

    /// Simulate a worker failing a job (test helper).
    pub fn fail_job(&self, job_id: &JobId) {
        if let Ok(mut jobs) = self.jobs.lock() {
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = JobStatus::Failed;
            }
        }
    }

    /// Descriptors currently queued on the given list (test helper).
    pub fn queued(&self, queue: &str) -> Vec<JobDescriptor> {
        self.queues
            .lock()
            .map(|queues| {
                queues
                    .get(queue)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|raw| serde_json::from_str(raw).ok())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Last TTL applied to a job hash (test helper).
    pub fn ttl_of(&self, job_id: &JobId) -> Option<Duration> {
        self.ttls.lock().ok().and_then(|ttls| ttls.get(job_id).copied())
    }

    fn lock_poisoned() -> ArenaError {
        ArenaError::CacheFailed {
            message: "Job cache lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl JobCache for InMemoryJobCache {
    async fn put_job(&self, job: &JobRecord) -> Result<()> {
        let mut jobs = self.jobs.lock().map_err(|_| Self::lock_poisoned())?;
        jobs.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        let jobs = self.jobs.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(jobs.get(job_id).cloned())
    }

    async fn try_mark_persisted(&self, job_id: &JobId) -> Result<bool> {
        let mut jobs = self.jobs.lock().map_err(|_| Self::lock_poisoned())?;
        match jobs.get_mut(job_id) {
            Some(job) if !job.persisted => {
                job.persisted = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn push_descriptor(&self, queue: &str, descriptor: &JobDescriptor) -> Result<()> {
        let mut queues = self.queues.lock().map_err(|_| Self::lock_poisoned())?;
        queues
            .entry(queue.to_string())
            .or_default()
            .push(serde_json::to_string(descriptor)?);
        Ok(())
    }

    async fn refresh_ttl(&self, job_id: &JobId, ttl: Duration) -> Result<()> {
        let mut ttls = self.ttls.lock().map_err(|_| Self::lock_poisoned())?;
        ttls.insert(*job_id, ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_job_id;

    fn test_record(mode: JobMode) -> JobRecord {
        JobRecord::new(
            generate_job_id(),
            mode,
            Language::Python,
            "print(1)".to_string(),
            matches!(mode, JobMode::Submit).then(|| "p1".to_string()),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let cache = InMemoryJobCache::new();
        let record = test_record(JobMode::Submit);
        cache.put_job(&record).await.unwrap();

        let loaded = cache.get_job(&record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Queued);
        assert_eq!(loaded.problem_id.as_deref(), Some("p1"));
        assert!(!loaded.persisted);
    }

    #[tokio::test]
    async fn test_missing_job() {
        let cache = InMemoryJobCache::new();
        assert!(cache.get_job(&generate_job_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_guard_claims_once() {
        let cache = InMemoryJobCache::new();
        let record = test_record(JobMode::Submit);
        cache.put_job(&record).await.unwrap();

        assert!(cache.try_mark_persisted(&record.job_id).await.unwrap());
        assert!(!cache.try_mark_persisted(&record.job_id).await.unwrap());
        assert!(!cache.try_mark_persisted(&record.job_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let cache = InMemoryJobCache::new();
        let first = test_record(JobMode::Run);
        let second = test_record(JobMode::Run);

        for record in [&first, &second] {
            let descriptor = JobDescriptor {
                job_id: record.job_id,
                mode: record.mode,
                language: record.language,
                code: record.code.clone(),
                problem_id: record.problem_id.clone(),
                test_cases: vec![],
            };
            cache
                .push_descriptor("code_jobs:python:run", &descriptor)
                .await
                .unwrap();
        }

        let queued = cache.queued("code_jobs:python:run");
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].job_id, first.job_id);
        assert_eq!(queued[1].job_id, second.job_id);
    }

    #[test]
    fn test_record_field_coercion() {
        let job_id = generate_job_id();
        let mut fields = HashMap::new();
        fields.insert("mode".to_string(), "submit".to_string());
        fields.insert("language".to_string(), "cpp".to_string());
        fields.insert("status".to_string(), "completed".to_string());
        fields.insert("code".to_string(), "int main(){}".to_string());
        fields.insert("score".to_string(), "80".to_string());
        fields.insert("passed".to_string(), "4".to_string());
        fields.insert("total".to_string(), "5".to_string());
        fields.insert("persisted".to_string(), "true".to_string());

        let record = JobRecord::from_fields(job_id, &fields).unwrap();
        assert_eq!(record.score, Some(80));
        assert_eq!(record.passed, Some(4));
        assert_eq!(record.total, Some(5));
        assert!(record.persisted);
    }

    #[test]
    fn test_record_rejects_garbage_mode() {
        let mut fields = HashMap::new();
        fields.insert("mode".to_string(), "compile".to_string());
        fields.insert("language".to_string(), "cpp".to_string());
        fields.insert("status".to_string(), "queued".to_string());

        assert!(JobRecord::from_fields(generate_job_id(), &fields).is_err());
    }
}
