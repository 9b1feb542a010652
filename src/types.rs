//! Common types used throughout the duel-arena coordination core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users (document id in the backing store)
pub type UserId = String;

/// Unique identifier for problems
pub type ProblemId = String;

/// Unique identifier for contests
pub type ContestId = String;

/// Unique identifier for solutions
pub type SolutionId = String;

/// Unique identifier for duel rooms
pub type RoomId = Uuid;

/// Unique identifier for judge jobs
pub type JobId = Uuid;

/// Languages a duel submission may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Python,
    Javascript,
    C,
    Java,
}

impl Language {
    /// Parse a client-supplied language name (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "cpp" | "c++" => Some(Language::Cpp),
            "python" => Some(Language::Python),
            "javascript" | "js" => Some(Language::Javascript),
            "c" => Some(Language::C),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::C => "c",
            Language::Java => "java",
        }
    }

    /// Whether a dedicated judge worker pool exists for this language.
    /// The sandboxes cover python/cpp/java/javascript; plain C has no pool
    /// of its own and is dispatched via [`Language::judge_pool`].
    pub fn has_judge_worker(&self) -> bool {
        !matches!(self, Language::C)
    }

    /// The worker pool that judges this language. C rides the cpp pool,
    /// whose toolchain compiles both.
    pub fn judge_pool(&self) -> Language {
        match self {
            Language::C => Language::Cpp,
            other => *other,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-test-case verdict reported by the judge workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestVerdict {
    Passed,
    Failed,
    #[serde(rename = "TLE")]
    Tle,
    RuntimeError,
}

/// A single test case attached to a problem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Worked example shown in a problem statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemExample {
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A problem as served to clients and duels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: ProblemId,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub examples: Vec<ProblemExample>,
    pub constraints: Vec<String>,
    pub test_cases: Vec<TestCase>,
    pub max_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_solution: Option<String>,
}

impl Problem {
    /// Effective maximum score: the stored value, or 100 per test case if
    /// the test suite outgrew it.
    pub fn actual_max_score(&self) -> i64 {
        self.max_score.max(self.test_cases.len() as i64 * 100)
    }
}

/// A problem a user has fully solved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedProblem {
    pub problem_id: ProblemId,
    pub solved_at: DateTime<Utc>,
}

/// Per-problem entry inside a contest participation record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestProblemEntry {
    pub problem_id: ProblemId,
    pub score: i64,
    pub submission_status: String,
}

/// A user's participation in one contest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestParticipation {
    pub contest_id: ContestId,
    pub score: i64,
    pub contest_problems: Vec<ContestProblemEntry>,
}

/// A platform user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub rating: i32,
    pub games_played: u32,
    pub solved_problems: Vec<SolvedProblem>,
    pub contests_participated: Vec<ContestParticipation>,
}

/// Initial rating for freshly registered users
pub const INITIAL_RATING: i32 = 1000;

/// A contest (multi-problem scheduled event)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub id: ContestId,
    pub title: String,
    pub problems: Vec<ProblemId>,
    pub participants: Vec<UserId>,
    pub submissions: Vec<SolutionId>,
}

impl Contest {
    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }
}

/// Result of running one test case against a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub status: TestVerdict,
}

/// A recorded solution; immutable after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub id: SolutionId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<ContestId>,
    pub problem_id: ProblemId,
    pub solution_code: String,
    pub language_used: Language,
    pub score: i64,
    pub max_score: i64,
    pub test_cases: Vec<TestCaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_occupied: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_occupied: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_given_on_solution: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Submission state of one duel participant; transitions are monotonic
/// (pending may become submitted or forfeited, never the reverse)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Forfeited,
}

/// Lifecycle state of a duel room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Live,
    #[serde(rename = "completed")]
    Completed,
}

/// One participant inside a duel room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub user_id: UserId,
    pub username: String,
    /// Rating snapshot taken when the room was created
    pub rating: i32,
    pub score: i64,
    pub submission_status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<DateTime<Utc>>,
}

impl RoomUser {
    pub fn new(user_id: UserId, username: String, rating: i32) -> Self {
        Self {
            user_id,
            username,
            rating,
            score: 0,
            submission_status: SubmissionStatus::Pending,
            submission_time: None,
        }
    }
}

/// Persistent state of a duel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub problem_id: ProblemId,
    pub users: Vec<RoomUser>,
    pub room_status: RoomStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn member(&self, user_id: &UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| &u.user_id == user_id)
    }

    pub fn member_mut(&mut self, user_id: &UserId) -> Option<&mut RoomUser> {
        self.users.iter_mut().find(|u| &u.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member(user_id).is_some()
    }
}

/// Why a room reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchEndReason {
    AllSubmitted,
    Timeout,
    Forfeit,
}

/// Rating movement for one player after settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_change: i32,
}

/// A player waiting in the matchmaking queue (in-memory only)
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub user_id: UserId,
    pub username: String,
    pub rating: i32,
    pub games_played: u32,
    pub joined_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}
