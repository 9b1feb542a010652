//! Test fixtures and helpers for integration testing

use async_trait::async_trait;
use duel_arena::config::AppConfig;
use duel_arena::error::Result;
use duel_arena::httpapi::handlers::ApiContext;
use duel_arena::judge::cache::InMemoryJobCache;
use duel_arena::judge::client::JudgeClient;
use duel_arena::judge::evaluator::{Evaluation, Evaluator, FixedEvaluator};
use duel_arena::matchmaking::manager::MatchmakingManager;
use duel_arena::metrics::MetricsCollector;
use duel_arena::room::engine::{DuelCandidate, RoomEngine};
use duel_arena::session::auth::TokenVerifier;
use duel_arena::session::gateway::SessionGateway;
use duel_arena::session::registry::{MockSessionSink, SessionRegistry};
use duel_arena::store::{InMemoryStore, Store};
use duel_arena::types::{Contest, Language, Problem, TestCase, User};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fully wired in-process system with a recording sink
pub struct TestSystem {
    pub store: Arc<InMemoryStore>,
    pub sink: Arc<MockSessionSink>,
    pub metrics: Arc<MetricsCollector>,
    pub rooms: Arc<RoomEngine>,
    pub matchmaking: Arc<MatchmakingManager>,
}

pub fn test_user(id: &str, rating: i32, games_played: u32) -> User {
    User {
        id: id.to_string(),
        username: format!("{}-name", id),
        rating,
        games_played,
        solved_problems: vec![],
        contests_participated: vec![],
    }
}

pub fn test_problem(id: &str, cases: usize) -> Problem {
    Problem {
        id: id.to_string(),
        title: format!("Problem {}", id),
        description: "Compute the answer".to_string(),
        difficulty: "medium".to_string(),
        examples: vec![],
        constraints: vec!["1 <= n <= 100".to_string()],
        test_cases: (0..cases)
            .map(|i| TestCase {
                input: format!("{}", i),
                expected_output: format!("{}", i * 2),
            })
            .collect(),
        max_score: (cases as i64) * 100,
        canonical_solution: Some("print(int(input()) * 2)".to_string()),
    }
}

pub fn candidate(user: &User) -> DuelCandidate {
    DuelCandidate {
        user_id: user.id.clone(),
        username: user.username.clone(),
        rating: user.rating,
        games_played: user.games_played,
    }
}

/// Evaluator that pops a scripted result per submission, so the two sides
/// of a duel can score differently.
pub struct SequenceEvaluator {
    results: Mutex<VecDeque<Evaluation>>,
}

impl SequenceEvaluator {
    pub fn new(results: Vec<(i64, u32)>) -> Self {
        Self {
            results: Mutex::new(
                results
                    .into_iter()
                    .map(|(score, passed_testcases)| Evaluation {
                        score,
                        passed_testcases,
                    })
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Evaluator for SequenceEvaluator {
    async fn evaluate(
        &self,
        _problem: &Problem,
        _code: &str,
        _language: Language,
    ) -> Result<Evaluation> {
        let next = self
            .results
            .lock()
            .ok()
            .and_then(|mut results| results.pop_front());
        Ok(next.unwrap_or(Evaluation {
            score: 0,
            passed_testcases: 0,
        }))
    }
}

/// Build a complete system around the given evaluator and timings.
pub fn create_test_system(
    evaluator: Arc<dyn Evaluator>,
    match_duration: Duration,
    matchmaking_timeout: Duration,
) -> TestSystem {
    let store = Arc::new(InMemoryStore::new());
    store.seed_problem(test_problem("p1", 5));

    let sink = Arc::new(MockSessionSink::new());
    let metrics = Arc::new(MetricsCollector::new().unwrap());

    let rooms = Arc::new(RoomEngine::with_match_duration(
        store.clone(),
        evaluator,
        sink.clone(),
        metrics.clone(),
        match_duration,
    ));

    let matchmaking = Arc::new(MatchmakingManager::new(
        rooms.clone(),
        sink.clone(),
        metrics.clone(),
        200,
        matchmaking_timeout,
    ));

    TestSystem {
        store,
        sink,
        metrics,
        rooms,
        matchmaking,
    }
}

/// Default system: generous timers, fixed 100-point evaluations.
pub fn default_test_system() -> TestSystem {
    create_test_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        Duration::from_secs(30),
    )
}

/// A contest with the given participants, all registered on problem p1.
pub fn seed_contest(system: &TestSystem, contest_id: &str, participant_ids: &[&str]) {
    system.store.seed_contest(Contest {
        id: contest_id.to_string(),
        title: format!("Contest {}", contest_id),
        problems: vec!["p1".to_string()],
        participants: participant_ids.iter().map(|id| id.to_string()).collect(),
        submissions: vec![],
    });
}

/// An ApiContext over a fresh system, for driving HTTP handlers directly.
pub fn create_api_context(system: &TestSystem) -> ApiContext {
    let config = AppConfig::default();
    let registry = Arc::new(SessionRegistry::new());
    let cache = Arc::new(InMemoryJobCache::new());
    let judge = Arc::new(JudgeClient::new(cache, system.store.clone()));
    let verifier = TokenVerifier::new(&config.auth.access_token_secret);

    let gateway = Arc::new(SessionGateway::new(
        registry,
        TokenVerifier::new(&config.auth.access_token_secret),
        system.store.clone(),
        system.matchmaking.clone(),
        system.rooms.clone(),
    ));

    ApiContext {
        store: system.store.clone(),
        judge,
        verifier,
        gateway,
        metrics: system.metrics.clone(),
        cors_origin: "*".to_string(),
    }
}

/// Advance a user's contest participation the way the submit path does
/// (used to arrange leaderboard states).
pub async fn record_contest_score(
    system: &TestSystem,
    user_id: &str,
    contest_id: &str,
    problem_id: &str,
    score: i64,
    correct: bool,
) {
    use duel_arena::types::{ContestParticipation, ContestProblemEntry};

    let mut user = system
        .store
        .get_user(&user_id.to_string())
        .await
        .unwrap()
        .expect("user must be seeded first");

    let entry = match user
        .contests_participated
        .iter_mut()
        .find(|entry| entry.contest_id == contest_id)
    {
        Some(entry) => entry,
        None => {
            user.contests_participated.push(ContestParticipation {
                contest_id: contest_id.to_string(),
                score: 0,
                contest_problems: vec![],
            });
            user.contests_participated.last_mut().unwrap()
        }
    };

    entry.contest_problems.push(ContestProblemEntry {
        problem_id: problem_id.to_string(),
        score,
        submission_status: if correct { "correct" } else { "attempted" }.to_string(),
    });
    entry.score = entry.contest_problems.iter().map(|p| p.score).sum();

    system.store.put_user(user).await.unwrap();
}
