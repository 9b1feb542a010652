//! Integration tests for the duel-arena coordination core
//!
//! These tests validate the subsystems working together:
//! - Matchmaking pairing, deadlines, and cancellation
//! - The full duel lifecycle through settlement
//! - Judge dispatch with exactly-once persistence
//! - Contest scoring and leaderboard aggregation

mod fixtures;

use duel_arena::judge::cache::InMemoryJobCache;
use duel_arena::judge::client::{EnqueueRequest, JudgeClient};
use duel_arena::judge::evaluator::{FixedEvaluator, QueueBackedEvaluator};
use duel_arena::judge::JobMode;
use duel_arena::matchmaking::manager::PairingOutcome;
use duel_arena::session::events::ServerEvent;
use duel_arena::store::{InMemoryStore, Store};
use duel_arena::types::{RoomStatus, SubmissionStatus, TestCase};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use fixtures::{
    candidate, create_test_system, default_test_system, seed_contest, test_problem, test_user,
    SequenceEvaluator,
};

// ---------------------------------------------------------------------------
// Matchmaking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_pairing_prefers_closest_rating_then_earliest_join() {
    let system = default_test_system();

    // Bob sits just outside Alice's window so both end up waiting.
    let alice = test_user("alice", 1100, 10);
    let bob = test_user("bob", 1301, 10);
    let carol = test_user("carol", 1200, 10);
    for user in [&alice, &bob, &carol] {
        system.store.seed_user(user.clone());
    }

    let outcome = system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    assert!(matches!(outcome, PairingOutcome::Searching { .. }));

    let outcome = system.matchmaking.find_match(candidate(&bob)).await.unwrap();
    assert!(matches!(outcome, PairingOutcome::Searching { .. }));
    assert_eq!(system.matchmaking.queue_size().await, 2);

    // Carol at 1200: Alice is 100 away, Bob is 101 away; Alice wins.
    let outcome = system.matchmaking.find_match(candidate(&carol)).await.unwrap();
    let PairingOutcome::Matched { room_id } = outcome else {
        panic!("Carol should have been paired");
    };

    // Alice was claimed; Bob still waits; Carol was never enqueued.
    assert_eq!(system.matchmaking.queue_size().await, 1);

    let snapshot = system.rooms.status(&room_id).await.unwrap();
    let members: Vec<_> = snapshot.users.iter().map(|u| u.user_id.as_str()).collect();
    assert!(members.contains(&"alice"));
    assert!(members.contains(&"carol"));

    // Both paired players got matchFound.
    assert_eq!(system.sink.count_events("matchFound"), 2);
}

#[tokio::test]
async fn test_double_find_match_rejected() {
    let system = default_test_system();
    let alice = test_user("alice", 1200, 10);
    system.store.seed_user(alice.clone());

    system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    let second = system.matchmaking.find_match(candidate(&alice)).await;
    assert!(second.is_err());
    assert_eq!(system.matchmaking.queue_size().await, 1);
}

#[tokio::test]
async fn test_find_match_rejected_while_in_live_room() {
    let system = default_test_system();
    let alice = test_user("alice", 1200, 10);
    let bob = test_user("bob", 1210, 10);
    system.store.seed_user(alice.clone());
    system.store.seed_user(bob.clone());

    system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    let outcome = system.matchmaking.find_match(candidate(&bob)).await.unwrap();
    assert!(matches!(outcome, PairingOutcome::Matched { .. }));

    // Either participant asking again is refused while the room is live.
    assert!(system.matchmaking.find_match(candidate(&alice)).await.is_err());
    assert!(system.matchmaking.find_match(candidate(&bob)).await.is_err());
}

#[tokio::test]
async fn test_matchmaking_deadline_evicts_and_notifies() {
    let system = create_test_system(
        Arc::new(FixedEvaluator::new(0, 0)),
        Duration::from_secs(1800),
        Duration::from_millis(50),
    );
    let alice = test_user("alice", 1200, 10);
    system.store.seed_user(alice.clone());

    system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    assert_eq!(system.matchmaking.queue_size().await, 1);

    sleep(Duration::from_millis(150)).await;

    assert_eq!(system.matchmaking.queue_size().await, 0);
    assert_eq!(system.matchmaking.deadline_count(), 0);
    assert_eq!(system.sink.count_events("matchmakingTimeout"), 1);
}

#[tokio::test]
async fn test_cancel_matchmaking_releases_deadline() {
    let system = default_test_system();
    let alice = test_user("alice", 1200, 10);
    system.store.seed_user(alice.clone());

    system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    assert!(system.matchmaking.cancel(&"alice".to_string()).await);
    assert!(!system.matchmaking.cancel(&"alice".to_string()).await);

    assert_eq!(system.matchmaking.queue_size().await, 0);
    assert_eq!(system.matchmaking.deadline_count(), 0);

    // No timeout event fires for a cancelled search.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(system.sink.count_events("matchmakingTimeout"), 0);
}

#[tokio::test]
async fn test_disconnect_evicts_from_queue() {
    let system = default_test_system();
    let alice = test_user("alice", 1200, 10);
    system.store.seed_user(alice.clone());

    system.matchmaking.find_match(candidate(&alice)).await.unwrap();
    system.matchmaking.handle_disconnect(&"alice".to_string()).await;
    assert_eq!(system.matchmaking.queue_size().await, 0);

    let status = system.matchmaking.status(&"alice".to_string()).await;
    assert!(!status.in_queue);
}

// ---------------------------------------------------------------------------
// Duel lifecycle
// ---------------------------------------------------------------------------

async fn paired_system(
    evaluator: Arc<dyn duel_arena::judge::evaluator::Evaluator>,
    match_duration: Duration,
    ratings: (i32, i32),
    games: (u32, u32),
) -> (fixtures::TestSystem, duel_arena::types::RoomId) {
    let system = create_test_system(evaluator, match_duration, Duration::from_secs(30));
    let x = test_user("x", ratings.0, games.0);
    let y = test_user("y", ratings.1, games.1);
    system.store.seed_user(x.clone());
    system.store.seed_user(y.clone());

    system.matchmaking.find_match(candidate(&x)).await.unwrap();
    let outcome = system.matchmaking.find_match(candidate(&y)).await.unwrap();
    let PairingOutcome::Matched { room_id } = outcome else {
        panic!("players should have been paired");
    };
    (system, room_id)
}

#[tokio::test]
async fn test_both_submit_settles_with_higher_score_winning() {
    let (system, room_id) = paired_system(
        Arc::new(SequenceEvaluator::new(vec![(100, 5), (300, 5)])),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    let first = system
        .rooms
        .submit(&room_id, &"x".to_string(), "code-x", "python")
        .await
        .unwrap();
    assert_eq!(first.score, 100);

    // One settlement only, after the second submission.
    assert_eq!(system.sink.count_events("matchFinished"), 0);

    let second = system
        .rooms
        .submit(&room_id, &"y".to_string(), "code-y", "cpp")
        .await
        .unwrap();
    assert_eq!(second.score, 300);

    // matchFinished broadcast to both members, exactly once each.
    assert_eq!(system.sink.count_events("matchFinished"), 2);

    let finished: Vec<_> = system
        .sink
        .events_for(&"x".to_string())
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::MatchFinished(payload) => Some(payload),
            _ => None,
        })
        .collect();
    let payload = &finished[0];
    assert_eq!(payload.winner.as_deref(), Some("y"));
    assert!(!payload.is_draw);
    assert_eq!(payload.users[0].user_id, "y");

    // Winner gained, loser lost; equal established ratings → ±10 (K=20).
    let changes = &payload.rating_changes;
    assert_eq!(changes["y"].rating_change, 10);
    assert_eq!(changes["x"].rating_change, -10);

    // Ratings written through the store.
    let x = system.store.get_user(&"x".to_string()).await.unwrap().unwrap();
    let y = system.store.get_user(&"y".to_string()).await.unwrap().unwrap();
    assert_eq!(x.rating, 1490);
    assert_eq!(y.rating, 1510);

    // Room is terminal and its timer released.
    let snapshot = system.rooms.status(&room_id).await.unwrap();
    assert_eq!(snapshot.room_status, RoomStatus::Completed);
    assert!(!snapshot.is_active);
    assert_eq!(system.rooms.timer_count(), 0);
}

#[tokio::test]
async fn test_submission_status_is_monotonic() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    system
        .rooms
        .submit(&room_id, &"x".to_string(), "code", "python")
        .await
        .unwrap();

    // A second submission by the same user is refused.
    let again = system
        .rooms
        .submit(&room_id, &"x".to_string(), "code", "python")
        .await;
    assert!(again.is_err());

    // The submitted state never reverts, not even through leaveMatch.
    assert!(system.rooms.forfeit(&room_id, &"x".to_string()).await.is_err());
    let snapshot = system.rooms.status(&room_id).await.unwrap();
    let member = snapshot
        .users
        .iter()
        .find(|u| u.user_id == "x")
        .unwrap();
    assert_eq!(member.submission_status, SubmissionStatus::Submitted);
}

#[tokio::test]
async fn test_unsupported_language_rejected() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    let result = system
        .rooms
        .submit(&room_id, &"x".to_string(), "code", "haskell")
        .await;
    assert!(result.is_err());

    // Nothing changed and nothing settled.
    let snapshot = system.rooms.status(&room_id).await.unwrap();
    assert_eq!(snapshot.room_status, RoomStatus::Live);
}

#[tokio::test]
async fn test_forfeit_awards_win_to_survivor() {
    // Both 1000-rated with few games: K = 40, expected 0.5 → ±20.
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(0, 0)),
        Duration::from_secs(1800),
        (1000, 1000),
        (0, 0),
    )
    .await;

    system.rooms.forfeit(&room_id, &"x".to_string()).await.unwrap();

    assert_eq!(system.sink.count_events("matchFinished"), 2);
    let finished: Vec<_> = system
        .sink
        .events_for(&"y".to_string())
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::MatchFinished(payload) => Some(payload),
            _ => None,
        })
        .collect();
    let payload = &finished[0];

    // Survivor wins regardless of scores.
    assert_eq!(payload.winner.as_deref(), Some("y"));
    assert_eq!(payload.rating_changes["y"].rating_change, 20);
    assert_eq!(payload.rating_changes["x"].rating_change, -20);

    let x = system.store.get_user(&"x".to_string()).await.unwrap().unwrap();
    assert_eq!(x.rating, 980);

    // Forfeiting a completed room is refused.
    assert!(system.rooms.forfeit(&room_id, &"y".to_string()).await.is_err());
}

#[tokio::test]
async fn test_timeout_settles_as_draw_with_no_submissions() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(0, 0)),
        Duration::from_millis(80),
        (1200, 1200),
        (40, 40),
    )
    .await;

    sleep(Duration::from_millis(250)).await;

    assert_eq!(system.sink.count_events("matchFinished"), 2);
    let finished: Vec<_> = system
        .sink
        .events_for(&"x".to_string())
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::MatchFinished(payload) => Some(payload),
            _ => None,
        })
        .collect();
    let payload = &finished[0];

    assert!(payload.is_draw);
    assert!(payload.winner.is_none());
    assert!(matches!(
        payload.reason,
        duel_arena::types::MatchEndReason::Timeout
    ));

    // Equal ratings drawing: no movement.
    assert_eq!(payload.rating_changes["x"].rating_change, 0);
    assert_eq!(payload.rating_changes["y"].rating_change, 0);

    let snapshot = system.rooms.status(&room_id).await.unwrap();
    assert_eq!(snapshot.room_status, RoomStatus::Completed);
    assert_eq!(snapshot.remaining_time, 0);
    assert_eq!(system.rooms.timer_count(), 0);
}

#[tokio::test]
async fn test_settlement_races_converge_to_one_match_finished() {
    // Short timer racing a final submission.
    let (system, room_id) = paired_system(
        Arc::new(SequenceEvaluator::new(vec![(100, 5), (200, 5)])),
        Duration::from_millis(60),
        (1500, 1500),
        (50, 50),
    )
    .await;

    let _ = system
        .rooms
        .submit(&room_id, &"x".to_string(), "code", "python")
        .await;
    // Let the submission and the timer race to settle.
    let _ = system
        .rooms
        .submit(&room_id, &"y".to_string(), "code", "python")
        .await;
    sleep(Duration::from_millis(200)).await;

    // Exactly one settlement: two members → two matchFinished deliveries.
    assert_eq!(system.sink.count_events("matchFinished"), 2);
}

#[tokio::test]
async fn test_rejoin_is_idempotent() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    let first = system.rooms.rejoin(&room_id, &"x".to_string()).await.unwrap();
    let second = system.rooms.rejoin(&room_id, &"x".to_string()).await.unwrap();
    let third = system.rooms.rejoin(&room_id, &"x".to_string()).await.unwrap();

    assert_eq!(first.room_id, second.room_id);
    assert_eq!(second.users.len(), third.users.len());
    assert_eq!(second.room_status, RoomStatus::Live);
    for snapshot in [&first, &second, &third] {
        assert!(snapshot.is_active);
        assert!(snapshot.remaining_time > 0);
    }

    // Rejoining never alters membership state.
    let status = system.rooms.status(&room_id).await.unwrap();
    assert!(status
        .users
        .iter()
        .all(|u| u.submission_status == SubmissionStatus::Pending));

    // Non-members are refused.
    assert!(system.rooms.rejoin(&room_id, &"ghost".to_string()).await.is_err());
}

#[tokio::test]
async fn test_disconnect_notifies_room_without_forfeiting() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    system.rooms.handle_disconnect(&"x".to_string()).await;

    assert_eq!(system.sink.count_events("opponentDisconnected"), 1);

    // The match is still live; the disconnected player remains pending.
    let snapshot = system.rooms.status(&room_id).await.unwrap();
    assert_eq!(snapshot.room_status, RoomStatus::Live);
    assert!(snapshot
        .users
        .iter()
        .all(|u| u.submission_status == SubmissionStatus::Pending));

    // Reattaching tells the opponent.
    system.rooms.rejoin(&room_id, &"x".to_string()).await.unwrap();
    assert_eq!(system.sink.count_events("opponentReconnected"), 1);
}

#[tokio::test]
async fn test_chat_broadcast_truncates() {
    let (system, room_id) = paired_system(
        Arc::new(FixedEvaluator::new(100, 5)),
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    let long_message = "a".repeat(700);
    system
        .rooms
        .send_chat(&room_id, &"x".to_string(), &long_message)
        .await
        .unwrap();

    let chats: Vec<_> = system
        .sink
        .events_for(&"y".to_string())
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::NewMessage(payload) => Some(payload),
            _ => None,
        })
        .collect();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].message.len(), 500);

    // Outsiders cannot post into the room.
    assert!(system
        .rooms
        .send_chat(&room_id, &"ghost".to_string(), "hi")
        .await
        .is_err());
}

// ---------------------------------------------------------------------------
// Judge dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_polls_persist_one_solution() {
    let cache = Arc::new(InMemoryJobCache::new());
    let store = Arc::new(InMemoryStore::new());
    store.seed_problem(test_problem("p1", 5));
    let client = Arc::new(JudgeClient::new(cache.clone(), store.clone()));

    let job_id = client
        .enqueue(EnqueueRequest {
            mode: JobMode::Submit,
            code: "print(1)".to_string(),
            language: "python".to_string(),
            problem_id: Some("p1".to_string()),
            test_cases: Some(vec![TestCase {
                input: "1".into(),
                expected_output: "2".into(),
            }]),
        })
        .await
        .unwrap();

    let results = serde_json::json!([
        {"input": "1", "expectedOutput": "2", "actualOutput": "2", "status": "Passed"}
    ])
    .to_string();
    cache.complete_job(&job_id, 80, 4, 5, &results);

    let polls = tokio::join!(
        client.poll(&job_id),
        client.poll(&job_id),
        client.poll(&job_id),
        client.poll(&job_id),
        client.poll(&job_id),
    );

    let responses = [polls.0, polls.1, polls.2, polls.3, polls.4];
    for response in &responses {
        let response = response.as_ref().unwrap();
        assert_eq!(response.score, Some(80));
        assert_eq!(response.passed, Some(4));
        assert_eq!(response.total, Some(5));
    }

    assert_eq!(store.solution_count(), 1);
}

#[tokio::test]
async fn test_c_duel_submission_runs_through_cpp_worker_pool() {
    // The full production path: room engine → queue-backed evaluator →
    // judge client → worker queue. C has no worker pool of its own and
    // must come out the other side via the cpp pool.
    let cache = Arc::new(InMemoryJobCache::new());
    let judge_store = Arc::new(InMemoryStore::new());
    let client = Arc::new(JudgeClient::new(cache.clone(), judge_store));
    let evaluator = Arc::new(QueueBackedEvaluator::with_timing(
        client,
        Duration::from_millis(10),
        Duration::from_secs(2),
    ));

    let (system, room_id) = paired_system(
        evaluator,
        Duration::from_secs(1800),
        (1500, 1500),
        (50, 50),
    )
    .await;

    // Stand-in worker draining the cpp run queue.
    let worker_cache = cache.clone();
    tokio::spawn(async move {
        loop {
            if let Some(job) = worker_cache.queued("code_jobs:cpp:run").first() {
                worker_cache.complete_job(&job.job_id, 300, 5, 5, "[]");
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    });

    let evaluation = system
        .rooms
        .submit(
            &room_id,
            &"x".to_string(),
            "int main(void) { return 0; }",
            "c",
        )
        .await
        .unwrap();
    assert_eq!(evaluation.score, 300);
    assert_eq!(evaluation.passed_testcases, 5);

    // The job landed on the cpp pool; no C queue was ever created.
    let queued = cache.queued("code_jobs:cpp:run");
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].language, duel_arena::types::Language::Cpp);
    assert!(cache.queued("code_jobs:c:run").is_empty());

    // The submission recorded like any other language.
    let snapshot = system.rooms.status(&room_id).await.unwrap();
    let member = snapshot.users.iter().find(|u| u.user_id == "x").unwrap();
    assert_eq!(member.submission_status, SubmissionStatus::Submitted);
    assert_eq!(member.score, 300);
}

// ---------------------------------------------------------------------------
// Contest path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_leaderboard_ordering_and_dense_ranks() {
    use axum::extract::{Path, State};

    let system = default_test_system();
    for (id, rating) in [("alice", 1500), ("bob", 1400), ("carol", 1300)] {
        system.store.seed_user(test_user(id, rating, 10));
    }
    seed_contest(&system, "c1", &["alice", "bob", "carol"]);

    // alice 100 (correct), bob 100 (correct twice on same problem would
    // not double count), carol 50 (attempted).
    fixtures::record_contest_score(&system, "alice", "c1", "p1", 100, true).await;
    fixtures::record_contest_score(&system, "bob", "c1", "p1", 100, true).await;
    fixtures::record_contest_score(&system, "carol", "c1", "p1", 50, false).await;

    let ctx = fixtures::create_api_context(&system);
    let response = duel_arena::httpapi::handlers::get_leaderboard(
        State(ctx),
        Path("c1".to_string()),
    )
    .await
    .unwrap();

    let entries = response.data;
    assert_eq!(entries.len(), 3);

    // Sorted by score descending, ranks 1..n, stable tie order.
    assert_eq!(entries[0].user_id, "alice");
    assert_eq!(entries[1].user_id, "bob");
    assert_eq!(entries[2].user_id, "carol");
    assert_eq!(
        entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    // problemsSolved counts distinct correct problems only.
    assert_eq!(entries[0].problems_solved, 1);
    assert_eq!(entries[2].problems_solved, 0);
}
