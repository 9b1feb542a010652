//! Persistence seam for users, problems, solutions, rooms, and contests
//!
//! The document store itself lives behind this trait; the core only needs
//! id-keyed lookups and writes. The in-memory implementation backs tests
//! and single-process deployments.

use crate::error::{ArenaError, Result};
use crate::types::{Contest, ContestId, Problem, ProblemId, Room, RoomId, Solution, User, UserId};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;

/// Store operations the coordination core depends on
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Overwrite a user document (contest participation upserts go through
    /// here).
    async fn put_user(&self, user: User) -> Result<()>;

    /// Write just the rating field; settlement calls this for both players.
    async fn update_user_rating(&self, user_id: &UserId, new_rating: i32) -> Result<()>;

    async fn get_problem(&self, problem_id: &ProblemId) -> Result<Option<Problem>>;

    /// Pick a problem uniformly at random for a new duel.
    async fn random_problem(&self) -> Result<Option<Problem>>;

    async fn list_problems(&self) -> Result<Vec<Problem>>;

    /// Insert a solution, assigning its id.
    async fn insert_solution(&self, solution: Solution) -> Result<Solution>;

    /// Most recent solution for (user, problem, optional contest).
    async fn latest_solution(
        &self,
        user_id: &UserId,
        problem_id: &ProblemId,
        contest_id: Option<&ContestId>,
    ) -> Result<Option<Solution>>;

    async fn upsert_room(&self, room: Room) -> Result<()>;

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>>;

    async fn get_contest(&self, contest_id: &ContestId) -> Result<Option<Contest>>;

    async fn put_contest(&self, contest: Contest) -> Result<()>;

    /// Load all participants of a contest (for leaderboard aggregation).
    async fn contest_participants(&self, contest_id: &ContestId) -> Result<Vec<User>>;
}

/// In-memory store implementation
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    problems: RwLock<Vec<Problem>>,
    solutions: RwLock<Vec<Solution>>,
    rooms: RwLock<HashMap<RoomId, Room>>,
    contests: RwLock<HashMap<ContestId, Contest>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id.clone(), user);
        }
    }

    pub fn seed_problem(&self, problem: Problem) {
        if let Ok(mut problems) = self.problems.write() {
            problems.push(problem);
        }
    }

    pub fn seed_contest(&self, contest: Contest) {
        if let Ok(mut contests) = self.contests.write() {
            contests.insert(contest.id.clone(), contest);
        }
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.read().map(|s| s.len()).unwrap_or(0)
    }

    fn lock_poisoned() -> ArenaError {
        ArenaError::InternalError {
            message: "Store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| Self::lock_poisoned())?;
        Ok(users.get(user_id).cloned())
    }

    async fn put_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| Self::lock_poisoned())?;
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn update_user_rating(&self, user_id: &UserId, new_rating: i32) -> Result<()> {
        let mut users = self.users.write().map_err(|_| Self::lock_poisoned())?;
        let user = users.get_mut(user_id).ok_or_else(|| ArenaError::UserNotFound {
            user_id: user_id.clone(),
        })?;
        user.rating = new_rating;
        user.games_played += 1;
        Ok(())
    }

    async fn get_problem(&self, problem_id: &ProblemId) -> Result<Option<Problem>> {
        let problems = self.problems.read().map_err(|_| Self::lock_poisoned())?;
        Ok(problems.iter().find(|p| &p.id == problem_id).cloned())
    }

    async fn random_problem(&self) -> Result<Option<Problem>> {
        let problems = self.problems.read().map_err(|_| Self::lock_poisoned())?;
        if problems.is_empty() {
            return Ok(None);
        }
        let idx = rand::thread_rng().gen_range(0..problems.len());
        Ok(Some(problems[idx].clone()))
    }

    async fn list_problems(&self) -> Result<Vec<Problem>> {
        let problems = self.problems.read().map_err(|_| Self::lock_poisoned())?;
        Ok(problems.clone())
    }

    async fn insert_solution(&self, mut solution: Solution) -> Result<Solution> {
        let mut solutions = self.solutions.write().map_err(|_| Self::lock_poisoned())?;
        if solution.id.is_empty() {
            solution.id = format!("sol-{}", solutions.len() + 1);
        }
        solutions.push(solution.clone());
        Ok(solution)
    }

    async fn latest_solution(
        &self,
        user_id: &UserId,
        problem_id: &ProblemId,
        contest_id: Option<&ContestId>,
    ) -> Result<Option<Solution>> {
        let solutions = self.solutions.read().map_err(|_| Self::lock_poisoned())?;
        Ok(solutions
            .iter()
            .filter(|s| &s.user_id == user_id && &s.problem_id == problem_id)
            .filter(|s| match contest_id {
                Some(cid) => s.contest_id.as_deref() == Some(cid.as_str()),
                None => true,
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn upsert_room(&self, room: Room) -> Result<()> {
        let mut rooms = self.rooms.write().map_err(|_| Self::lock_poisoned())?;
        rooms.insert(room.room_id, room);
        Ok(())
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let rooms = self.rooms.read().map_err(|_| Self::lock_poisoned())?;
        Ok(rooms.get(room_id).cloned())
    }

    async fn get_contest(&self, contest_id: &ContestId) -> Result<Option<Contest>> {
        let contests = self.contests.read().map_err(|_| Self::lock_poisoned())?;
        Ok(contests.get(contest_id).cloned())
    }

    async fn put_contest(&self, contest: Contest) -> Result<()> {
        let mut contests = self.contests.write().map_err(|_| Self::lock_poisoned())?;
        contests.insert(contest.id.clone(), contest);
        Ok(())
    }

    async fn contest_participants(&self, contest_id: &ContestId) -> Result<Vec<User>> {
        let contest = self
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| ArenaError::ContestNotFound {
                contest_id: contest_id.clone(),
            })?;

        let users = self.users.read().map_err(|_| Self::lock_poisoned())?;
        Ok(contest
            .participants
            .iter()
            .filter_map(|id| users.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, TestCase};
    use crate::utils::current_timestamp;

    fn test_user(id: &str, rating: i32) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            rating,
            games_played: 0,
            solved_problems: vec![],
            contests_participated: vec![],
        }
    }

    fn test_problem(id: &str) -> Problem {
        Problem {
            id: id.to_string(),
            title: format!("Problem {}", id),
            description: "desc".into(),
            difficulty: "easy".into(),
            examples: vec![],
            constraints: vec![],
            test_cases: vec![TestCase {
                input: "1".into(),
                expected_output: "1".into(),
            }],
            max_score: 100,
            canonical_solution: None,
        }
    }

    fn test_solution(user_id: &str, problem_id: &str, contest_id: Option<&str>) -> Solution {
        Solution {
            id: String::new(),
            user_id: user_id.to_string(),
            contest_id: contest_id.map(|c| c.to_string()),
            problem_id: problem_id.to_string(),
            solution_code: "code".into(),
            language_used: Language::Python,
            score: 100,
            max_score: 100,
            test_cases: vec![],
            time_occupied: None,
            memory_occupied: None,
            time_given_on_solution: None,
            created_at: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_user_rating_update() {
        let store = InMemoryStore::new();
        store.seed_user(test_user("alice", 1000));

        store
            .update_user_rating(&"alice".to_string(), 1020)
            .await
            .unwrap();

        let user = store.get_user(&"alice".to_string()).await.unwrap().unwrap();
        assert_eq!(user.rating, 1020);
        assert_eq!(user.games_played, 1);
    }

    #[tokio::test]
    async fn test_rating_update_for_missing_user_fails() {
        let store = InMemoryStore::new();
        assert!(store
            .update_user_rating(&"ghost".to_string(), 1000)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_random_problem_empty_store() {
        let store = InMemoryStore::new();
        assert!(store.random_problem().await.unwrap().is_none());

        store.seed_problem(test_problem("p1"));
        assert!(store.random_problem().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_latest_solution_filters_by_contest() {
        let store = InMemoryStore::new();
        store
            .insert_solution(test_solution("alice", "p1", None))
            .await
            .unwrap();
        store
            .insert_solution(test_solution("alice", "p1", Some("c1")))
            .await
            .unwrap();

        let for_contest = store
            .latest_solution(&"alice".to_string(), &"p1".to_string(), Some(&"c1".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(for_contest.contest_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_solution_ids_assigned() {
        let store = InMemoryStore::new();
        let first = store
            .insert_solution(test_solution("alice", "p1", None))
            .await
            .unwrap();
        let second = store
            .insert_solution(test_solution("alice", "p1", None))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }
}
