//! HTTP handlers for the contest path and judge surface

use crate::httpapi::response::{ApiError, ApiResponse, ApiResult};
use crate::judge::client::{EnqueueRequest, JudgeClient};
use crate::judge::JobMode;
use crate::metrics::MetricsCollector;
use crate::session::auth::{extract_token, TokenVerifier};
use crate::session::gateway::SessionGateway;
use crate::store::Store;
use crate::types::{
    ContestId, ContestParticipation, ContestProblemEntry, JobId, Language, Problem, ProblemId,
    Solution, SolvedProblem, TestCase, User,
};
use crate::utils::current_timestamp;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// First-solve rating bump on the legacy contest path
const FIRST_SOLVE_RATING_BONUS: i32 = 10;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn Store>,
    pub judge: Arc<JudgeClient>,
    pub verifier: TokenVerifier,
    pub gateway: Arc<SessionGateway>,
    pub metrics: Arc<MetricsCollector>,
    pub cors_origin: String,
}

/// Authenticated user attached to the request
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn request_token(request: &Request) -> Option<String> {
    let cookie_header = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    extract_token(cookie_header, auth_header)
}

/// Require a valid access token; attach the loaded user.
pub async fn auth_middleware(
    State(ctx): State<ApiContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token =
        request_token(&request).ok_or_else(|| ApiError::unauthorized("Missing access token"))?;

    let claims = ctx.verifier.verify(&token).map_err(ApiError::from)?;

    let user = ctx
        .store
        .get_user(&claims.id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

/// Attach the user when a valid token is present, otherwise continue
/// anonymously.
pub async fn optional_auth_middleware(
    State(ctx): State<ApiContext>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request_token(&request) {
        if let Ok(claims) = ctx.verifier.verify(&token) {
            if let Ok(Some(user)) = ctx.store.get_user(&claims.id).await {
                request.extensions_mut().insert(AuthUser(user));
            }
        }
    }
    next.run(request).await
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSolutionBody {
    pub score: i64,
    #[validate(length(min = 1, message = "solutionCode is required"))]
    pub solution_code: String,
    #[validate(length(min = 1, message = "languageUsed is required"))]
    pub language_used: String,
    pub time_occupied: Option<u64>,
    pub memory_occupied: Option<u64>,
    pub time_given_on_solution: Option<u64>,
}

/// POST /submit-solution/:contest_id/:problem_id
pub async fn submit_contest_solution(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((contest_id, problem_id)): Path<(ContestId, ProblemId)>,
    Json(body): Json<SubmitSolutionBody>,
) -> ApiResult<ApiResponse<Solution>> {
    body.validate()
        .map_err(|e| ApiError::bad_request("Invalid submission").with_errors(
            e.field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .map(|error| error.to_string())
                .collect(),
        ))?;

    let language = Language::parse(&body.language_used)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported language: {}", body.language_used)))?;

    let mut contest = ctx
        .store
        .get_contest(&contest_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Contest not found"))?;

    if !contest.has_participant(&user.id) {
        return Err(ApiError::forbidden("Not a participant in this contest"));
    }

    let problem = ctx
        .store
        .get_problem(&problem_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Problem not found"))?;

    let actual_max_score = problem.actual_max_score();

    let solution = Solution {
        id: String::new(),
        user_id: user.id.clone(),
        contest_id: Some(contest_id.clone()),
        problem_id: problem_id.clone(),
        solution_code: body.solution_code,
        language_used: language,
        score: body.score,
        max_score: actual_max_score,
        test_cases: Vec::new(),
        time_occupied: body.time_occupied,
        memory_occupied: body.memory_occupied,
        time_given_on_solution: body.time_given_on_solution,
        created_at: current_timestamp(),
    };
    let solution = ctx
        .store
        .insert_solution(solution)
        .await
        .map_err(ApiError::from)?;

    contest.submissions.push(solution.id.clone());
    ctx.store
        .put_contest(contest)
        .await
        .map_err(ApiError::from)?;

    // Upsert the user's per-contest scoring: each problem keeps its best
    // score and the contest total is the sum over problems.
    let mut user = ctx
        .store
        .get_user(&user.id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    apply_contest_score(&mut user, &contest_id, &problem_id, body.score, actual_max_score);

    if body.score >= actual_max_score
        && !user
            .solved_problems
            .iter()
            .any(|solved| solved.problem_id == problem_id)
    {
        user.solved_problems.push(SolvedProblem {
            problem_id: problem_id.clone(),
            solved_at: current_timestamp(),
        });
        user.rating += FIRST_SOLVE_RATING_BONUS;
    }

    ctx.store.put_user(user).await.map_err(ApiError::from)?;

    Ok(ApiResponse::ok(solution, "Solution recorded"))
}

/// Keep the best score per problem and recompute the contest total.
fn apply_contest_score(
    user: &mut User,
    contest_id: &ContestId,
    problem_id: &ProblemId,
    score: i64,
    actual_max_score: i64,
) {
    let entry = match user
        .contests_participated
        .iter_mut()
        .find(|entry| &entry.contest_id == contest_id)
    {
        Some(entry) => entry,
        None => {
            user.contests_participated.push(ContestParticipation {
                contest_id: contest_id.clone(),
                score: 0,
                contest_problems: Vec::new(),
            });
            user.contests_participated.last_mut().unwrap()
        }
    };

    match entry
        .contest_problems
        .iter_mut()
        .find(|problem| &problem.problem_id == problem_id)
    {
        Some(problem) => {
            problem.score = problem.score.max(score);
            if problem.score >= actual_max_score {
                problem.submission_status = "correct".to_string();
            }
        }
        None => {
            entry.contest_problems.push(ContestProblemEntry {
                problem_id: problem_id.clone(),
                score,
                submission_status: if score >= actual_max_score {
                    "correct".to_string()
                } else {
                    "attempted".to_string()
                },
            });
        }
    }

    entry.score = entry.contest_problems.iter().map(|problem| problem.score).sum();
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemWithSolution {
    pub problem: Problem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
}

/// GET /get-problem/:contest_id/:problem_id (participant-gated)
pub async fn get_contest_problem(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((contest_id, problem_id)): Path<(ContestId, ProblemId)>,
) -> ApiResult<ApiResponse<ProblemWithSolution>> {
    let contest = ctx
        .store
        .get_contest(&contest_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Contest not found"))?;

    if !contest.has_participant(&user.id) {
        return Err(ApiError::forbidden("Not a participant in this contest"));
    }

    let mut problem = ctx
        .store
        .get_problem(&problem_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Problem not found"))?;
    problem.canonical_solution = None;

    let solution = ctx
        .store
        .latest_solution(&user.id, &problem_id, Some(&contest_id))
        .await
        .map_err(ApiError::from)?;

    Ok(ApiResponse::ok(
        ProblemWithSolution { problem, solution },
        "Problem fetched",
    ))
}

/// GET /get-problem/:problem_id (public; solution attached when
/// authenticated)
pub async fn get_problem(
    State(ctx): State<ApiContext>,
    auth: Option<Extension<AuthUser>>,
    Path(problem_id): Path<ProblemId>,
) -> ApiResult<ApiResponse<ProblemWithSolution>> {
    let problem = ctx
        .store
        .get_problem(&problem_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Problem not found"))?;

    let solution = match &auth {
        Some(Extension(AuthUser(user))) => ctx
            .store
            .latest_solution(&user.id, &problem_id, None)
            .await
            .map_err(ApiError::from)?,
        None => None,
    };

    Ok(ApiResponse::ok(
        ProblemWithSolution { problem, solution },
        "Problem fetched",
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub username: String,
    pub rating: i32,
    pub tier: &'static str,
    pub score: i64,
    pub problems_solved: usize,
}

/// GET /get-leaderboard/:contest_id
pub async fn get_leaderboard(
    State(ctx): State<ApiContext>,
    Path(contest_id): Path<ContestId>,
) -> ApiResult<ApiResponse<Vec<LeaderboardEntry>>> {
    let participants = ctx
        .store
        .contest_participants(&contest_id)
        .await
        .map_err(ApiError::from)?;

    let mut rows: Vec<(User, i64, usize)> = participants
        .into_iter()
        .map(|user| {
            let (score, solved) = user
                .contests_participated
                .iter()
                .find(|entry| entry.contest_id == contest_id)
                .map(|entry| {
                    let solved: std::collections::HashSet<_> = entry
                        .contest_problems
                        .iter()
                        .filter(|problem| problem.submission_status == "correct")
                        .map(|problem| problem.problem_id.clone())
                        .collect();
                    (entry.score, solved.len())
                })
                .unwrap_or((0, 0));
            (user, score, solved)
        })
        .collect();

    // Stable: ties keep participant order.
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    let entries = rows
        .into_iter()
        .enumerate()
        .map(|(idx, (user, score, problems_solved))| LeaderboardEntry {
            rank: (idx + 1) as u32,
            tier: crate::rating::elo::tier_for(user.rating),
            user_id: user.id,
            username: user.username,
            rating: user.rating,
            score,
            problems_solved,
        })
        .collect();

    Ok(ApiResponse::ok(entries, "Leaderboard fetched"))
}

/// GET /get-all-problems
pub async fn get_all_problems(
    State(ctx): State<ApiContext>,
) -> ApiResult<ApiResponse<Vec<Problem>>> {
    let mut problems = ctx.store.list_problems().await.map_err(ApiError::from)?;
    for problem in &mut problems {
        problem.canonical_solution = None;
    }
    Ok(ApiResponse::ok(problems, "Problems fetched"))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CodeJobBody {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "language is required"))]
    pub language: String,
    pub problem_id: Option<ProblemId>,
    pub test_cases: Option<Vec<TestCase>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQueuedResponse {
    pub job_id: JobId,
}

async fn enqueue_job(
    ctx: &ApiContext,
    mode: JobMode,
    body: CodeJobBody,
) -> ApiResult<ApiResponse<JobQueuedResponse>> {
    body.validate()
        .map_err(|_| ApiError::bad_request("code and language are required"))?;

    let job_id = ctx
        .judge
        .enqueue(EnqueueRequest {
            mode,
            code: body.code,
            language: body.language,
            problem_id: body.problem_id,
            test_cases: body.test_cases,
        })
        .await
        .map_err(ApiError::from)?;

    ctx.metrics.record_job_enqueued(mode.as_str());

    Ok(ApiResponse::accepted(
        JobQueuedResponse { job_id },
        "Job queued",
    ))
}

/// POST /code/run — 202
pub async fn code_run(
    State(ctx): State<ApiContext>,
    Json(body): Json<CodeJobBody>,
) -> ApiResult<ApiResponse<JobQueuedResponse>> {
    enqueue_job(&ctx, JobMode::Run, body).await
}

/// POST /code/submit — 202
pub async fn code_submit(
    State(ctx): State<ApiContext>,
    Json(body): Json<CodeJobBody>,
) -> ApiResult<ApiResponse<JobQueuedResponse>> {
    enqueue_job(&ctx, JobMode::Submit, body).await
}

/// GET /code/result/:job_id — 200, or 404 for an unknown job
pub async fn code_result(
    State(ctx): State<ApiContext>,
    Path(job_id): Path<JobId>,
) -> ApiResult<ApiResponse<crate::judge::client::PollResponse>> {
    let response = ctx.judge.poll(&job_id).await.map_err(ApiError::from)?;
    ctx.metrics.record_job_polled();
    Ok(ApiResponse::ok(response, "Job status fetched"))
}

/// GET /ws — authenticate, then hand the socket to the gateway.
pub async fn ws_upgrade(
    State(ctx): State<ApiContext>,
    ws: WebSocketUpgrade,
    headers: axum::http::HeaderMap,
) -> Response {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match ctx.gateway.authenticate(cookie_header, auth_header).await {
        Ok(user) => {
            let gateway = ctx.gateway.clone();
            ws.on_upgrade(move |socket| gateway.handle_socket(socket, user))
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: &'static str,
    pub queue_size: usize,
    pub active_rooms: usize,
}

/// GET /health
pub async fn health(State(ctx): State<ApiContext>) -> ApiResult<ApiResponse<HealthData>> {
    let queue_size = ctx.gateway.matchmaking.queue_size().await;
    let active_rooms = ctx.gateway.rooms.live_room_count();
    Ok(ApiResponse::ok(
        HealthData {
            status: "healthy",
            queue_size,
            active_rooms,
        },
        "Service healthy",
    ))
}

/// GET /metrics — Prometheus text format
pub async fn metrics(State(ctx): State<ApiContext>) -> Response {
    match ctx.metrics.export() {
        Ok(rendered) => rendered.into_response(),
        Err(e) => {
            ApiError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render metrics: {}", e),
            )
            .into_response()
        }
    }
}
