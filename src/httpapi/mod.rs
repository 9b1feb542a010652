//! HTTP + WebSocket surface
//!
//! Contest endpoints, judge enqueue/poll, health and metrics, plus the
//! `/ws` upgrade into the session gateway. Every response uses the
//! platform envelope.

pub mod handlers;
pub mod response;

pub use response::{ApiError, ApiResponse, ApiResult};

use crate::httpapi::handlers::ApiContext;
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Assemble the application router.
pub fn router(ctx: ApiContext) -> Router {
    let cors = match ctx.cors_origin.as_str() {
        "*" => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
            Err(_) => {
                warn!("Invalid CORS_ORIGIN {:?}, falling back to any", origin);
                CorsLayer::new().allow_origin(Any)
            }
        },
    };

    let authed = Router::new()
        .route(
            "/submit-solution/:contest_id/:problem_id",
            post(handlers::submit_contest_solution),
        )
        .route(
            "/get-problem/:contest_id/:problem_id",
            get(handlers::get_contest_problem),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            handlers::auth_middleware,
        ));

    let open = Router::new()
        .route("/get-problem/:problem_id", get(handlers::get_problem))
        .route("/get-leaderboard/:contest_id", get(handlers::get_leaderboard))
        .route("/get-all-problems", get(handlers::get_all_problems))
        .route("/code/run", post(handlers::code_run))
        .route("/code/submit", post(handlers::code_submit))
        .route("/code/result/:job_id", get(handlers::code_result))
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            handlers::optional_auth_middleware,
        ));

    Router::new()
        .merge(authed)
        .merge(open)
        .route("/ws", get(handlers::ws_upgrade))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(cors)
        .with_state(ctx)
}
