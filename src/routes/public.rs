use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers and container health checks.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Exchanges email + password for a session token.
        .route("/auth/login", post(handlers::auth::login))
}
