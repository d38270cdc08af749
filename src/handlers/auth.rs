use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::{self, AuthUser},
    errors::{AppError, ErrorResponse},
    models::{LoginRequest, LoginResponse, SessionUser},
    validation::ValidatedJson,
};

/// login
///
/// [Public Route] Exchanges email and password for a 7-day session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = auth::login(&state.repo, &state.config, payload).await?;
    Ok(Json(response))
}

/// me
///
/// [Authenticated Route] Echoes the identity carried by the caller's token.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current session", body = SessionUser),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn me(user: AuthUser) -> Json<SessionUser> {
    Json(SessionUser {
        id: user.id,
        email: user.email,
        role: user.role,
    })
}
