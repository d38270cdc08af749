use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    errors::{AppError, ErrorResponse, Op},
    models::{Casa, CreateCasaRequest, UpdateCasaRequest},
    validation::{IdPath, ValidatedJson},
};

const ENTITY: &str = "casa";

#[utoipa::path(
    get,
    path = "/casas",
    responses((status = 200, description = "Houses", body = [Casa])),
    security(("bearer" = []))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Casa>>, AppError> {
    Ok(Json(state.repo.list_casas().await?))
}

#[utoipa::path(
    get,
    path = "/casas/{id}",
    params(("id" = i32, Path, description = "Casa ID")),
    responses(
        (status = 200, description = "Found", body = Casa),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Casa>, AppError> {
    state
        .repo
        .get_casa(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

#[utoipa::path(
    post,
    path = "/casas",
    request_body = CreateCasaRequest,
    responses(
        (status = 201, description = "Created", body = Casa),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCasaRequest>,
) -> Result<(StatusCode, Json<Casa>), AppError> {
    let casa = state
        .repo
        .create_casa(payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Create))?;

    tracing::info!(id = casa.id, nome = %casa.nome, "casa created");
    Ok((StatusCode::CREATED, Json(casa)))
}

#[utoipa::path(
    put,
    path = "/casas/{id}",
    params(("id" = i32, Path, description = "Casa ID")),
    request_body = UpdateCasaRequest,
    responses(
        (status = 200, description = "Updated", body = Casa),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(payload): ValidatedJson<UpdateCasaRequest>,
) -> Result<Json<Casa>, AppError> {
    let casa = state
        .repo
        .update_casa(id, payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Update))?;
    Ok(Json(casa))
}

/// delete
///
/// [Secretary Route] A house that still has students cannot be removed (409).
#[utoipa::path(
    delete,
    path = "/casas/{id}",
    params(("id" = i32, Path, description = "Casa ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "House still has students", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_casa(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(id, "casa deleted");
    Ok(StatusCode::NO_CONTENT)
}
