use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    errors::{AppError, ErrorResponse, Op},
    models::{CreateTurmaRequest, Turma, UpdateTurmaRequest},
    validation::{IdPath, ValidatedJson},
};

const ENTITY: &str = "turma";

#[utoipa::path(
    get,
    path = "/turmas",
    responses((status = 200, description = "Classes", body = [Turma])),
    security(("bearer" = []))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Turma>>, AppError> {
    Ok(Json(state.repo.list_turmas().await?))
}

#[utoipa::path(
    get,
    path = "/turmas/{id}",
    params(("id" = i32, Path, description = "Turma ID")),
    responses(
        (status = 200, description = "Found", body = Turma),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Turma>, AppError> {
    state
        .repo
        .get_turma(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

#[utoipa::path(
    post,
    path = "/turmas",
    request_body = CreateTurmaRequest,
    responses(
        (status = 201, description = "Created", body = Turma),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTurmaRequest>,
) -> Result<(StatusCode, Json<Turma>), AppError> {
    let turma = state
        .repo
        .create_turma(payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Create))?;

    tracing::info!(id = turma.id, nome = %turma.nome, "turma created");
    Ok((StatusCode::CREATED, Json(turma)))
}

#[utoipa::path(
    put,
    path = "/turmas/{id}",
    params(("id" = i32, Path, description = "Turma ID")),
    request_body = UpdateTurmaRequest,
    responses(
        (status = 200, description = "Updated", body = Turma),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(payload): ValidatedJson<UpdateTurmaRequest>,
) -> Result<Json<Turma>, AppError> {
    let turma = state
        .repo
        .update_turma(id, payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Update))?;
    Ok(Json(turma))
}

#[utoipa::path(
    delete,
    path = "/turmas/{id}",
    params(("id" = i32, Path, description = "Turma ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Class still has students or subjects", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_turma(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(id, "turma deleted");
    Ok(StatusCode::NO_CONTENT)
}
