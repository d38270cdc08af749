use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    errors::{AppError, ErrorResponse, Op},
    models::{CreateDisciplinaRequest, Disciplina, UpdateDisciplinaRequest},
    validation::{IdPath, ValidatedJson},
};

const ENTITY: &str = "disciplina";

#[utoipa::path(
    get,
    path = "/disciplinas",
    responses((status = 200, description = "Subjects", body = [Disciplina])),
    security(("bearer" = []))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Disciplina>>, AppError> {
    Ok(Json(state.repo.list_disciplinas().await?))
}

#[utoipa::path(
    get,
    path = "/disciplinas/{id}",
    params(("id" = i32, Path, description = "Disciplina ID")),
    responses(
        (status = 200, description = "Found", body = Disciplina),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Disciplina>, AppError> {
    state
        .repo
        .get_disciplina(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

/// create
///
/// [Secretary Route] `professor_id` and `turma_id` must point at existing rows (409 otherwise).
#[utoipa::path(
    post,
    path = "/disciplinas",
    request_body = CreateDisciplinaRequest,
    responses(
        (status = 201, description = "Created", body = Disciplina),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Name taken or missing reference", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateDisciplinaRequest>,
) -> Result<(StatusCode, Json<Disciplina>), AppError> {
    let disciplina = state
        .repo
        .create_disciplina(payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Create))?;

    tracing::info!(id = disciplina.id, nome = %disciplina.nome, "disciplina created");
    Ok((StatusCode::CREATED, Json(disciplina)))
}

#[utoipa::path(
    put,
    path = "/disciplinas/{id}",
    params(("id" = i32, Path, description = "Disciplina ID")),
    request_body = UpdateDisciplinaRequest,
    responses(
        (status = 200, description = "Updated", body = Disciplina),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Name taken or missing reference", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(payload): ValidatedJson<UpdateDisciplinaRequest>,
) -> Result<Json<Disciplina>, AppError> {
    let disciplina = state
        .repo
        .update_disciplina(id, payload)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Update))?;
    Ok(Json(disciplina))
}

#[utoipa::path(
    delete,
    path = "/disciplinas/{id}",
    params(("id" = i32, Path, description = "Disciplina ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Subject still has enrollments", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_disciplina(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(id, "disciplina deleted");
    Ok(StatusCode::NO_CONTENT)
}
