use axum::{Json, extract::State, http::StatusCode};

use super::ensure_email_available;
use crate::{
    AppState,
    auth::hash_password,
    errors::{AppError, ErrorResponse, Op},
    models::{
        Aluno, CreateProfessorRequest, NewProfessor, Professor, ProfessorChanges, Role,
        UpdateProfessorRequest,
    },
    validation::{IdPath, ValidatedJson},
};

const ENTITY: &str = "professor";

#[utoipa::path(
    get,
    path = "/professores",
    responses((status = 200, description = "Teachers", body = [Professor])),
    security(("bearer" = []))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Professor>>, AppError> {
    Ok(Json(state.repo.list_professores().await?))
}

#[utoipa::path(
    get,
    path = "/professores/{id}",
    params(("id" = i32, Path, description = "Professor ID")),
    responses(
        (status = 200, description = "Found", body = Professor),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Professor>, AppError> {
    state
        .repo
        .get_professor(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

/// alunos
///
/// [Staff Route] Every student enrolled in at least one subject this teacher teaches.
#[utoipa::path(
    get,
    path = "/professores/{id}/alunos",
    params(("id" = i32, Path, description = "Professor ID")),
    responses(
        (status = 200, description = "Students taught", body = [Aluno]),
        (status = 404, description = "Professor Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn alunos(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Vec<Aluno>>, AppError> {
    if state.repo.get_professor(id).await?.is_none() {
        return Err(AppError::not_found(ENTITY, id));
    }
    Ok(Json(state.repo.alunos_of_professor(id).await?))
}

#[utoipa::path(
    post,
    path = "/professores",
    request_body = CreateProfessorRequest,
    responses(
        (status = 201, description = "Created", body = Professor),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Duplicate email", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateProfessorRequest>,
) -> Result<(StatusCode, Json<Professor>), AppError> {
    ensure_email_available(&state, &payload.email, None).await?;
    let senha_hash = hash_password(payload.senha, state.config.bcrypt_cost).await?;

    let professor = state
        .repo
        .create_professor(NewProfessor {
            nome: payload.nome,
            email: payload.email,
            senha_hash,
        })
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Create))?;

    tracing::info!(id = professor.id, "professor created");
    Ok((StatusCode::CREATED, Json(professor)))
}

#[utoipa::path(
    put,
    path = "/professores/{id}",
    params(("id" = i32, Path, description = "Professor ID")),
    request_body = UpdateProfessorRequest,
    responses(
        (status = 200, description = "Updated", body = Professor),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Duplicate email", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(payload): ValidatedJson<UpdateProfessorRequest>,
) -> Result<Json<Professor>, AppError> {
    if state.repo.get_professor(id).await?.is_none() {
        return Err(AppError::not_found(ENTITY, id));
    }
    if let Some(email) = &payload.email {
        ensure_email_available(&state, email, Some((Role::Professor, id))).await?;
    }
    let senha_hash = match payload.senha {
        Some(senha) => Some(hash_password(senha, state.config.bcrypt_cost).await?),
        None => None,
    };

    let professor = state
        .repo
        .update_professor(
            id,
            ProfessorChanges {
                nome: payload.nome,
                email: payload.email,
                senha_hash,
            },
        )
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Update))?;

    Ok(Json(professor))
}

/// delete
///
/// [Secretary Route] Fails with 409 while any subject is still assigned to the teacher.
#[utoipa::path(
    delete,
    path = "/professores/{id}",
    params(("id" = i32, Path, description = "Professor ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Still teaching subjects", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_professor(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(id, "professor deleted");
    Ok(StatusCode::NO_CONTENT)
}
