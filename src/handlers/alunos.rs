use axum::{Json, extract::State, http::StatusCode};

use super::ensure_email_available;
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    errors::{AppError, ErrorResponse, Op},
    models::{
        Aluno, AlunoChanges, AlunoFilter, CreateAlunoRequest, NewAluno, Role, UpdateAlunoRequest,
    },
    validation::{IdPath, ValidatedJson, ValidatedQuery},
};

const ENTITY: &str = "aluno";

/// list
///
/// [Staff Route] Lists students, optionally filtered by house and/or class.
#[utoipa::path(
    get,
    path = "/alunos",
    params(AlunoFilter),
    responses(
        (status = 200, description = "Students", body = [Aluno]),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    ValidatedQuery(filter): ValidatedQuery<AlunoFilter>,
) -> Result<Json<Vec<Aluno>>, AppError> {
    Ok(Json(state.repo.list_alunos(&filter).await?))
}

/// get
///
/// [Authenticated Route] A single student. Students may only fetch themselves.
#[utoipa::path(
    get,
    path = "/alunos/{id}",
    params(("id" = i32, Path, description = "Aluno ID")),
    responses(
        (status = 200, description = "Found", body = Aluno),
        (status = 403, description = "Another student's record", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    user: AuthUser,
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Aluno>, AppError> {
    user.ensure_can_read_aluno(id)?;
    state
        .repo
        .get_aluno(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

/// create
///
/// [Secretary Route] Registers a student. The password is stored as a bcrypt hash and
/// the email must be free across every identity table.
#[utoipa::path(
    post,
    path = "/alunos",
    request_body = CreateAlunoRequest,
    responses(
        (status = 201, description = "Created", body = Aluno),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Duplicate email or missing reference", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateAlunoRequest>,
) -> Result<(StatusCode, Json<Aluno>), AppError> {
    ensure_email_available(&state, &payload.email, None).await?;
    let senha_hash = hash_password(payload.senha, state.config.bcrypt_cost).await?;

    let aluno = state
        .repo
        .create_aluno(NewAluno {
            nome: payload.nome,
            email: payload.email,
            senha_hash,
            casa_id: payload.casa_id,
            turma_id: payload.turma_id,
        })
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Create))?;

    tracing::info!(id = aluno.id, "aluno created");
    Ok((StatusCode::CREATED, Json(aluno)))
}

/// update
///
/// [Secretary Route] Partial update; a new password is re-hashed.
#[utoipa::path(
    put,
    path = "/alunos/{id}",
    params(("id" = i32, Path, description = "Aluno ID")),
    request_body = UpdateAlunoRequest,
    responses(
        (status = 200, description = "Updated", body = Aluno),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Duplicate email or missing reference", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidatedJson(payload): ValidatedJson<UpdateAlunoRequest>,
) -> Result<Json<Aluno>, AppError> {
    if state.repo.get_aluno(id).await?.is_none() {
        return Err(AppError::not_found(ENTITY, id));
    }
    if let Some(email) = &payload.email {
        ensure_email_available(&state, email, Some((Role::Aluno, id))).await?;
    }
    let senha_hash = match payload.senha {
        Some(senha) => Some(hash_password(senha, state.config.bcrypt_cost).await?),
        None => None,
    };

    let aluno = state
        .repo
        .update_aluno(
            id,
            AlunoChanges {
                nome: payload.nome,
                email: payload.email,
                senha_hash,
                casa_id: payload.casa_id,
                turma_id: payload.turma_id,
            },
        )
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Update))?;

    Ok(Json(aluno))
}

/// delete
///
/// [Secretary Route] Removes a student together with their enrollments.
#[utoipa::path(
    delete,
    path = "/alunos/{id}",
    params(("id" = i32, Path, description = "Aluno ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_aluno(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(id, "aluno deleted");
    Ok(StatusCode::NO_CONTENT)
}
