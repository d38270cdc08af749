use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AuthUser,
    errors::{AppError, ErrorResponse, Op},
    models::{Disciplina, Matricula, MatriculaRequest},
    repository::RepoError,
    validation::{IdPath, ValidatedJson},
};

const ENTITY: &str = "matricula";

#[utoipa::path(
    get,
    path = "/matriculas",
    responses((status = 200, description = "Enrollments", body = [Matricula])),
    security(("bearer" = []))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Matricula>>, AppError> {
    Ok(Json(state.repo.list_matriculas().await?))
}

#[utoipa::path(
    get,
    path = "/matriculas/{id}",
    params(("id" = i32, Path, description = "Matricula ID")),
    responses(
        (status = 200, description = "Found", body = Matricula),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<Matricula>, AppError> {
    state
        .repo
        .get_matricula(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(ENTITY, id))
}

/// disciplinas_of_aluno
///
/// [Authenticated Route] Subjects a student is enrolled in. Students may only list their own.
#[utoipa::path(
    get,
    path = "/matriculas/aluno/{id}/disciplinas",
    params(("id" = i32, Path, description = "Aluno ID")),
    responses(
        (status = 200, description = "Enrolled subjects", body = [Disciplina]),
        (status = 403, description = "Another student's enrollments", body = ErrorResponse),
        (status = 404, description = "Aluno Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn disciplinas_of_aluno(
    user: AuthUser,
    State(state): State<AppState>,
    IdPath(aluno_id): IdPath,
) -> Result<Json<Vec<Disciplina>>, AppError> {
    user.ensure_can_read_aluno(aluno_id)?;
    if state.repo.get_aluno(aluno_id).await?.is_none() {
        return Err(AppError::not_found("aluno", aluno_id));
    }
    Ok(Json(state.repo.disciplinas_of_aluno(aluno_id).await?))
}

/// enroll
///
/// [Secretary Route] Enrolls a student in a subject. Both must exist (404), and the
/// pair must not be enrolled yet (`ALREADY_ENROLLED`, 409). A concurrent duplicate that
/// slips past the pre-check is caught by the unique constraint and reported the same way.
#[utoipa::path(
    post,
    path = "/matriculas",
    request_body = MatriculaRequest,
    responses(
        (status = 201, description = "Enrolled", body = Matricula),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 404, description = "Aluno or Disciplina Not Found", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn enroll(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<MatriculaRequest>,
) -> Result<(StatusCode, Json<Matricula>), AppError> {
    if state.repo.get_aluno(req.aluno_id).await?.is_none() {
        return Err(AppError::not_found("aluno", req.aluno_id));
    }
    if state.repo.get_disciplina(req.disciplina_id).await?.is_none() {
        return Err(AppError::not_found("disciplina", req.disciplina_id));
    }
    if state
        .repo
        .find_matricula(req.aluno_id, req.disciplina_id)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyEnrolled);
    }

    let matricula = state
        .repo
        .create_matricula(req.aluno_id, req.disciplina_id)
        .await
        .map_err(|e| match e {
            RepoError::UniqueViolation { .. } => AppError::AlreadyEnrolled,
            other => AppError::from_repo(other, ENTITY, Op::Create),
        })?;

    tracing::info!(
        aluno_id = req.aluno_id,
        disciplina_id = req.disciplina_id,
        "aluno enrolled"
    );
    Ok((StatusCode::CREATED, Json(matricula)))
}

/// unenroll
///
/// [Secretary Route] Removes the enrollment of a (student, subject) pair; 404 if the
/// pair was never enrolled.
#[utoipa::path(
    delete,
    path = "/matriculas",
    request_body = MatriculaRequest,
    responses(
        (status = 204, description = "Unenrolled"),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 404, description = "Not enrolled", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn unenroll(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<MatriculaRequest>,
) -> Result<StatusCode, AppError> {
    state
        .repo
        .delete_enrollment(req.aluno_id, req.disciplina_id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;

    tracing::info!(
        aluno_id = req.aluno_id,
        disciplina_id = req.disciplina_id,
        "aluno unenrolled"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/matriculas/{id}",
    params(("id" = i32, Path, description = "Matricula ID")),
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
        .delete_matricula(id)
        .await
        .map_err(|e| AppError::from_repo(e, ENTITY, Op::Delete))?;
    Ok(StatusCode::NO_CONTENT)
}
