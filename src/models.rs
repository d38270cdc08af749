use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// --- Identity ---

/// Role
///
/// The fixed tag of each identity table. It is embedded in every session token and
/// is the only thing role gates look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Secretario,
    Professor,
    Aluno,
}

impl Role {
    /// Order in which identity tables are searched at login. On an email present in
    /// more than one table, the earlier table wins.
    pub const LOOKUP_ORDER: [Role; 3] = [Role::Secretario, Role::Professor, Role::Aluno];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Secretario => "SECRETARIO",
            Role::Professor => "PROFESSOR",
            Role::Aluno => "ALUNO",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials
///
/// Internal view of an identity row including its password hash. Only the login flow
/// ever sees this type; it is never serialized.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: i32,
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
    pub role: Role,
}

/// UserProfile
///
/// Public fields of an identity, returned by login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: i32,
    pub nome: String,
    pub email: String,
    pub role: Role,
}

impl From<Credentials> for UserProfile {
    fn from(c: Credentials) -> Self {
        Self {
            id: c.id,
            nome: c.nome,
            email: c.email,
            role: c.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub senha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

// --- Alunos ---

/// Aluno
///
/// A student. `casa_id` and `turma_id` are optional affiliations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Aluno {
    pub id: i32,
    pub nome: String,
    pub email: String,
    pub casa_id: Option<i32>,
    pub turma_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateAlunoRequest {
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must have at least 6 characters"))]
    pub senha: String,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub casa_id: Option<i32>,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub turma_id: Option<i32>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAlunoRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, message = "must have at least 6 characters"))]
    pub senha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub casa_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub turma_id: Option<i32>,
}

/// Storage-ready student: the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAluno {
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
    pub casa_id: Option<i32>,
    pub turma_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct AlunoChanges {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub senha_hash: Option<String>,
    pub casa_id: Option<i32>,
    pub turma_id: Option<i32>,
}

/// Optional filters for `GET /alunos`.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct AlunoFilter {
    /// Only students of this house.
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub casa_id: Option<i32>,
    /// Only students of this class.
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub turma_id: Option<i32>,
}

// --- Professores ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Professor {
    pub id: i32,
    pub nome: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateProfessorRequest {
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must have at least 6 characters"))]
    pub senha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateProfessorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, message = "must have at least 6 characters"))]
    pub senha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProfessor {
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfessorChanges {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub senha_hash: Option<String>,
}

// --- Casas ---

/// Casa
///
/// A house students are sorted into. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Casa {
    pub id: i32,
    pub nome: String,
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCasaRequest {
    #[validate(length(min = 1, max = 80, message = "must have between 1 and 80 characters"))]
    pub nome: String,
    #[validate(length(max = 500, message = "must have at most 500 characters"))]
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateCasaRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 80, message = "must have between 1 and 80 characters"))]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "must have at most 500 characters"))]
    pub descricao: Option<String>,
}

// --- Turmas ---

/// Shift a class meets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Turno {
    Manha,
    Tarde,
    Noite,
}

impl Turno {
    pub fn as_str(self) -> &'static str {
        match self {
            Turno::Manha => "MANHA",
            Turno::Tarde => "TARDE",
            Turno::Noite => "NOITE",
        }
    }
}

/// A `turno` column value outside `MANHA | TARDE | NOITE`.
#[derive(Debug, thiserror::Error)]
#[error("unknown turno tag: {0}")]
pub struct UnknownTurno(pub String);

impl TryFrom<String> for Turno {
    type Error = UnknownTurno;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        match tag.as_str() {
            "MANHA" => Ok(Turno::Manha),
            "TARDE" => Ok(Turno::Tarde),
            "NOITE" => Ok(Turno::Noite),
            _ => Err(UnknownTurno(tag)),
        }
    }
}

/// Turma
///
/// A class cohort (grade + shift). `turno` is stored as its upper-case tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Turma {
    pub id: i32,
    pub nome: String,
    pub ano: i32,
    #[sqlx(try_from = "String")]
    pub turno: Turno,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateTurmaRequest {
    #[validate(length(min = 1, max = 80, message = "must have between 1 and 80 characters"))]
    pub nome: String,
    #[validate(range(min = 1, max = 12, message = "must be between 1 and 12"))]
    pub ano: i32,
    pub turno: Turno,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateTurmaRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 80, message = "must have between 1 and 80 characters"))]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 12, message = "must be between 1 and 12"))]
    pub ano: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turno: Option<Turno>,
}

// --- Disciplinas ---

/// Disciplina
///
/// A subject, optionally taught by a professor to a turma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Disciplina {
    pub id: i32,
    pub nome: String,
    pub carga_horaria: i32,
    pub professor_id: Option<i32>,
    pub turma_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateDisciplinaRequest {
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: String,
    #[validate(range(min = 1, message = "must be at least 1 hour"))]
    pub carga_horaria: i32,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub professor_id: Option<i32>,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub turma_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateDisciplinaRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120, message = "must have between 1 and 120 characters"))]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be at least 1 hour"))]
    pub carga_horaria: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub professor_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub turma_id: Option<i32>,
}

// --- Matriculas ---

/// Matricula
///
/// Enrollment of one student in one subject. The (aluno_id, disciplina_id) pair is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Matricula {
    pub id: i32,
    pub aluno_id: i32,
    pub disciplina_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /matriculas` and `DELETE /matriculas`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct MatriculaRequest {
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub aluno_id: i32,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub disciplina_id: i32,
}

/// SessionUser
///
/// The identity carried by the caller's token (`GET /auth/me`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
}
