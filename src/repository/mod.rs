use async_trait::async_trait;
use sqlx::error::ErrorKind;
use std::sync::Arc;

use crate::models::{
    Aluno, AlunoChanges, AlunoFilter, Casa, CreateCasaRequest, CreateDisciplinaRequest,
    CreateTurmaRequest, Credentials, Disciplina, Matricula, NewAluno, NewProfessor, Professor,
    ProfessorChanges, Role, Turma, UpdateCasaRequest, UpdateDisciplinaRequest, UpdateTurmaRequest,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Storage failures, already classified by the constraint that caused them. Handlers
/// never see driver errors; they turn these into HTTP outcomes via `AppError::from_repo`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: String },

    #[error("foreign key constraint {constraint} violated")]
    ForeignKeyViolation { constraint: String },

    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation => RepoError::UniqueViolation {
                    field: unique_field(db.table(), db.constraint()),
                },
                ErrorKind::ForeignKeyViolation => RepoError::ForeignKeyViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                _ => RepoError::Other(db.message().to_string()),
            },
            _ => RepoError::Other(err.to_string()),
        }
    }
}

/// Recovers the column list from a Postgres default constraint name
/// (`<table>_<columns>_key`), e.g. `casas_nome_key` → `nome`.
pub(crate) fn unique_field(table: Option<&str>, constraint: Option<&str>) -> String {
    let Some(constraint) = constraint else {
        return "unknown".to_string();
    };
    let columns = constraint.strip_suffix("_key").unwrap_or(constraint);
    table
        .and_then(|t| columns.strip_prefix(t))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(columns)
        .to_string()
}

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers hold an
/// `Arc<dyn Repository>` and never know whether Postgres or the in-memory store is behind it.
///
/// Mutations return `RepoError::NotFound` when the target row does not exist; reads
/// return `Ok(None)` instead.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    // Looks the email up in the single table belonging to `role`.
    async fn find_credentials(&self, role: Role, email: &str)
    -> Result<Option<Credentials>, RepoError>;
    // True if any identity table other than the `except` row uses this email.
    async fn email_in_use(&self, email: &str, except: Option<(Role, i32)>)
    -> Result<bool, RepoError>;

    // --- Alunos ---
    async fn list_alunos(&self, filter: &AlunoFilter) -> Result<Vec<Aluno>, RepoError>;
    async fn get_aluno(&self, id: i32) -> Result<Option<Aluno>, RepoError>;
    async fn create_aluno(&self, aluno: NewAluno) -> Result<Aluno, RepoError>;
    async fn update_aluno(&self, id: i32, changes: AlunoChanges) -> Result<Aluno, RepoError>;
    async fn delete_aluno(&self, id: i32) -> Result<(), RepoError>;

    // --- Professores ---
    async fn list_professores(&self) -> Result<Vec<Professor>, RepoError>;
    async fn get_professor(&self, id: i32) -> Result<Option<Professor>, RepoError>;
    async fn create_professor(&self, professor: NewProfessor) -> Result<Professor, RepoError>;
    async fn update_professor(
        &self,
        id: i32,
        changes: ProfessorChanges,
    ) -> Result<Professor, RepoError>;
    async fn delete_professor(&self, id: i32) -> Result<(), RepoError>;
    // Distinct students enrolled in any subject the professor teaches.
    async fn alunos_of_professor(&self, professor_id: i32) -> Result<Vec<Aluno>, RepoError>;

    // --- Casas ---
    async fn list_casas(&self) -> Result<Vec<Casa>, RepoError>;
    async fn get_casa(&self, id: i32) -> Result<Option<Casa>, RepoError>;
    async fn create_casa(&self, req: CreateCasaRequest) -> Result<Casa, RepoError>;
    async fn update_casa(&self, id: i32, req: UpdateCasaRequest) -> Result<Casa, RepoError>;
    async fn delete_casa(&self, id: i32) -> Result<(), RepoError>;

    // --- Turmas ---
    async fn list_turmas(&self) -> Result<Vec<Turma>, RepoError>;
    async fn get_turma(&self, id: i32) -> Result<Option<Turma>, RepoError>;
    async fn create_turma(&self, req: CreateTurmaRequest) -> Result<Turma, RepoError>;
    async fn update_turma(&self, id: i32, req: UpdateTurmaRequest) -> Result<Turma, RepoError>;
    async fn delete_turma(&self, id: i32) -> Result<(), RepoError>;

    // --- Disciplinas ---
    async fn list_disciplinas(&self) -> Result<Vec<Disciplina>, RepoError>;
    async fn get_disciplina(&self, id: i32) -> Result<Option<Disciplina>, RepoError>;
    async fn create_disciplina(&self, req: CreateDisciplinaRequest)
    -> Result<Disciplina, RepoError>;
    async fn update_disciplina(
        &self,
        id: i32,
        req: UpdateDisciplinaRequest,
    ) -> Result<Disciplina, RepoError>;
    async fn delete_disciplina(&self, id: i32) -> Result<(), RepoError>;
    // Subjects the student is enrolled in.
    async fn disciplinas_of_aluno(&self, aluno_id: i32) -> Result<Vec<Disciplina>, RepoError>;

    // --- Matriculas ---
    async fn list_matriculas(&self) -> Result<Vec<Matricula>, RepoError>;
    async fn get_matricula(&self, id: i32) -> Result<Option<Matricula>, RepoError>;
    async fn find_matricula(
        &self,
        aluno_id: i32,
        disciplina_id: i32,
    ) -> Result<Option<Matricula>, RepoError>;
    // Fails with `UniqueViolation` when the pair is already enrolled.
    async fn create_matricula(&self, aluno_id: i32, disciplina_id: i32)
    -> Result<Matricula, RepoError>;
    async fn delete_matricula(&self, id: i32) -> Result<(), RepoError>;
    async fn delete_enrollment(&self, aluno_id: i32, disciplina_id: i32) -> Result<(), RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

#[cfg(test)]
mod tests {
    use super::unique_field;

    #[test]
    fn strips_table_prefix_and_key_suffix() {
        assert_eq!(unique_field(Some("casas"), Some("casas_nome_key")), "nome");
        assert_eq!(unique_field(Some("alunos"), Some("alunos_email_key")), "email");
        assert_eq!(
            unique_field(Some("matriculas"), Some("matriculas_aluno_id_disciplina_id_key")),
            "aluno_id_disciplina_id"
        );
    }

    #[test]
    fn falls_back_to_raw_constraint_name() {
        assert_eq!(unique_field(None, Some("custom_unique_idx")), "custom_unique_idx");
        assert_eq!(unique_field(Some("casas"), None), "unknown");
    }
}
