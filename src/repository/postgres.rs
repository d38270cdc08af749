use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};

use super::{RepoError, Repository};
use crate::models::{
    Aluno, AlunoChanges, AlunoFilter, Casa, CreateCasaRequest, CreateDisciplinaRequest,
    CreateTurmaRequest, Credentials, Disciplina, Matricula, NewAluno, NewProfessor, Professor,
    ProfessorChanges, Role, Turma, UpdateCasaRequest, UpdateDisciplinaRequest, UpdateTurmaRequest,
};

const ALUNO_COLUMNS: &str = "id, nome, email, casa_id, turma_id";
const DISCIPLINA_COLUMNS: &str = "id, nome, carga_horaria, professor_id, turma_id";

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Uniqueness, existence and referential rules
/// are enforced by the schema in `migrations/`; this type only translates driver
/// failures into `RepoError`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a `DELETE`'s affected row count to the not-found convention.
fn expect_deleted(rows: u64) -> Result<(), RepoError> {
    if rows == 0 {
        Err(RepoError::NotFound)
    } else {
        Ok(())
    }
}

fn credentials_query(role: Role) -> &'static str {
    match role {
        Role::Secretario => "SELECT id, nome, email, senha FROM secretarios WHERE email = $1",
        Role::Professor => "SELECT id, nome, email, senha FROM professores WHERE email = $1",
        Role::Aluno => "SELECT id, nome, email, senha FROM alunos WHERE email = $1",
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_credentials(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Credentials>, RepoError> {
        let row = sqlx::query_as::<_, (i32, String, String, String)>(credentials_query(role))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, nome, email, senha_hash)| Credentials {
            id,
            nome,
            email,
            senha_hash,
            role,
        }))
    }

    /// email_in_use
    ///
    /// Searches all three identity tables at once. The optional `except` row lets an
    /// identity keep its own email on update.
    async fn email_in_use(
        &self,
        email: &str,
        except: Option<(Role, i32)>,
    ) -> Result<bool, RepoError> {
        let (except_role, except_id) = match except {
            Some((role, id)) => (Some(role.as_str()), Some(id)),
            None => (None, None),
        };

        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM secretarios
                 WHERE email = $1 AND NOT COALESCE($2 = 'SECRETARIO' AND id = $3, false)
                UNION ALL
                SELECT 1 FROM professores
                 WHERE email = $1 AND NOT COALESCE($2 = 'PROFESSOR' AND id = $3, false)
                UNION ALL
                SELECT 1 FROM alunos
                 WHERE email = $1 AND NOT COALESCE($2 = 'ALUNO' AND id = $3, false)
            )
            "#,
        )
        .bind(email)
        .bind(except_role)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(in_use)
    }

    // --- ALUNOS ---

    /// list_alunos
    ///
    /// Optional filters are appended with `QueryBuilder` so every value stays a bound parameter.
    async fn list_alunos(&self, filter: &AlunoFilter) -> Result<Vec<Aluno>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ALUNO_COLUMNS} FROM alunos WHERE 1 = 1"));

        if let Some(casa_id) = filter.casa_id {
            builder.push(" AND casa_id = ");
            builder.push_bind(casa_id);
        }
        if let Some(turma_id) = filter.turma_id {
            builder.push(" AND turma_id = ");
            builder.push_bind(turma_id);
        }
        builder.push(" ORDER BY nome, id");

        Ok(builder
            .build_query_as::<Aluno>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_aluno(&self, id: i32) -> Result<Option<Aluno>, RepoError> {
        Ok(sqlx::query_as::<_, Aluno>(&format!(
            "SELECT {ALUNO_COLUMNS} FROM alunos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_aluno(&self, aluno: NewAluno) -> Result<Aluno, RepoError> {
        Ok(sqlx::query_as::<_, Aluno>(&format!(
            "INSERT INTO alunos (nome, email, senha, casa_id, turma_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ALUNO_COLUMNS}"
        ))
        .bind(aluno.nome)
        .bind(aluno.email)
        .bind(aluno.senha_hash)
        .bind(aluno.casa_id)
        .bind(aluno.turma_id)
        .fetch_one(&self.pool)
        .await?)
    }

    /// update_aluno
    ///
    /// `COALESCE` keeps the stored value for every field the caller left out.
    async fn update_aluno(&self, id: i32, changes: AlunoChanges) -> Result<Aluno, RepoError> {
        Ok(sqlx::query_as::<_, Aluno>(&format!(
            r#"
            UPDATE alunos
               SET nome = COALESCE($2, nome),
                   email = COALESCE($3, email),
                   senha = COALESCE($4, senha),
                   casa_id = COALESCE($5, casa_id),
                   turma_id = COALESCE($6, turma_id)
             WHERE id = $1
            RETURNING {ALUNO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.nome)
        .bind(changes.email)
        .bind(changes.senha_hash)
        .bind(changes.casa_id)
        .bind(changes.turma_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_aluno(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM alunos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    // --- PROFESSORES ---

    async fn list_professores(&self) -> Result<Vec<Professor>, RepoError> {
        Ok(
            sqlx::query_as::<_, Professor>("SELECT id, nome, email FROM professores ORDER BY nome, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_professor(&self, id: i32) -> Result<Option<Professor>, RepoError> {
        Ok(
            sqlx::query_as::<_, Professor>("SELECT id, nome, email FROM professores WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_professor(&self, professor: NewProfessor) -> Result<Professor, RepoError> {
        Ok(sqlx::query_as::<_, Professor>(
            "INSERT INTO professores (nome, email, senha) VALUES ($1, $2, $3) RETURNING id, nome, email",
        )
        .bind(professor.nome)
        .bind(professor.email)
        .bind(professor.senha_hash)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_professor(
        &self,
        id: i32,
        changes: ProfessorChanges,
    ) -> Result<Professor, RepoError> {
        Ok(sqlx::query_as::<_, Professor>(
            r#"
            UPDATE professores
               SET nome = COALESCE($2, nome),
                   email = COALESCE($3, email),
                   senha = COALESCE($4, senha)
             WHERE id = $1
            RETURNING id, nome, email
            "#,
        )
        .bind(id)
        .bind(changes.nome)
        .bind(changes.email)
        .bind(changes.senha_hash)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_professor(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM professores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    async fn alunos_of_professor(&self, professor_id: i32) -> Result<Vec<Aluno>, RepoError> {
        Ok(sqlx::query_as::<_, Aluno>(
            r#"
            SELECT DISTINCT a.id, a.nome, a.email, a.casa_id, a.turma_id
              FROM alunos a
              JOIN matriculas m ON m.aluno_id = a.id
              JOIN disciplinas d ON d.id = m.disciplina_id
             WHERE d.professor_id = $1
             ORDER BY a.nome, a.id
            "#,
        )
        .bind(professor_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- CASAS ---

    async fn list_casas(&self) -> Result<Vec<Casa>, RepoError> {
        Ok(
            sqlx::query_as::<_, Casa>("SELECT id, nome, descricao FROM casas ORDER BY nome, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_casa(&self, id: i32) -> Result<Option<Casa>, RepoError> {
        Ok(
            sqlx::query_as::<_, Casa>("SELECT id, nome, descricao FROM casas WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_casa(&self, req: CreateCasaRequest) -> Result<Casa, RepoError> {
        Ok(sqlx::query_as::<_, Casa>(
            "INSERT INTO casas (nome, descricao) VALUES ($1, $2) RETURNING id, nome, descricao",
        )
        .bind(req.nome)
        .bind(req.descricao)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_casa(&self, id: i32, req: UpdateCasaRequest) -> Result<Casa, RepoError> {
        Ok(sqlx::query_as::<_, Casa>(
            r#"
            UPDATE casas
               SET nome = COALESCE($2, nome),
                   descricao = COALESCE($3, descricao)
             WHERE id = $1
            RETURNING id, nome, descricao
            "#,
        )
        .bind(id)
        .bind(req.nome)
        .bind(req.descricao)
        .fetch_one(&self.pool)
        .await?)
    }

    /// delete_casa
    ///
    /// `alunos.casa_id` is `ON DELETE RESTRICT`, so a house with students surfaces as a
    /// foreign-key violation.
    async fn delete_casa(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM casas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    // --- TURMAS ---

    async fn list_turmas(&self) -> Result<Vec<Turma>, RepoError> {
        Ok(
            sqlx::query_as::<_, Turma>("SELECT id, nome, ano, turno FROM turmas ORDER BY ano, nome, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_turma(&self, id: i32) -> Result<Option<Turma>, RepoError> {
        Ok(
            sqlx::query_as::<_, Turma>("SELECT id, nome, ano, turno FROM turmas WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_turma(&self, req: CreateTurmaRequest) -> Result<Turma, RepoError> {
        Ok(sqlx::query_as::<_, Turma>(
            "INSERT INTO turmas (nome, ano, turno) VALUES ($1, $2, $3) RETURNING id, nome, ano, turno",
        )
        .bind(req.nome)
        .bind(req.ano)
        .bind(req.turno.as_str())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_turma(&self, id: i32, req: UpdateTurmaRequest) -> Result<Turma, RepoError> {
        Ok(sqlx::query_as::<_, Turma>(
            r#"
            UPDATE turmas
               SET nome = COALESCE($2, nome),
                   ano = COALESCE($3, ano),
                   turno = COALESCE($4, turno)
             WHERE id = $1
            RETURNING id, nome, ano, turno
            "#,
        )
        .bind(id)
        .bind(req.nome)
        .bind(req.ano)
        .bind(req.turno.map(|t| t.as_str()))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_turma(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM turmas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    // --- DISCIPLINAS ---

    async fn list_disciplinas(&self) -> Result<Vec<Disciplina>, RepoError> {
        Ok(sqlx::query_as::<_, Disciplina>(&format!(
            "SELECT {DISCIPLINA_COLUMNS} FROM disciplinas ORDER BY nome, id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_disciplina(&self, id: i32) -> Result<Option<Disciplina>, RepoError> {
        Ok(sqlx::query_as::<_, Disciplina>(&format!(
            "SELECT {DISCIPLINA_COLUMNS} FROM disciplinas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_disciplina(
        &self,
        req: CreateDisciplinaRequest,
    ) -> Result<Disciplina, RepoError> {
        Ok(sqlx::query_as::<_, Disciplina>(&format!(
            "INSERT INTO disciplinas (nome, carga_horaria, professor_id, turma_id) \
             VALUES ($1, $2, $3, $4) RETURNING {DISCIPLINA_COLUMNS}"
        ))
        .bind(req.nome)
        .bind(req.carga_horaria)
        .bind(req.professor_id)
        .bind(req.turma_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_disciplina(
        &self,
        id: i32,
        req: UpdateDisciplinaRequest,
    ) -> Result<Disciplina, RepoError> {
        Ok(sqlx::query_as::<_, Disciplina>(&format!(
            r#"
            UPDATE disciplinas
               SET nome = COALESCE($2, nome),
                   carga_horaria = COALESCE($3, carga_horaria),
                   professor_id = COALESCE($4, professor_id),
                   turma_id = COALESCE($5, turma_id)
             WHERE id = $1
            RETURNING {DISCIPLINA_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.nome)
        .bind(req.carga_horaria)
        .bind(req.professor_id)
        .bind(req.turma_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_disciplina(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM disciplinas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    async fn disciplinas_of_aluno(&self, aluno_id: i32) -> Result<Vec<Disciplina>, RepoError> {
        Ok(sqlx::query_as::<_, Disciplina>(
            r#"
            SELECT d.id, d.nome, d.carga_horaria, d.professor_id, d.turma_id
              FROM disciplinas d
              JOIN matriculas m ON m.disciplina_id = d.id
             WHERE m.aluno_id = $1
             ORDER BY d.nome, d.id
            "#,
        )
        .bind(aluno_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- MATRICULAS ---

    async fn list_matriculas(&self) -> Result<Vec<Matricula>, RepoError> {
        Ok(sqlx::query_as::<_, Matricula>(
            "SELECT id, aluno_id, disciplina_id, created_at FROM matriculas ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_matricula(&self, id: i32) -> Result<Option<Matricula>, RepoError> {
        Ok(sqlx::query_as::<_, Matricula>(
            "SELECT id, aluno_id, disciplina_id, created_at FROM matriculas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_matricula(
        &self,
        aluno_id: i32,
        disciplina_id: i32,
    ) -> Result<Option<Matricula>, RepoError> {
        Ok(sqlx::query_as::<_, Matricula>(
            "SELECT id, aluno_id, disciplina_id, created_at FROM matriculas \
             WHERE aluno_id = $1 AND disciplina_id = $2",
        )
        .bind(aluno_id)
        .bind(disciplina_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// create_matricula
    ///
    /// Relies on `matriculas_aluno_id_disciplina_id_key` to reject duplicates, including
    /// two enrollments of the same pair racing each other.
    async fn create_matricula(
        &self,
        aluno_id: i32,
        disciplina_id: i32,
    ) -> Result<Matricula, RepoError> {
        Ok(sqlx::query_as::<_, Matricula>(
            "INSERT INTO matriculas (aluno_id, disciplina_id) VALUES ($1, $2) \
             RETURNING id, aluno_id, disciplina_id, created_at",
        )
        .bind(aluno_id)
        .bind(disciplina_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_matricula(&self, id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM matriculas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }

    async fn delete_enrollment(&self, aluno_id: i32, disciplina_id: i32) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM matriculas WHERE aluno_id = $1 AND disciplina_id = $2")
            .bind(aluno_id)
            .bind(disciplina_id)
            .execute(&self.pool)
            .await?;
        expect_deleted(res.rows_affected())
    }
}
