use escola_api::{
    models::{
        AlunoChanges, AlunoFilter, CreateCasaRequest, CreateDisciplinaRequest, CreateTurmaRequest,
        NewAluno, NewProfessor, Role, Turno, UpdateTurmaRequest,
    },
    repository::{PostgresRepository, RepoError, Repository},
};
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};

// --- Test Context and Setup ---

/// Holds the pool of a migrated test database. These tests only run when
/// `DATABASE_URL` points at a Postgres instance; otherwise each one returns early.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// A value no other test run has used, so tests never collide on unique columns.
fn unique(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!(
        "{prefix}-{nanos}-{}",
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

fn new_aluno(casa_id: Option<i32>) -> NewAluno {
    NewAluno {
        nome: unique("aluno"),
        email: format!("{}@escola.test", unique("aluno")),
        senha_hash: "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinv".to_string(),
        casa_id,
        turma_id: None,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_duplicate_casa_name_is_unique_violation_on_nome() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let nome = unique("casa");

    repo.create_casa(CreateCasaRequest {
        nome: nome.clone(),
        descricao: None,
    })
    .await
    .unwrap();

    let err = repo
        .create_casa(CreateCasaRequest {
            nome,
            descricao: Some("again".to_string()),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::UniqueViolation {
            field: "nome".to_string()
        }
    );
}

#[tokio::test]
async fn test_deleting_referenced_casa_is_foreign_key_violation() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let casa = repo
        .create_casa(CreateCasaRequest {
            nome: unique("casa"),
            descricao: None,
        })
        .await
        .unwrap();
    repo.create_aluno(new_aluno(Some(casa.id))).await.unwrap();

    let err = repo.delete_casa(casa.id).await.unwrap_err();
    assert!(
        matches!(err, RepoError::ForeignKeyViolation { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_missing_rows_report_not_found_on_write_and_none_on_read() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    assert_eq!(repo.get_casa(i32::MAX).await.unwrap(), None);
    assert_eq!(repo.delete_casa(i32::MAX).await, Err(RepoError::NotFound));
    assert_eq!(
        repo.update_aluno(i32::MAX, AlunoChanges::default()).await,
        Err(RepoError::NotFound)
    );
}

#[tokio::test]
async fn test_partial_turma_update_keeps_other_columns() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let nome = unique("turma");

    let turma = repo
        .create_turma(CreateTurmaRequest {
            nome: nome.clone(),
            ano: 2,
            turno: Turno::Manha,
        })
        .await
        .unwrap();

    let updated = repo
        .update_turma(
            turma.id,
            UpdateTurmaRequest {
                turno: Some(Turno::Noite),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nome, nome);
    assert_eq!(updated.ano, 2);
    assert_eq!(updated.turno, Turno::Noite);
}

#[tokio::test]
async fn test_enrollment_pair_is_unique_and_cascades_with_aluno() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let aluno = repo.create_aluno(new_aluno(None)).await.unwrap();
    let disciplina = repo
        .create_disciplina(CreateDisciplinaRequest {
            nome: unique("disciplina"),
            carga_horaria: 40,
            professor_id: None,
            turma_id: None,
        })
        .await
        .unwrap();

    repo.create_matricula(aluno.id, disciplina.id).await.unwrap();
    let err = repo
        .create_matricula(aluno.id, disciplina.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::UniqueViolation { .. }));

    repo.delete_aluno(aluno.id).await.unwrap();
    assert_eq!(
        repo.find_matricula(aluno.id, disciplina.id).await.unwrap(),
        None
    );
    repo.delete_disciplina(disciplina.id).await.unwrap();
}

#[tokio::test]
async fn test_credentials_and_cross_table_email_lookup() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let email = format!("{}@escola.test", unique("prof"));

    let professor = repo
        .create_professor(NewProfessor {
            nome: "Filius".to_string(),
            email: email.clone(),
            senha_hash: "hash".to_string(),
        })
        .await
        .unwrap();

    let found = repo
        .find_credentials(Role::Professor, &email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, professor.id);
    assert_eq!(found.role, Role::Professor);
    assert_eq!(found.senha_hash, "hash");

    assert_eq!(repo.find_credentials(Role::Aluno, &email).await.unwrap().map(|c| c.id), None);
    assert!(repo.email_in_use(&email, None).await.unwrap());
    assert!(
        !repo
            .email_in_use(&email, Some((Role::Professor, professor.id)))
            .await
            .unwrap()
    );
    assert!(
        repo.email_in_use(&email, Some((Role::Aluno, professor.id)))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_list_alunos_filter_by_casa() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let casa = repo
        .create_casa(CreateCasaRequest {
            nome: unique("casa"),
            descricao: None,
        })
        .await
        .unwrap();
    let member = repo.create_aluno(new_aluno(Some(casa.id))).await.unwrap();
    repo.create_aluno(new_aluno(None)).await.unwrap();

    let listed = repo
        .list_alunos(&AlunoFilter {
            casa_id: Some(casa.id),
            turma_id: None,
        })
        .await
        .unwrap();
    assert_eq!(listed, vec![member]);
}
