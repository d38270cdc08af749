use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    middleware,
    routing::get,
};
use escola_api::{
    AppState,
    auth::{self, AuthUser, Claims, RoleSet, SECRETARIA, STAFF},
    config::AppConfig,
    errors::AppError,
    models::{LoginRequest, NewAluno, NewProfessor, Role},
    repository::{InMemoryRepository, Repository, RepositoryState},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

const PASSWORD: &str = "correct-horse";

// --- Fixtures ---

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn secret(config: &AppConfig) -> &str {
    config.jwt_secret.as_deref().unwrap()
}

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with(authorization: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/auth/me");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn state_with(repo: RepositoryState, config: AppConfig) -> AppState {
    AppState { repo, config }
}

/// One identity per table, all sharing `PASSWORD`.
async fn seeded_repo() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    let hash = bcrypt::hash(PASSWORD, 4).unwrap();

    repo.add_secretario("Minerva", "secretaria@escola.edu", &hash)
        .unwrap();
    repo.create_professor(NewProfessor {
        nome: "Severo".to_string(),
        email: "professor@escola.edu".to_string(),
        senha_hash: hash.clone(),
    })
    .await
    .unwrap();
    repo.create_aluno(NewAluno {
        nome: "Harry".to_string(),
        email: "aluno@escola.edu".to_string(),
        senha_hash: hash,
        casa_id: None,
        turma_id: None,
    })
    .await
    .unwrap();
    repo
}

fn login_request(email: &str, senha: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        senha: senha.to_string(),
    }
}

// --- AuthUser extractor ---

#[tokio::test]
async fn test_valid_token_yields_auth_user() {
    let config = AppConfig::default();
    let token = sign(
        &Claims {
            id: 3,
            email: "aluno@escola.edu".to_string(),
            role: Role::Aluno,
            iat: now(),
            exp: now() + 3600,
        },
        secret(&config),
    );
    let state = state_with(Arc::new(InMemoryRepository::new()), config);

    let mut parts = parts_with(Some(&format!("Bearer {token}")));
    let user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(user.id, 3);
    assert_eq!(user.role, Role::Aluno);
    assert_eq!(user.email, "aluno@escola.edu");
}

#[tokio::test]
async fn test_missing_header_is_unauthorized() {
    let state = state_with(Arc::new(InMemoryRepository::new()), AppConfig::default());
    let mut parts = parts_with(None);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_token_expired() {
    let config = AppConfig::default();
    let token = sign(
        &Claims {
            id: 1,
            email: "secretaria@escola.edu".to_string(),
            role: Role::Secretario,
            iat: now() - 8 * 24 * 3600,
            exp: now() - 24 * 3600,
        },
        secret(&config),
    );
    let state = state_with(Arc::new(InMemoryRepository::new()), config);

    let mut parts = parts_with(Some(&format!("Bearer {token}")));
    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err, AppError::TokenExpired);
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let state = state_with(Arc::new(InMemoryRepository::new()), AppConfig::default());
    let mut parts = parts_with(Some("Bearer not.a.jwt"));

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_missing_secret_is_server_misconfigured() {
    let config = AppConfig {
        jwt_secret: None,
        ..AppConfig::default()
    };
    let state = state_with(Arc::new(InMemoryRepository::new()), config);
    let mut parts = parts_with(Some("Bearer whatever"));

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err, AppError::ServerMisconfigured);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Login ---

#[tokio::test]
async fn test_login_tags_each_identity_with_its_table_role() {
    let repo = seeded_repo().await as RepositoryState;
    let config = AppConfig::default();

    for (email, role) in [
        ("secretaria@escola.edu", Role::Secretario),
        ("professor@escola.edu", Role::Professor),
        ("aluno@escola.edu", Role::Aluno),
    ] {
        let response = auth::login(&repo, &config, login_request(email, PASSWORD))
            .await
            .unwrap();
        assert_eq!(response.user.role, role);
        assert_eq!(response.user.email, email);

        let claims = auth::verify_token(&response.token, secret(&config)).unwrap();
        assert_eq!(claims.role, role);
        assert_eq!(claims.id, response.user.id);
        assert_eq!(claims.exp - claims.iat, auth::TOKEN_TTL_SECS as usize);
    }
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_are_indistinguishable() {
    let repo = seeded_repo().await as RepositoryState;
    let config = AppConfig::default();

    let unknown = auth::login(&repo, &config, login_request("ghost@escola.edu", PASSWORD))
        .await
        .unwrap_err();
    let wrong = auth::login(
        &repo,
        &config,
        login_request("professor@escola.edu", "wrong-password"),
    )
    .await
    .unwrap_err();

    assert_eq!(unknown, AppError::InvalidCredentials);
    assert_eq!(unknown, wrong);
    assert_eq!(unknown.to_string(), wrong.to_string());
}

/// Fastest of a few failed logins, so scheduler noise does not dominate.
async fn fastest_failed_login(
    repo: &RepositoryState,
    config: &AppConfig,
    email: &str,
) -> Duration {
    let mut fastest = Duration::MAX;
    for _ in 0..3 {
        let started = Instant::now();
        let err = auth::login(repo, config, login_request(email, "wrong-password"))
            .await
            .unwrap_err();
        fastest = fastest.min(started.elapsed());
        assert_eq!(err, AppError::InvalidCredentials);
    }
    fastest
}

#[tokio::test]
async fn test_unknown_email_costs_a_bcrypt_verify_like_wrong_password() {
    const COST: u32 = 10;
    let repo = Arc::new(InMemoryRepository::new());
    repo.create_professor(NewProfessor {
        nome: "Quirrell".to_string(),
        email: "quirrell@escola.edu".to_string(),
        senha_hash: bcrypt::hash(PASSWORD, COST).unwrap(),
    })
    .await
    .unwrap();
    let repo = repo as RepositoryState;
    let config = AppConfig {
        bcrypt_cost: COST,
        ..AppConfig::default()
    };

    // The decoy hash is built once per cost; keep that out of the measurement.
    let _ = auth::login(&repo, &config, login_request("warmup@escola.edu", PASSWORD)).await;

    let unknown = fastest_failed_login(&repo, &config, "ghost@escola.edu").await;
    let wrong = fastest_failed_login(&repo, &config, "quirrell@escola.edu").await;
    assert!(
        unknown * 4 >= wrong,
        "unknown email took {unknown:?}, wrong password took {wrong:?}"
    );
}

#[tokio::test]
async fn test_secretario_table_wins_on_shared_email() {
    let repo = Arc::new(InMemoryRepository::new());
    let hash = bcrypt::hash(PASSWORD, 4).unwrap();
    repo.create_professor(NewProfessor {
        nome: "Duplicate".to_string(),
        email: "shared@escola.edu".to_string(),
        senha_hash: hash.clone(),
    })
    .await
    .unwrap();
    repo.add_secretario("Shared", "shared@escola.edu", &hash)
        .unwrap();

    let repo = repo as RepositoryState;
    let found = auth::resolve_identity(&repo, "shared@escola.edu")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.role, Role::Secretario);
}

#[tokio::test]
async fn test_login_without_secret_is_server_misconfigured() {
    let repo = seeded_repo().await as RepositoryState;
    let config = AppConfig {
        jwt_secret: None,
        ..AppConfig::default()
    };

    let err = auth::login(&repo, &config, login_request("aluno@escola.edu", PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err, AppError::ServerMisconfigured);
}

// --- authorize middleware ---

/// A tiny router with one gated route, wired like the real one.
fn gated_app(roles: RoleSet) -> Router {
    let state = state_with(Arc::new(InMemoryRepository::new()), AppConfig::default());
    Router::new()
        .route(
            "/gated",
            get(|| async { "ok" })
                .route_layer(middleware::from_fn_with_state(roles, auth::authorize)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .with_state(state)
}

fn bearer_for(role: Role) -> String {
    let config = AppConfig::default();
    let token = sign(
        &Claims {
            id: 1,
            email: "someone@escola.edu".to_string(),
            role,
            iat: now(),
            exp: now() + 600,
        },
        secret(&config),
    );
    format!("Bearer {token}")
}

async fn call(app: Router, authorization: Option<String>) -> StatusCode {
    let mut request = Request::builder().uri("/gated");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_role_in_set_passes_the_gate() {
    let status = call(gated_app(STAFF), Some(bearer_for(Role::Professor))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_outside_set_is_forbidden() {
    let status = call(gated_app(SECRETARIA), Some(bearer_for(Role::Aluno))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_role_set_forbids_every_role() {
    for role in Role::LOOKUP_ORDER {
        let status = call(gated_app(RoleSet(&[])), Some(bearer_for(role))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_gate_without_token_is_unauthorized() {
    let status = call(gated_app(STAFF), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_without_authenticate_is_unauthorized() {
    // No `authenticate` layer, so no identity is attached despite the valid bearer.
    let app: Router = Router::new().route(
        "/gated",
        get(|| async { "ok" })
            .route_layer(middleware::from_fn_with_state(STAFF, auth::authorize)),
    );
    let status = call(app, Some(bearer_for(Role::Professor))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
