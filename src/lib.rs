use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    extract::FromRef,
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod validation;

// Public routes and role-gated authenticated routes.
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use errors::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::me,
        handlers::alunos::list, handlers::alunos::get, handlers::alunos::create,
        handlers::alunos::update, handlers::alunos::delete,
        handlers::professores::list, handlers::professores::get, handlers::professores::alunos,
        handlers::professores::create, handlers::professores::update, handlers::professores::delete,
        handlers::casas::list, handlers::casas::get, handlers::casas::create,
        handlers::casas::update, handlers::casas::delete,
        handlers::turmas::list, handlers::turmas::get, handlers::turmas::create,
        handlers::turmas::update, handlers::turmas::delete,
        handlers::disciplinas::list, handlers::disciplinas::get, handlers::disciplinas::create,
        handlers::disciplinas::update, handlers::disciplinas::delete,
        handlers::matriculas::list, handlers::matriculas::get,
        handlers::matriculas::disciplinas_of_aluno, handlers::matriculas::enroll,
        handlers::matriculas::unenroll, handlers::matriculas::delete
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::SessionUser,
            models::LoginRequest, models::LoginResponse,
            models::Aluno, models::CreateAlunoRequest, models::UpdateAlunoRequest,
            models::Professor, models::CreateProfessorRequest, models::UpdateProfessorRequest,
            models::Casa, models::CreateCasaRequest, models::UpdateCasaRequest,
            models::Turno, models::Turma, models::CreateTurmaRequest, models::UpdateTurmaRequest,
            models::Disciplina, models::CreateDisciplinaRequest, models::UpdateDisciplinaRequest,
            models::Matricula, models::MatriculaRequest,
            errors::ErrorResponse, errors::FieldError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "escola", description = "School administration API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by every protected path.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single shared state: storage behind the `Repository` trait plus the immutable
/// configuration. Cloning is cheap (an `Arc` and a small struct).
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// cors_layer
///
/// Allows only `FRONTEND_ORIGIN` when configured, any origin otherwise. An origin that
/// is not a valid header value admits no cross-origin caller at all.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match config.frontend_origin.as_deref() {
        None => cors.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
            Err(_) => {
                tracing::error!(origin, "FRONTEND_ORIGIN is not a valid header value");
                cors
            }
        },
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = cors_layer(&state.config);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: `authenticate` attaches the caller's identity, then each
        // route's own `authorize` gate checks the role.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            )),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: Generates a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span so every log line of a request carries its
/// `x-request-id` alongside the method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
