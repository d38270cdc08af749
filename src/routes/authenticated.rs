use crate::{
    AppState,
    auth::{EVERYONE, RoleSet, SECRETARIA, STAFF, authorize},
    handlers::{alunos, auth, casas, disciplinas, matriculas, professores, turmas},
};
use axum::{
    Router,
    middleware,
    routing::{MethodRouter, delete, get, post, put},
};

/// gated
///
/// Wraps a single-method router with the role gate for that method. Gates are
/// `route_layer`s, so an unknown method still answers 405 instead of 403.
fn gated(route: MethodRouter<AppState>, roles: RoleSet) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(roles, authorize))
}

/// Authenticated Router Module
///
/// Every route here runs after `authenticate` has attached an `AuthUser`. Reads of
/// reference data are open to every role; student listings and enrollments are
/// staff-only; all writes belong to the secretariat. Routes that let a student read
/// their own record additionally check ownership in the handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", gated(get(auth::me), EVERYONE))
        // --- Alunos ---
        .route(
            "/alunos",
            gated(get(alunos::list), STAFF).merge(gated(post(alunos::create), SECRETARIA)),
        )
        .route(
            "/alunos/{id}",
            gated(get(alunos::get), EVERYONE)
                .merge(gated(put(alunos::update), SECRETARIA))
                .merge(gated(delete(alunos::delete), SECRETARIA)),
        )
        // --- Professores ---
        .route(
            "/professores",
            gated(get(professores::list), EVERYONE)
                .merge(gated(post(professores::create), SECRETARIA)),
        )
        .route(
            "/professores/{id}",
            gated(get(professores::get), EVERYONE)
                .merge(gated(put(professores::update), SECRETARIA))
                .merge(gated(delete(professores::delete), SECRETARIA)),
        )
        // GET /professores/{id}/alunos
        // Distinct students enrolled in any subject the teacher teaches.
        .route(
            "/professores/{id}/alunos",
            gated(get(professores::alunos), STAFF),
        )
        // --- Casas ---
        .route(
            "/casas",
            gated(get(casas::list), EVERYONE).merge(gated(post(casas::create), SECRETARIA)),
        )
        .route(
            "/casas/{id}",
            gated(get(casas::get), EVERYONE)
                .merge(gated(put(casas::update), SECRETARIA))
                .merge(gated(delete(casas::delete), SECRETARIA)),
        )
        // --- Turmas ---
        .route(
            "/turmas",
            gated(get(turmas::list), EVERYONE).merge(gated(post(turmas::create), SECRETARIA)),
        )
        .route(
            "/turmas/{id}",
            gated(get(turmas::get), EVERYONE)
                .merge(gated(put(turmas::update), SECRETARIA))
                .merge(gated(delete(turmas::delete), SECRETARIA)),
        )
        // --- Disciplinas ---
        .route(
            "/disciplinas",
            gated(get(disciplinas::list), EVERYONE)
                .merge(gated(post(disciplinas::create), SECRETARIA)),
        )
        .route(
            "/disciplinas/{id}",
            gated(get(disciplinas::get), EVERYONE)
                .merge(gated(put(disciplinas::update), SECRETARIA))
                .merge(gated(delete(disciplinas::delete), SECRETARIA)),
        )
        // --- Matriculas ---
        // DELETE /matriculas takes the (aluno_id, disciplina_id) pair in the body.
        .route(
            "/matriculas",
            gated(get(matriculas::list), STAFF)
                .merge(gated(post(matriculas::enroll), SECRETARIA))
                .merge(gated(delete(matriculas::unenroll), SECRETARIA)),
        )
        .route(
            "/matriculas/{id}",
            gated(get(matriculas::get), STAFF)
                .merge(gated(delete(matriculas::delete), SECRETARIA)),
        )
        .route(
            "/matriculas/aluno/{id}/disciplinas",
            gated(get(matriculas::disciplinas_of_aluno), EVERYONE),
        )
}
