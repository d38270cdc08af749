//! Request handlers, one module per resource.
//!
//! Every handler follows the same pipeline: extractors validate the input
//! (`ValidatedJson`, `ValidatedQuery`, `IdPath`), the route's middleware has already
//! authenticated and authorized the caller, the repository does the work, and any
//! storage failure is mapped through `AppError::from_repo`.

pub mod alunos;
pub mod auth;
pub mod casas;
pub mod disciplinas;
pub mod matriculas;
pub mod professores;
pub mod turmas;

use crate::{AppState, errors::AppError, models::Role};

/// Rejects an email already used by any identity other than `except`, so that the
/// login lookup never has to pick between two tables.
pub(crate) async fn ensure_email_available(
    state: &AppState,
    email: &str,
    except: Option<(Role, i32)>,
) -> Result<(), AppError> {
    if state.repo.email_in_use(email, except).await? {
        return Err(AppError::Conflict(format!(
            "an account with this email already exists ({email})"
        )));
    }
    Ok(())
}
