use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{LazyLock, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    config::AppConfig,
    errors::AppError,
    models::{Credentials, LoginRequest, LoginResponse, Role, UserProfile},
    repository::RepositoryState,
};

/// Validity window of a session token.
pub const TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

// --- Role allow-lists ---

/// RoleSet
///
/// A static allow-list attached to a route when the router is built. Membership is
/// the only test; an empty set forbids everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(pub &'static [Role]);

/// Administrative writes.
pub const SECRETARIA: RoleSet = RoleSet(&[Role::Secretario]);
/// School staff: secretaries and teachers.
pub const STAFF: RoleSet = RoleSet(&[Role::Secretario, Role::Professor]);
/// Any authenticated identity.
pub const EVERYONE: RoleSet = RoleSet(&[Role::Secretario, Role::Professor, Role::Aluno]);

impl RoleSet {
    pub fn permits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Succeeds iff `role` is in the set, otherwise `Forbidden` naming the accepted roles.
    pub fn check(&self, role: Role) -> Result<(), AppError> {
        if self.permits(role) {
            return Ok(());
        }
        let required: Vec<&str> = self.0.iter().map(|r| r.as_str()).collect();
        let required = if required.is_empty() {
            "no role is allowed".to_string()
        } else {
            format!("requires one of: {}", required.join(", "))
        };
        Err(AppError::Forbidden(format!("access denied, {required}")))
    }
}

// --- Tokens ---

/// Claims
///
/// Self-contained session: who the caller is and which table they came from.
/// Nothing about a session is stored server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub role: Role,
    /// Issued At (seconds since the epoch).
    pub iat: usize,
    /// Expiration Time (seconds since the epoch).
    pub exp: usize,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Signs a token for the identity, valid for `TOKEN_TTL_SECS`.
pub fn issue_token(identity: &Credentials, secret: &str) -> Result<String, AppError> {
    let now = now_secs();
    let claims = Claims {
        id: identity.id,
        email: identity.email.clone(),
        role: identity.role,
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

/// verify_token
///
/// Checks signature and expiry only; storage is never consulted. An expired token
/// gets its own error so clients can tell "log in again" from "forged or garbled".
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        other => {
            tracing::debug!(reason = ?other, "rejected session token");
            AppError::Unauthorized("invalid token".to_string())
        }
    })
}

/// Pulls the token out of `Authorization: Bearer <token>`. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string()))
}

// --- Request identity ---

/// AuthUser
///
/// The verified identity of the caller, decoded from the session token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthUser {
    /// Students may only read their own records; staff may read anyone's.
    pub fn ensure_can_read_aluno(&self, aluno_id: i32) -> Result<(), AppError> {
        if self.role == Role::Aluno && self.id != aluno_id {
            return Err(AppError::Forbidden(
                "students may only access their own records".to_string(),
            ));
        }
        Ok(())
    }
}

/// AuthUser Extractor Implementation
///
/// Reuses the identity `authenticate` already attached to the request when present;
/// otherwise decodes the bearer token itself. Rejects with `Unauthorized`,
/// `TokenExpired` or `ServerMisconfigured`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);
        let secret = config.jwt_secret.as_deref().ok_or_else(|| {
            tracing::error!("JWT_SECRET is not configured; cannot verify tokens");
            AppError::ServerMisconfigured
        })?;

        let token = bearer_token(&parts.headers)?;
        let claims = verify_token(token, secret)?;
        Ok(AuthUser::from(claims))
    }
}

/// authenticate
///
/// Middleware for every non-public route: resolves `AuthUser` (rejecting on failure)
/// and attaches it to the request so `authorize` and handlers can read it.
pub async fn authenticate(user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// authorize
///
/// Per-route role gate. Must run after `authenticate`; a request without an attached
/// identity is rejected as `Unauthorized` rather than waved through.
pub async fn authorize(
    State(allowed): State<RoleSet>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.role)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?;

    allowed.check(role)?;
    Ok(next.run(request).await)
}

// --- Passwords ---

/// Hashes a password with bcrypt off the async runtime.
pub async fn hash_password(plain: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Constant-time bcrypt comparison. A malformed stored hash counts as a mismatch.
pub async fn verify_password(plain: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash)).await {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            tracing::error!("stored password hash is unusable: {e}");
            false
        }
        Err(e) => {
            tracing::error!("password verification task failed: {e}");
            false
        }
    }
}

// --- Login ---

/// resolve_identity
///
/// Searches the identity tables in `Role::LOOKUP_ORDER` and returns the first match.
pub async fn resolve_identity(
    repo: &RepositoryState,
    email: &str,
) -> Result<Option<Credentials>, AppError> {
    for role in Role::LOOKUP_ORDER {
        if let Some(found) = repo.find_credentials(role, email).await? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Throwaway hashes, one per work factor, verified against when the email is unknown.
static DECOY_HASHES: LazyLock<Mutex<HashMap<u32, String>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

async fn decoy_hash(cost: u32) -> Result<String, AppError> {
    let cached = DECOY_HASHES
        .lock()
        .ok()
        .and_then(|hashes| hashes.get(&cost).cloned());
    if let Some(hash) = cached {
        return Ok(hash);
    }

    let hash = hash_password("no-such-account".to_string(), cost).await?;
    if let Ok(mut hashes) = DECOY_HASHES.lock() {
        hashes.insert(cost, hash.clone());
    }
    Ok(hash)
}

/// login
///
/// Exchanges email and password for a signed token plus the public identity.
/// Unknown email and wrong password produce the same `InvalidCredentials`.
pub async fn login(
    repo: &RepositoryState,
    config: &AppConfig,
    req: LoginRequest,
) -> Result<LoginResponse, AppError> {
    let secret = config.jwt_secret.as_deref().ok_or_else(|| {
        tracing::error!("JWT_SECRET is not configured; refusing to issue tokens");
        AppError::ServerMisconfigured
    })?;

    let Some(identity) = resolve_identity(repo, &req.email).await? else {
        // Same bcrypt work as a wrong password, so timing does not reveal the email.
        let decoy = decoy_hash(config.bcrypt_cost).await?;
        verify_password(req.senha, decoy).await;
        tracing::warn!(email = %req.email, "login failed");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(req.senha, identity.senha_hash.clone()).await {
        tracing::warn!(email = %req.email, "login failed");
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(&identity, secret)?;
    tracing::info!(id = identity.id, role = %identity.role, "login succeeded");

    Ok(LoginResponse {
        token,
        user: UserProfile::from(identity),
    })
}
