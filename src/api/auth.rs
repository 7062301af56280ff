//! Authentication: password hashing, access tokens and the `CurrentUser`
//! extractor.
//!
//! Every authenticated request re-reads the user, so deactivating an
//! account or changing its role takes effect on the next call.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    Form, Json,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sessions::SessionKey;
use super::{AppError, AppState};
use crate::domain::access::{Access, Capability};
use crate::domain::aggregates::{Role, User};
use crate::domain::aggregates::user::normalize_email;
use crate::infra::StoreError;

const INVALID_CREDENTIALS: &str = "Incorrect email or password";

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Login session; keys the server-side cart.
    pub sid: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthKeys {
    pub fn new(secret: &SecretString, ttl_minutes: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issue a token for a fresh login session.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            sid: Uuid::new_v4(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected access token");
                AppError::Unauthorized("Could not validate credentials".to_string())
            })
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
    pub session_expires_at: DateTime<Utc>,
}

impl CurrentUser {
    pub fn session(&self) -> SessionKey { SessionKey { id: self.session_id, expires_at: self.session_expires_at } }

    pub fn access(&self) -> Access { Access::for_role(self.user.role) }

    /// Server-side gate; a missing capability is a 403.
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.access().allows(capability) {
            Ok(())
        } else {
            tracing::info!(user_id = %self.user.id, role = %self.user.role, ?capability, "access denied");
            Err(AppError::Forbidden("Not enough permissions".to_string()))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
        let claims = state.auth.verify(token)?;
        let user = match state.store.get_user(claims.sub).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AppError::Unauthorized("User not found".to_string())),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(AppError::Unauthorized("Inactive user".to_string()));
        }
        let session_expires_at = Utc.timestamp_opt(claims.exp, 0).single().unwrap_or_else(Utc::now);
        Ok(Self { user, session_id: claims.sid, session_expires_at })
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(&form.username);
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        tracing::info!(%email, "login failed: unknown user");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    if !verify_password_blocking(form.password, user.hashed_password.clone()).await? {
        tracing::info!(%email, "login failed: wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }
    if !user.is_active {
        return Err(AppError::BadRequest("Inactive user".to_string()));
    }
    let access_token = state.auth.issue(&user)?;
    tracing::info!(user_id = %user.id, role = %user.role, "login");
    Ok(Json(TokenResponse { access_token, token_type: "bearer".to_string() }))
}

pub async fn me(current: CurrentUser) -> Json<User> { Json(current.user) }

pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> StatusCode {
    state.carts.drop_session(current.session_id).await;
    tracing::info!(user_id = %current.user.id, "logout");
    StatusCode::NO_CONTENT
}
