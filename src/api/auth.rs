//! Authentication: login, registration, sessions and the current-user
//! extractor.
//!
//! Bearer tokens are opaque random values handed out at login and stored
//! SHA-256-hashed. Every request resolves its token against the sessions
//! table, so the role used in access checks always comes from the user row,
//! never from anything the client sent.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::Config;
use crate::db::{LoginRequest, LoginResponse, RegisterRequest, Session, User, UserProfile};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random bearer token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

async fn create_session(
    db: &sqlx::SqlitePool,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(ttl_days)).to_rfc3339();

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(db)
    .await?;

    Ok(token)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(request.email.to_lowercase())
        .fetch_optional(&state.db)
        .await?;

    // Same answer whether the email or the password was wrong
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_enabled() {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(user),
    }))
}

/// Self-registration for teacher and student accounts
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&request.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    let role = request.role.as_deref().unwrap_or("student").to_lowercase();
    if role != "teacher" && role != "student" {
        errors.add("role", "Role must be teacher or student");
    }
    errors.finish()?;

    let email = request.email.to_lowercase();
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash, role, avatar, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, '', 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(request.name.trim())
    .bind(&email)
    .bind(&request.phone)
    .bind(&password_hash)
    .bind(&role)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %id, role = %role, "User registered");

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    let token = create_session(&state.db, &id, state.config.auth.session_ttl_days).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user: UserProfile::from(user),
        }),
    ))
}

/// Invalidate the current session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = extract_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let token_hash = hash_token(&token);

    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(&token_hash)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Current user's own record
pub async fn me(user: User) -> Json<UserProfile> {
    Json(UserProfile::from(user))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Resolve a token to its user, enforcing session expiry and the account's
/// active flag
pub async fn get_current_user(pool: &sqlx::SqlitePool, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);
    let now = chrono::Utc::now().to_rfc3339();

    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(&token_hash)
            .bind(&now)
            .fetch_optional(pool)
            .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    // Disabling an account invalidates its outstanding sessions
    if !user.is_enabled() {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    Ok(user)
}

/// Extractor for the current authenticated user
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(&state.db, &token).await
    }
}

/// Seed the admin account on first start. The password comes from config or
/// is generated and logged once.
pub async fn ensure_admin_user(db: &sqlx::SqlitePool, config: &Config) -> anyhow::Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(db)
            .await?;

    if existing.is_some() {
        return Ok(());
    }

    let password = match &config.auth.admin_password {
        Some(p) => p.clone(),
        None => {
            let generated = generate_token();
            tracing::warn!(
                "No admin_password configured; generated admin password: {}",
                generated
            );
            generated
        }
    };

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash =
        hash_password(&password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, avatar, is_active, created_at, updated_at)
        VALUES (?, 'Administrator', ?, ?, 'admin', '', 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(config.auth.admin_email.to_lowercase())
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::info!("Created admin user {}", config.auth.admin_email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_hash_is_stable_and_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert!(hash_token(&token).chars().all(|c| c.is_ascii_hexdigit()));
    }
}
