//! User profile and directory endpoints.
//!
//! Every record leaving these handlers goes through the projection in
//! `access::view`, so what a caller sees is decided by the (viewer, subject)
//! role pairing and nowhere else.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::access::{project_user, UserView};
use crate::db::{ChangePasswordRequest, UpdateProfileRequest, User, UserProfile};
use crate::AppState;

use super::auth::{hash_password, verify_password};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

/// Current user's own profile
pub async fn get_profile(user: User) -> Json<UserProfile> {
    Json(UserProfile::from(user))
}

/// Update name, phone or email on the current user's profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    errors.finish()?;

    // Email changes must not collide with another account
    if let Some(ref email) = req.email {
        let email = email.to_lowercase();
        if email != user.email {
            let taken: Option<(String,)> =
                sqlx::query_as("SELECT id FROM users WHERE email = ? AND id != ?")
                    .bind(&email)
                    .bind(&user.id)
                    .fetch_optional(&state.db)
                    .await?;
            if taken.is_some() {
                return Err(ApiError::conflict("Email already in use"));
            }
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            email = COALESCE(?, email),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.phone)
    .bind(req.email.map(|e| e.to_lowercase()))
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserProfile::from(updated)))
}

/// Change the current user's password, verifying the old one first
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.current_password.is_empty() {
        return Err(ApiError::validation_field(
            "current_password",
            "Current password is required",
        ));
    }
    if let Err(e) = validate_password(&req.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(
        serde_json::json!({ "message": "Password changed successfully" }),
    ))
}

/// List student accounts. Admins see every student; teachers only active
/// ones, and through the redacted projection.
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let role = user.role_enum();
    if !role.is_admin() && !role.is_teacher() {
        return Err(ApiError::access_denied());
    }

    let students: Vec<User> = if role.is_admin() {
        sqlx::query_as("SELECT * FROM users WHERE role = 'student' ORDER BY name")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as("SELECT * FROM users WHERE role = 'student' AND is_active = 1 ORDER BY name")
            .fetch_all(&state.db)
            .await?
    };

    let views = students.iter().map(|s| project_user(&user, s)).collect();
    Ok(Json(views))
}

/// List teacher accounts, active or not. Admin only.
pub async fn list_teachers(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserView>>, ApiError> {
    if !user.role_enum().is_admin() {
        return Err(ApiError::access_denied());
    }

    let teachers: Vec<User> =
        sqlx::query_as("SELECT * FROM users WHERE role = 'teacher' ORDER BY name")
            .fetch_all(&state.db)
            .await?;

    let views = teachers.iter().map(|t| project_user(&user, t)).collect();
    Ok(Json(views))
}

/// Users the caller can open a chat with: everyone active except
/// themselves, filtered by role and projected per pairing
pub async fn list_available(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let candidates: Vec<User> = if user.role_enum().is_admin() {
        sqlx::query_as("SELECT * FROM users WHERE id != ? AND is_active = 1 ORDER BY name")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?
    } else {
        // Teachers and students chat with teachers and students, not admins
        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE id != ? AND is_active = 1 AND role IN ('teacher', 'student')
            ORDER BY name
            "#,
        )
        .bind(&user.id)
        .fetch_all(&state.db)
        .await?
    };

    let views = candidates.iter().map(|c| project_user(&user, c)).collect();
    Ok(Json(views))
}

/// A single user record, projected for the caller
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    let subject: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let subject = subject.ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(project_user(&user, &subject)))
}
