//! Admin endpoints: platform stats and user management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateUserRequest, PlatformStats, UpdateUserStatusRequest, User, UserProfile,
};
use crate::AppState;

use super::auth::hash_password;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_assignable_role, validate_email, validate_name, validate_password,
};

fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.role_enum().is_admin() {
        Ok(())
    } else {
        Err(ApiError::access_denied())
    }
}

/// Platform-wide counters for the admin dashboard
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<PlatformStats>, ApiError> {
    require_admin(&user)?;

    let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let (total_teachers,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'teacher'")
            .fetch_one(&state.db)
            .await?;
    let (total_students,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'student'")
            .fetch_one(&state.db)
            .await?;
    let (total_classes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM classes")
        .fetch_one(&state.db)
        .await?;

    let now = chrono::Utc::now().to_rfc3339();
    let (upcoming_classes,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM classes WHERE scheduled_time >= ? AND status = 'scheduled'",
    )
    .bind(&now)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(PlatformStats {
        total_users,
        total_teachers,
        total_students,
        total_classes,
        upcoming_classes,
    }))
}

/// Enable or disable an account. Disabling blocks login and invalidates
/// outstanding sessions on their next use.
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    require_admin(&user)?;

    let target: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let target = target.ok_or_else(|| ApiError::not_found("User not found"))?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(req.is_active as i32)
        .bind(&now)
        .bind(&target.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %target.id, is_active = req.is_active, "User status changed");

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&target.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserProfile::from(updated)))
}

/// Create a teacher or student account with its role-specific fields
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    require_admin(&user)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_assignable_role(&req.role) {
        errors.add("role", e);
    }
    errors.finish()?;

    let email = req.email.to_lowercase();
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let role = req.role.to_lowercase();
    let is_student = role == "student";

    let enrolled_subjects = if is_student {
        req.enrolled_subjects
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| serde_json::to_string(s).unwrap_or_else(|_| "[]".to_string()))
    } else {
        None
    };

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash, role, avatar, is_active,
                           grade, school, father_name, father_contact, mother_name,
                           mother_contact, enrolled_subjects, specialization, qualification,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, '', 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(&email)
    .bind(&req.phone)
    .bind(&password_hash)
    .bind(&role)
    .bind(if is_student { req.grade.as_deref() } else { None })
    .bind(if is_student { req.school.as_deref() } else { None })
    .bind(if is_student { req.father_name.as_deref() } else { None })
    .bind(if is_student { req.father_contact.as_deref() } else { None })
    .bind(if is_student { req.mother_name.as_deref() } else { None })
    .bind(if is_student { req.mother_contact.as_deref() } else { None })
    .bind(&enrolled_subjects)
    .bind(if is_student { None } else { req.specialization.as_deref() })
    .bind(if is_student { None } else { req.qualification.as_deref() })
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %id, role = %role, "User created by admin");

    let created: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(created))))
}

/// Hard-delete an account and everything cascading from it
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    let target: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let target = target.ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&target.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %target.id, "User deleted");

    Ok(Json(
        serde_json::json!({ "message": "User deleted successfully" }),
    ))
}
