//! Class scheduling endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::db::{
    Class, ClassResponse, ClassStudent, ClassTeacher, CreateClassRequest, UpdateClassRequest, User,
};
use crate::meeting;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_duration, validate_timestamp, validate_title};

const DEFAULT_DURATION_MINUTES: i64 = 60;

fn validate_create_request(req: &CreateClassRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_title(&req.title) {
        errors.add("title", e);
    }
    if let Err(e) = validate_timestamp(&req.scheduled_time, "scheduled_time") {
        errors.add("scheduled_time", e);
    }
    if let Some(duration) = req.duration_minutes {
        if let Err(e) = validate_duration(duration) {
            errors.add("duration_minutes", e);
        }
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateClassRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref title) = req.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", e);
        }
    }
    if let Some(ref scheduled_time) = req.scheduled_time {
        if let Err(e) = validate_timestamp(scheduled_time, "scheduled_time") {
            errors.add("scheduled_time", e);
        }
    }
    if let Some(duration) = req.duration_minutes {
        if let Err(e) = validate_duration(duration) {
            errors.add("duration_minutes", e);
        }
    }
    if let Some(ref status) = req.status {
        if status.parse::<crate::db::ClassStatus>().is_err() {
            errors.add(
                "status",
                "Status must be one of: scheduled, ongoing, completed, cancelled",
            );
        }
    }

    errors.finish()
}

/// Check that every id refers to an existing student account
async fn verify_students_exist(
    db: &sqlx::SqlitePool,
    student_ids: &[String],
) -> Result<(), ApiError> {
    if student_ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; student_ids.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*) FROM users WHERE role = 'student' AND id IN ({})",
        placeholders
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in student_ids {
        query = query.bind(id);
    }
    let found = query.fetch_one(db).await?;

    if found != student_ids.len() as i64 {
        return Err(ApiError::bad_request("Some students not found"));
    }
    Ok(())
}

async fn roster_ids(db: &sqlx::SqlitePool, class_id: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT user_id FROM class_students WHERE class_id = ?")
            .bind(class_id)
            .fetch_all(db)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn replace_roster(
    db: &sqlx::SqlitePool,
    class_id: &str,
    student_ids: &[String],
) -> Result<(), ApiError> {
    verify_students_exist(db, student_ids).await?;

    sqlx::query("DELETE FROM class_students WHERE class_id = ?")
        .bind(class_id)
        .execute(db)
        .await?;

    let now = chrono::Utc::now().to_rfc3339();
    for student_id in student_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO class_students (class_id, user_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(class_id)
        .bind(student_id)
        .bind(&now)
        .execute(db)
        .await?;
    }
    Ok(())
}

/// Assemble the full response shape: teacher info, roster, derived liveness
async fn build_response(db: &sqlx::SqlitePool, class: Class) -> Result<ClassResponse, ApiError> {
    let teacher: (String, String, String) =
        sqlx::query_as("SELECT id, name, email FROM users WHERE id = ?")
            .bind(&class.teacher_id)
            .fetch_one(db)
            .await?;

    let students: Vec<ClassStudent> = sqlx::query_as(
        r#"
        SELECT u.id, u.name, u.avatar
        FROM class_students cs
        INNER JOIN users u ON u.id = cs.user_id
        WHERE cs.class_id = ?
        ORDER BY u.name
        "#,
    )
    .bind(&class.id)
    .fetch_all(db)
    .await?;

    let is_live = class.is_live_at(chrono::Utc::now());

    Ok(ClassResponse {
        id: class.id,
        title: class.title,
        description: class.description,
        teacher: ClassTeacher {
            id: teacher.0,
            name: teacher.1,
            email: teacher.2,
        },
        students,
        scheduled_time: class.scheduled_time,
        duration_minutes: class.duration_minutes,
        status: class.status,
        meeting_room: class.meeting_room,
        meeting_link: class.meeting_link,
        is_live,
        created_at: class.created_at,
        updated_at: class.updated_at,
    })
}

/// Create a class. Teachers only; the meeting room is allocated here and
/// never changes afterwards.
pub async fn create_class(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>), ApiError> {
    if !user.role_enum().is_teacher() {
        return Err(ApiError::access_denied());
    }

    validate_create_request(&req)?;

    let student_ids = req.student_ids.unwrap_or_default();
    verify_students_exist(&state.db, &student_ids).await?;

    let room = meeting::create_room(&state.config.meeting.base_url);
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let duration = req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);

    sqlx::query(
        r#"
        INSERT INTO classes (id, title, description, teacher_id, scheduled_time,
                             duration_minutes, status, meeting_room, meeting_link,
                             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'scheduled', ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&user.id)
    .bind(&req.scheduled_time)
    .bind(duration)
    .bind(&room.room)
    .bind(&room.link)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let added_at = now;
    for student_id in &student_ids {
        sqlx::query("INSERT INTO class_students (class_id, user_id, added_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(student_id)
            .bind(&added_at)
            .execute(&state.db)
            .await?;
    }

    tracing::info!(class_id = %id, teacher_id = %user.id, "Class created");

    let class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(build_response(&state.db, class).await?)))
}

/// List classes visible to the caller, newest schedule first
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<ClassResponse>>, ApiError> {
    let classes: Vec<Class> = match user.role_enum() {
        crate::db::UserRole::Admin => {
            sqlx::query_as("SELECT * FROM classes ORDER BY scheduled_time DESC")
                .fetch_all(&state.db)
                .await?
        }
        crate::db::UserRole::Teacher => {
            sqlx::query_as("SELECT * FROM classes WHERE teacher_id = ? ORDER BY scheduled_time DESC")
                .bind(&user.id)
                .fetch_all(&state.db)
                .await?
        }
        crate::db::UserRole::Student => {
            sqlx::query_as(
                r#"
                SELECT c.* FROM classes c
                INNER JOIN class_students cs ON cs.class_id = c.id
                WHERE cs.user_id = ?
                ORDER BY c.scheduled_time DESC
                "#,
            )
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?
        }
    };

    let mut responses = Vec::with_capacity(classes.len());
    for class in classes {
        responses.push(build_response(&state.db, class).await?);
    }
    Ok(Json(responses))
}

/// A single class, if the caller may see it
pub async fn get_class(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ClassResponse>, ApiError> {
    let class: Option<Class> = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let class = class.ok_or_else(|| ApiError::not_found("Class not found"))?;

    let roster = roster_ids(&state.db, &class.id).await?;
    if !access::can_view_class(&user, &class, &roster) {
        return Err(ApiError::access_denied());
    }

    Ok(Json(build_response(&state.db, class).await?))
}

/// Update schedule, status or roster. The meeting room and link are fixed
/// at creation and never touched here.
pub async fn update_class(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateClassRequest>,
) -> Result<Json<ClassResponse>, ApiError> {
    let class: Option<Class> = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let class = class.ok_or_else(|| ApiError::not_found("Class not found"))?;

    if !access::can_modify_class(&user, &class) {
        return Err(ApiError::access_denied());
    }

    validate_update_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE classes SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            scheduled_time = COALESCE(?, scheduled_time),
            duration_minutes = COALESCE(?, duration_minutes),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.title.as_deref().map(str::trim))
    .bind(&req.description)
    .bind(&req.scheduled_time)
    .bind(req.duration_minutes)
    .bind(req.status.as_ref().map(|s| s.to_lowercase()))
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    if let Some(ref student_ids) = req.student_ids {
        replace_roster(&state.db, &id, student_ids).await?;
    }

    let class: Class = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(build_response(&state.db, class).await?))
}

/// Delete a class outright. Owning teacher or admin.
pub async fn delete_class(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let class: Option<Class> = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let class = class.ok_or_else(|| ApiError::not_found("Class not found"))?;

    if !access::can_modify_class(&user, &class) {
        return Err(ApiError::access_denied());
    }

    sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(class_id = %id, user_id = %user.id, "Class deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Student self-enrollment. Adding an already-enrolled student is a no-op.
pub async fn join_class(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ClassResponse>, ApiError> {
    let class: Option<Class> = sqlx::query_as("SELECT * FROM classes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let class = class.ok_or_else(|| ApiError::not_found("Class not found"))?;

    if !access::can_join_class(&user) {
        return Err(ApiError::access_denied());
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT OR IGNORE INTO class_students (class_id, user_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(&class.id)
    .bind(&user.id)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(Json(build_response(&state.db, class).await?))
}
