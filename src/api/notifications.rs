//! Notification endpoints.
//!
//! Nothing here is stored: every request re-derives notifications from the
//! messaging store and the class registry. Clients keep their own cache and
//! reconcile it through the sync endpoint, so a lost cache or a failed poll
//! costs read flags at worst.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{self, Chat, Class, User, UserRole};
use crate::notify::{self, Notification};
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub cached: Vec<Notification>,
}

/// Derive the caller's current notification set from unread chats and
/// imminently starting classes
async fn derive_for_user(state: &AppState, user: &User) -> Result<Vec<Notification>, ApiError> {
    let now = chrono::Utc::now();
    let mut fresh = Vec::new();

    let chats: Vec<Chat> = if user.role_enum().is_admin() {
        sqlx::query_as("SELECT * FROM chats WHERE is_active = 1")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT c.* FROM chats c
            INNER JOIN chat_participants p ON p.chat_id = c.id
            WHERE p.user_id = ? AND c.is_active = 1
            "#,
        )
        .bind(&user.id)
        .fetch_all(&state.db)
        .await?
    };

    for chat in &chats {
        let unread = db::unread_count(&state.db, &chat.id, &user.id).await?;
        if unread == 0 {
            continue;
        }
        if let Some(last) = db::latest_message(&state.db, &chat.id).await? {
            fresh.push(notify::message_notification(
                &chat.id,
                &last.sender_name,
                &last.content,
                &last.created_at,
            ));
        }
    }

    let classes: Vec<Class> = match user.role_enum() {
        UserRole::Admin => {
            sqlx::query_as("SELECT * FROM classes")
                .fetch_all(&state.db)
                .await?
        }
        UserRole::Teacher => {
            sqlx::query_as("SELECT * FROM classes WHERE teacher_id = ?")
                .bind(&user.id)
                .fetch_all(&state.db)
                .await?
        }
        UserRole::Student => {
            sqlx::query_as(
                r#"
                SELECT c.* FROM classes c
                INNER JOIN class_students cs ON cs.class_id = c.id
                WHERE cs.user_id = ?
                "#,
            )
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?
        }
    };

    for class in &classes {
        if let Some(notification) = notify::class_notification(class, now) {
            fresh.push(notification);
        }
    }

    Ok(fresh)
}

/// Freshly derived notifications, newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let fresh = derive_for_user(&state, &user).await?;
    let now = chrono::Utc::now();
    Ok(Json(notify::reconcile(Vec::new(), fresh, now)))
}

/// Merge the client's cached set with a fresh derivation
pub async fn sync_notifications(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<SyncRequest>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let fresh = derive_for_user(&state, &user).await?;
    let now = chrono::Utc::now();
    Ok(Json(notify::reconcile(req.cached, fresh, now)))
}
