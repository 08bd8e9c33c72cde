//! Chat and message endpoints.
//!
//! Fetching a chat's messages doubles as the read-mark: everything in the
//! chat the caller did not send becomes read-by-caller, idempotently.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::db::{
    self, Chat, ChatResponse, ChatType, CreateChatRequest, Message, MessagePageQuery,
    MessageResponse, ReadReceipt, SendMessageRequest, User,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_message_content;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

async fn build_chat_response(
    db: &sqlx::SqlitePool,
    chat: Chat,
    viewer_id: &str,
) -> Result<ChatResponse, ApiError> {
    let participants = db::chat_participants(db, &chat.id).await?;
    let last_message = db::latest_message(db, &chat.id).await?;
    let unread_count = db::unread_count(db, &chat.id, viewer_id).await?;

    Ok(ChatResponse {
        id: chat.id,
        name: chat.name,
        chat_type: chat.chat_type,
        created_by: chat.created_by,
        participants,
        last_message,
        unread_count,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    })
}

/// Create a chat. Private chats between the same pair de-duplicate onto the
/// existing chat; group chats are admin-only.
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let chat_type: ChatType = req
        .chat_type
        .parse()
        .map_err(|_| ApiError::validation_field("chat_type", "Type must be private or group"))?;

    if req.participant_ids.is_empty() {
        return Err(ApiError::validation_field(
            "participant_ids",
            "At least one participant is required",
        ));
    }

    if chat_type == ChatType::Private && req.participant_ids.len() != 1 {
        return Err(ApiError::validation_field(
            "participant_ids",
            "Private chat must have exactly one other participant",
        ));
    }

    if chat_type == ChatType::Group && !access::can_create_group_chat(&user) {
        return Err(ApiError::access_denied());
    }

    // The creator always participates; drop duplicates
    let mut all_participants: Vec<String> = vec![user.id.clone()];
    for id in &req.participant_ids {
        if !all_participants.contains(id) {
            all_participants.push(id.clone());
        }
    }

    // A "private chat" with yourself collapses to a single participant
    if chat_type == ChatType::Private && all_participants.len() != 2 {
        return Err(ApiError::validation_field(
            "participant_ids",
            "Private chat must have exactly one other participant",
        ));
    }

    let placeholders = vec!["?"; all_participants.len()].join(", ");
    let sql = format!("SELECT COUNT(*) FROM users WHERE id IN ({})", placeholders);
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in &all_participants {
        query = query.bind(id);
    }
    let found = query.fetch_one(&state.db).await?;
    if found != all_participants.len() as i64 {
        return Err(ApiError::bad_request("Some participants not found"));
    }

    if chat_type == ChatType::Private {
        if let Some(existing) =
            db::find_private_chat(&state.db, &all_participants[0], &all_participants[1]).await?
        {
            let response = build_chat_response(&state.db, existing, &user.id).await?;
            return Ok((StatusCode::OK, Json(response)));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let name = match chat_type {
        ChatType::Private => req.name,
        ChatType::Group => Some(req.name.unwrap_or_else(|| "Group Chat".to_string())),
    };

    sqlx::query(
        r#"
        INSERT INTO chats (id, name, chat_type, created_by, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(chat_type.to_string())
    .bind(&user.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    for participant in &all_participants {
        sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
            .bind(&id)
            .bind(participant)
            .execute(&state.db)
            .await?;
    }

    tracing::info!(chat_id = %id, chat_type = %chat_type, "Chat created");

    let chat: Chat = sqlx::query_as("SELECT * FROM chats WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    let response = build_chat_response(&state.db, chat, &user.id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Active chats visible to the caller, most recently touched first
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<ChatResponse>>, ApiError> {
    let chats: Vec<Chat> = if user.role_enum().is_admin() {
        sqlx::query_as("SELECT * FROM chats WHERE is_active = 1 ORDER BY updated_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT c.* FROM chats c
            INNER JOIN chat_participants p ON p.chat_id = c.id
            WHERE p.user_id = ? AND c.is_active = 1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(&user.id)
        .fetch_all(&state.db)
        .await?
    };

    let mut responses = Vec::with_capacity(chats.len());
    for chat in chats {
        responses.push(build_chat_response(&state.db, chat, &user.id).await?);
    }
    Ok(Json(responses))
}

/// A single chat, if the caller may see it
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, ApiError> {
    let chat: Option<Chat> = sqlx::query_as("SELECT * FROM chats WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let chat = chat.ok_or_else(|| ApiError::not_found("Chat not found"))?;

    let participants = db::chat_participants(&state.db, &chat.id).await?;
    let participant_ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
    if !access::can_access_chat(&user, &participant_ids) {
        return Err(ApiError::access_denied());
    }

    Ok(Json(build_chat_response(&state.db, chat, &user.id).await?))
}

/// A page of messages, oldest first within the page. Fetching marks every
/// message the caller did not send as read by them.
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Query(page_query): Query<MessagePageQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let chat: Option<Chat> = sqlx::query_as("SELECT * FROM chats WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let chat = chat.ok_or_else(|| ApiError::not_found("Chat not found"))?;

    let participant_ids: Vec<String> = db::chat_participants(&state.db, &chat.id)
        .await?
        .iter()
        .map(|p| p.id.clone())
        .collect();
    if !access::can_access_chat(&user, &participant_ids) {
        return Err(ApiError::access_denied());
    }

    let page = page_query.page.unwrap_or(1).max(1);
    let limit = page_query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let mut messages: Vec<db::MessageWithSender> = sqlx::query_as(
        r#"
        SELECT m.id, m.chat_id, m.sender_id,
               u.name AS sender_name, u.avatar AS sender_avatar, u.role AS sender_role,
               m.content, m.created_at
        FROM messages m
        INNER JOIN users u ON u.id = m.sender_id
        WHERE m.chat_id = ? AND m.is_deleted = 0
        ORDER BY m.created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&chat.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    // Reading the chat marks everything unseen as seen; repeat fetches are
    // no-ops thanks to the receipt primary key
    db::mark_chat_read(&state.db, &chat.id, &user.id).await?;

    let mut receipts: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
    if !messages.is_empty() {
        let placeholders = vec!["?"; messages.len()].join(", ");
        let sql = format!(
            "SELECT message_id, user_id, read_at FROM message_reads WHERE message_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query_as::<_, (String, String, String)>(&sql);
        for message in &messages {
            query = query.bind(&message.id);
        }
        for (message_id, user_id, read_at) in query.fetch_all(&state.db).await? {
            receipts
                .entry(message_id)
                .or_default()
                .push(ReadReceipt { user_id, read_at });
        }
    }

    // Oldest first within the page
    messages.reverse();

    let responses = messages
        .into_iter()
        .map(|m| MessageResponse {
            read_by: receipts.remove(&m.id).unwrap_or_default(),
            id: m.id,
            chat_id: m.chat_id,
            sender: db::ChatParticipant {
                id: m.sender_id,
                name: m.sender_name,
                avatar: m.sender_avatar,
                role: m.sender_role,
            },
            content: m.content,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(responses))
}

/// Append a message and bump the chat's recency marker
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let chat: Option<Chat> = sqlx::query_as("SELECT * FROM chats WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let chat = chat.ok_or_else(|| ApiError::not_found("Chat not found"))?;

    let participant_ids: Vec<String> = db::chat_participants(&state.db, &chat.id)
        .await?
        .iter()
        .map(|p| p.id.clone())
        .collect();
    if !access::can_access_chat(&user, &participant_ids) {
        return Err(ApiError::access_denied());
    }

    if let Err(e) = validate_message_content(&req.content) {
        return Err(ApiError::validation_field("content", e));
    }

    let message_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO messages (id, chat_id, sender_id, content, is_deleted, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&message_id)
    .bind(&chat.id)
    .bind(&user.id)
    .bind(req.content.trim())
    .bind(&now)
    .execute(&state.db)
    .await?;

    db::touch_chat(&state.db, &chat.id).await?;

    let message: Message = sqlx::query_as("SELECT * FROM messages WHERE id = ?")
        .bind(&message_id)
        .fetch_one(&state.db)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message.id,
            chat_id: message.chat_id,
            sender: db::ChatParticipant {
                id: user.id.clone(),
                name: user.name.clone(),
                avatar: user.avatar.clone(),
                role: user.role.clone(),
            },
            content: message.content,
            read_by: Vec::new(),
            created_at: message.created_at,
        }),
    ))
}

/// Soft-delete a chat. Admin, or the creator.
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chat: Option<Chat> = sqlx::query_as("SELECT * FROM chats WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let chat = chat.ok_or_else(|| ApiError::not_found("Chat not found"))?;

    if !access::can_delete_chat(&user, &chat) {
        return Err(ApiError::access_denied());
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE chats SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&chat.id)
        .execute(&state.db)
        .await?;

    tracing::info!(chat_id = %chat.id, user_id = %user.id, "Chat soft-deleted");

    Ok(Json(
        serde_json::json!({ "message": "Chat deleted successfully" }),
    ))
}
