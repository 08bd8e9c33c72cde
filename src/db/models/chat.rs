//! Chat and message models with the read-state bookkeeping helpers.
//!
//! Read receipts live in `message_reads` keyed by (message, user), so marking
//! a message read is an `INSERT OR IGNORE` and is idempotent by construction.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatType::Private => write!(f, "private"),
            ChatType::Group => write!(f, "group"),
        }
    }
}

impl std::str::FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(ChatType::Private),
            "group" => Ok(ChatType::Group),
            _ => Err(format!("Unknown chat type: {}", s)),
        }
    }
}

impl From<String> for ChatType {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ChatType::Private)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub id: String,
    pub name: Option<String>,
    pub chat_type: String,
    pub created_by: Option<String>,
    pub is_active: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Chat {
    pub fn chat_type_enum(&self) -> ChatType {
        self.chat_type.clone().into()
    }

    pub fn is_enabled(&self) -> bool {
        self.is_active != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub is_deleted: i32,
    pub created_at: String,
}

/// Participant summary embedded in chat responses
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatParticipant {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub role: String,
}

/// A message joined with its sender's display fields
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithSender {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: String,
    pub sender_role: String,
    pub content: String,
    pub created_at: String,
}

/// Read receipt attached to a message response
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    pub sender: ChatParticipant,
    pub content: String,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub name: Option<String>,
    pub chat_type: String,
    pub created_by: Option<String>,
    pub participants: Vec<ChatParticipant>,
    pub last_message: Option<MessageWithSender>,
    pub unread_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub chat_type: String,
    pub participant_ids: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Find the active private chat between exactly these two users, if any
pub async fn find_private_chat(
    db: &SqlitePool,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Chat>, sqlx::Error> {
    sqlx::query_as::<_, Chat>(
        r#"
        SELECT c.* FROM chats c
        WHERE c.chat_type = 'private'
          AND c.is_active = 1
          AND EXISTS (SELECT 1 FROM chat_participants p WHERE p.chat_id = c.id AND p.user_id = ?)
          AND EXISTS (SELECT 1 FROM chat_participants p WHERE p.chat_id = c.id AND p.user_id = ?)
          AND (SELECT COUNT(*) FROM chat_participants p WHERE p.chat_id = c.id) = 2
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(db)
    .await
}

pub async fn chat_participants(
    db: &SqlitePool,
    chat_id: &str,
) -> Result<Vec<ChatParticipant>, sqlx::Error> {
    sqlx::query_as::<_, ChatParticipant>(
        r#"
        SELECT u.id, u.name, u.avatar, u.role
        FROM chat_participants p
        INNER JOIN users u ON u.id = p.user_id
        WHERE p.chat_id = ?
        ORDER BY u.name
        "#,
    )
    .bind(chat_id)
    .fetch_all(db)
    .await
}

pub async fn is_participant(
    db: &SqlitePool,
    chat_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM chat_participants WHERE chat_id = ? AND user_id = ?",
    )
    .bind(chat_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row.is_some())
}

/// Mark every non-deleted message in the chat not sent by `reader` as read by
/// `reader`. Safe to call any number of times.
pub async fn mark_chat_read(
    db: &SqlitePool,
    chat_id: &str,
    reader_id: &str,
) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
        SELECT m.id, ?, ?
        FROM messages m
        WHERE m.chat_id = ? AND m.sender_id != ? AND m.is_deleted = 0
        "#,
    )
    .bind(reader_id)
    .bind(&now)
    .bind(chat_id)
    .bind(reader_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Count of non-deleted messages in the chat that `user_id` did not send and
/// has not read
pub async fn unread_count(
    db: &SqlitePool,
    chat_id: &str,
    user_id: &str,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM messages m
        WHERE m.chat_id = ?
          AND m.sender_id != ?
          AND m.is_deleted = 0
          AND NOT EXISTS (
              SELECT 1 FROM message_reads r WHERE r.message_id = m.id AND r.user_id = ?
          )
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// The most recent non-deleted message in the chat, with sender display fields
pub async fn latest_message(
    db: &SqlitePool,
    chat_id: &str,
) -> Result<Option<MessageWithSender>, sqlx::Error> {
    sqlx::query_as::<_, MessageWithSender>(
        r#"
        SELECT m.id, m.chat_id, m.sender_id,
               u.name AS sender_name, u.avatar AS sender_avatar, u.role AS sender_role,
               m.content, m.created_at
        FROM messages m
        INNER JOIN users u ON u.id = m.sender_id
        WHERE m.chat_id = ? AND m.is_deleted = 0
        ORDER BY m.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(chat_id)
    .fetch_optional(db)
    .await
}

/// Bump the chat's recency marker so chat lists order by latest activity
pub async fn touch_chat(db: &SqlitePool, chat_id: &str) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(chat_id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn seed_user(pool: &SqlitePool, id: &str, role: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, avatar, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 'x', ?, '', 1, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("User {}", id))
        .bind(format!("{}@example.com", id))
        .bind(role)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_chat(pool: &SqlitePool, id: &str, chat_type: &str, participants: &[&str]) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO chats (id, chat_type, created_by, is_active, created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(chat_type)
        .bind(participants[0])
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        for user in participants {
            sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    async fn seed_message(pool: &SqlitePool, id: &str, chat_id: &str, sender: &str, content: &str) {
        // Distinct timestamps keep ordering deterministic
        let at = format!("2026-03-01T10:00:{:0>2}Z", id.len() % 60);
        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, content, is_deleted, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(id)
        .bind(chat_id)
        .bind(sender)
        .bind(content)
        .bind(&at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_private_chat_lookup_matches_exact_pair() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_user(&pool, "t2", "teacher").await;

        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;
        seed_chat(&pool, "chat2", "private", &["s1", "t2"]).await;

        let found = find_private_chat(&pool, "s1", "t1").await.unwrap();
        assert_eq!(found.unwrap().id, "chat1");

        // Order of the pair does not matter
        let found = find_private_chat(&pool, "t1", "s1").await.unwrap();
        assert_eq!(found.unwrap().id, "chat1");

        // No chat between these two yet
        let found = find_private_chat(&pool, "t1", "t2").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_soft_deleted_private_chat_is_not_found() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;

        sqlx::query("UPDATE chats SET is_active = 0 WHERE id = 'chat1'")
            .execute(&pool)
            .await
            .unwrap();

        let found = find_private_chat(&pool, "s1", "t1").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;

        seed_message(&pool, "m1", "chat1", "s1", "hello").await;
        seed_message(&pool, "m02", "chat1", "s1", "anyone there?").await;

        let first = mark_chat_read(&pool, "chat1", "t1").await.unwrap();
        assert_eq!(first, 2);

        // Second pass inserts nothing and changes nothing
        let second = mark_chat_read(&pool, "chat1", "t1").await.unwrap();
        assert_eq!(second, 0);

        let (receipts,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM message_reads WHERE user_id = 't1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(receipts, 2);
    }

    #[tokio::test]
    async fn test_unread_count_flow() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;

        seed_message(&pool, "m1", "chat1", "s1", "question about homework").await;

        // The sender never counts their own message as unread
        assert_eq!(unread_count(&pool, "chat1", "s1").await.unwrap(), 0);
        assert_eq!(unread_count(&pool, "chat1", "t1").await.unwrap(), 1);

        mark_chat_read(&pool, "chat1", "t1").await.unwrap();
        assert_eq!(unread_count(&pool, "chat1", "t1").await.unwrap(), 0);
        assert_eq!(unread_count(&pool, "chat1", "s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleted_messages_do_not_count_as_unread() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;

        seed_message(&pool, "m1", "chat1", "s1", "first").await;
        seed_message(&pool, "m02", "chat1", "s1", "second").await;
        sqlx::query("UPDATE messages SET is_deleted = 1 WHERE id = 'm02'")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(unread_count(&pool, "chat1", "t1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_message_skips_deleted() {
        let pool = db::init_memory().await.unwrap();
        seed_user(&pool, "s1", "student").await;
        seed_user(&pool, "t1", "teacher").await;
        seed_chat(&pool, "chat1", "private", &["s1", "t1"]).await;

        seed_message(&pool, "m1", "chat1", "s1", "first").await;
        seed_message(&pool, "m002", "chat1", "t1", "latest").await;
        sqlx::query("UPDATE messages SET is_deleted = 1 WHERE id = 'm002'")
            .execute(&pool)
            .await
            .unwrap();

        let latest = latest_message(&pool, "chat1").await.unwrap().unwrap();
        assert_eq!(latest.id, "m1");
        assert_eq!(latest.sender_name, "User s1");
    }
}
