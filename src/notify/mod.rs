//! Derived notifications and cache reconciliation.
//!
//! Notifications are never persisted server-side. Each one is synthesized
//! from the messaging store (unread counts) or the class registry (imminent
//! start times) under a stable string key, so a client-held cache can be
//! merged with a fresh derivation at any time. Losing the cache loses read
//! flags and nothing else.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::db::Class;

/// Classes starting within this window produce a notification
pub const CLASS_LOOKAHEAD_MINUTES: i64 = 60;
/// Cache entries older than this are dropped during reconciliation
pub const CACHE_RETENTION_DAYS: i64 = 7;

const SNIPPET_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Class,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Stable key: `chat-<chatId>` or `class-<classId>`
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
}

/// Notification for a chat with unread messages, carrying the sender and a
/// snippet of the latest one
pub fn message_notification(
    chat_id: &str,
    sender_name: &str,
    content: &str,
    created_at: &str,
) -> Notification {
    Notification {
        id: format!("chat-{}", chat_id),
        kind: NotificationKind::Message,
        title: "New Message".to_string(),
        body: format!("{}: {}", sender_name, snippet(content)),
        chat_id: Some(chat_id.to_string()),
        class_id: None,
        created_at: created_at.to_string(),
        read: false,
    }
}

/// Notification for a class starting within the lookahead window. Returns
/// `None` once the class has started or while it is still too far out.
pub fn class_notification(class: &Class, now: DateTime<Utc>) -> Option<Notification> {
    let scheduled = class.scheduled_at()?;
    let horizon = now + Duration::minutes(CLASS_LOOKAHEAD_MINUTES);

    if scheduled <= now || scheduled > horizon {
        return None;
    }

    let minutes_until = (scheduled - now).num_minutes();
    Some(Notification {
        id: format!("class-{}", class.id),
        kind: NotificationKind::Class,
        title: "Upcoming Class".to_string(),
        body: format!(
            "Class \"{}\" starts in {} minutes",
            class.title, minutes_until
        ),
        chat_id: None,
        class_id: Some(class.id.clone()),
        created_at: now.to_rfc3339(),
        read: false,
    })
}

/// Merge a previously cached notification set with a freshly derived one.
///
/// A key present in both keeps the cached `read` flag. A cached entry whose
/// source condition has cleared survives only while unread. Entries older
/// than the retention window are dropped regardless. Result is newest-first.
pub fn reconcile(
    previous: Vec<Notification>,
    fresh: Vec<Notification>,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let cached_read: HashMap<&str, bool> =
        previous.iter().map(|n| (n.id.as_str(), n.read)).collect();
    let fresh_keys: HashSet<String> = fresh.iter().map(|n| n.id.clone()).collect();

    let mut merged: Vec<Notification> = Vec::with_capacity(fresh.len() + previous.len());
    for mut item in fresh {
        if let Some(&read) = cached_read.get(item.id.as_str()) {
            item.read = read;
        }
        merged.push(item);
    }

    for item in previous {
        if !fresh_keys.contains(&item.id) && !item.read {
            merged.push(item);
        }
    }

    let cutoff = now - Duration::days(CACHE_RETENTION_DAYS);
    merged.retain(|n| matches!(parse_time(&n.created_at), Some(t) if t > cutoff));

    merged.sort_by(|a, b| parse_time(&b.created_at).cmp(&parse_time(&a.created_at)));
    merged
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_MAX_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(SNIPPET_MAX_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_at(id: &str, scheduled: DateTime<Utc>) -> Class {
        Class {
            id: id.to_string(),
            title: "Algebra Review".to_string(),
            description: None,
            teacher_id: "t1".to_string(),
            scheduled_time: scheduled.to_rfc3339(),
            duration_minutes: 60,
            status: "scheduled".to_string(),
            meeting_room: format!("class-1-{}", id),
            meeting_link: format!("https://meet.jit.si/class-1-{}", id),
            created_at: scheduled.to_rfc3339(),
            updated_at: scheduled.to_rfc3339(),
        }
    }

    fn cached(id: &str, created_at: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::Message,
            title: "New Message".to_string(),
            body: "someone: hi".to_string(),
            chat_id: Some(id.trim_start_matches("chat-").to_string()),
            class_id: None,
            created_at: created_at.to_string(),
            read,
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-10T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_class_notification_window() {
        let now = now();

        // 20 minutes out: derivable, with minutes-until-start in the body
        let soon = class_at("c1", now + Duration::minutes(20));
        let notif = class_notification(&soon, now).unwrap();
        assert_eq!(notif.id, "class-c1");
        assert_eq!(notif.body, "Class \"Algebra Review\" starts in 20 minutes");

        // Exactly at the horizon still notifies
        let horizon = class_at("c2", now + Duration::minutes(60));
        assert!(class_notification(&horizon, now).is_some());

        // Beyond the horizon, already started, or in the past: nothing
        let far = class_at("c3", now + Duration::minutes(61));
        assert!(class_notification(&far, now).is_none());
        let started = class_at("c4", now);
        assert!(class_notification(&started, now).is_none());
        let past = class_at("c5", now - Duration::minutes(5));
        assert!(class_notification(&past, now).is_none());
    }

    #[test]
    fn test_scenario_thirty_minutes_out() {
        // Class scheduled 30 minutes after creation; checked 10 minutes in
        let created = now();
        let class = class_at("c1", created + Duration::minutes(30));
        let notif = class_notification(&class, created + Duration::minutes(10)).unwrap();
        assert!(notif.body.contains("starts in 20 minutes"));
    }

    #[test]
    fn test_message_notification_key_and_snippet() {
        let notif = message_notification("abc", "Sana", "see you tomorrow", "2026-03-10T11:59:00Z");
        assert_eq!(notif.id, "chat-abc");
        assert_eq!(notif.body, "Sana: see you tomorrow");
        assert!(!notif.read);

        let long = "x".repeat(200);
        let notif = message_notification("abc", "Sana", &long, "2026-03-10T11:59:00Z");
        assert!(notif.body.ends_with("..."));
        assert!(notif.body.len() < 200);
    }

    #[test]
    fn test_reconcile_preserves_read_flags() {
        let previous = vec![cached("chat-1", "2026-03-10T11:00:00Z", true)];
        let fresh = vec![cached("chat-1", "2026-03-10T11:30:00Z", false)];

        let merged = reconcile(previous, fresh, now());
        assert_eq!(merged.len(), 1);
        assert!(merged[0].read);
        // The fresh payload wins; only the read flag carries over
        assert_eq!(merged[0].created_at, "2026-03-10T11:30:00Z");
    }

    #[test]
    fn test_reconcile_keeps_unread_entries_after_condition_clears() {
        let previous = vec![
            cached("chat-1", "2026-03-10T11:00:00Z", false),
            cached("chat-2", "2026-03-10T11:00:00Z", true),
        ];

        let merged = reconcile(previous, Vec::new(), now());
        // The unread entry survives; the read one disappears once resolved
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "chat-1");
    }

    #[test]
    fn test_reconcile_expires_old_entries() {
        let previous = vec![
            cached("chat-old", "2026-03-01T11:00:00Z", false),
            cached("chat-new", "2026-03-09T11:00:00Z", false),
        ];

        let merged = reconcile(previous, Vec::new(), now());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "chat-new");
    }

    #[test]
    fn test_reconcile_orders_newest_first() {
        let fresh = vec![
            cached("chat-1", "2026-03-10T09:00:00Z", false),
            cached("chat-2", "2026-03-10T11:00:00Z", false),
            cached("chat-3", "2026-03-10T10:00:00Z", false),
        ];

        let merged = reconcile(Vec::new(), fresh, now());
        let ids: Vec<&str> = merged.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["chat-2", "chat-3", "chat-1"]);
    }

    #[test]
    fn test_reconcile_from_nothing() {
        let fresh = vec![cached("chat-1", "2026-03-10T11:00:00Z", false)];
        let merged = reconcile(Vec::new(), fresh, now());
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].read);
    }

    #[test]
    fn test_reconcile_drops_unparseable_timestamps() {
        let previous = vec![cached("chat-bad", "garbage", false)];
        let merged = reconcile(previous, Vec::new(), now());
        assert!(merged.is_empty());
    }
}
