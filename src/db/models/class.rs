//! Class models and the derived liveness computation.
//!
//! A class's persisted `status` is only ever changed by an explicit update
//! from the owning teacher or an admin. Whether a class is currently *live*
//! is derived from the clock on every read and never stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How long before the scheduled start a class opens for joining
pub const EARLY_JOIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl std::fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassStatus::Scheduled => write!(f, "scheduled"),
            ClassStatus::Ongoing => write!(f, "ongoing"),
            ClassStatus::Completed => write!(f, "completed"),
            ClassStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ClassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(ClassStatus::Scheduled),
            "ongoing" => Ok(ClassStatus::Ongoing),
            "completed" => Ok(ClassStatus::Completed),
            "cancelled" => Ok(ClassStatus::Cancelled),
            _ => Err(format!("Unknown class status: {}", s)),
        }
    }
}

impl From<String> for ClassStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ClassStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub teacher_id: String,
    pub scheduled_time: String,
    pub duration_minutes: i64,
    pub status: String,
    pub meeting_room: String,
    pub meeting_link: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Class {
    pub fn status_enum(&self) -> ClassStatus {
        self.status.clone().into()
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.scheduled_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether the class is live at `now`: status is neither completed nor
    /// cancelled, and `now` falls within the inclusive window
    /// `[scheduled_time - 5min, scheduled_time + duration]`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        if matches!(
            self.status_enum(),
            ClassStatus::Completed | ClassStatus::Cancelled
        ) {
            return false;
        }

        let Some(scheduled) = self.scheduled_at() else {
            return false;
        };

        let opens = scheduled - Duration::minutes(EARLY_JOIN_MINUTES);
        let ends = scheduled + Duration::minutes(self.duration_minutes);
        now >= opens && now <= ends
    }
}

/// Teacher info embedded in class responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassTeacher {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Roster entry embedded in class responses
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassStudent {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub teacher: ClassTeacher,
    pub students: Vec<ClassStudent>,
    pub scheduled_time: String,
    pub duration_minutes: i64,
    pub status: String,
    pub meeting_room: String,
    pub meeting_link: String,
    /// Derived from the clock at response time, never persisted
    pub is_live: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_time: String,
    pub duration_minutes: Option<i64>,
    pub student_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClassRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub status: Option<String>,
    pub student_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_at(scheduled: DateTime<Utc>, duration: i64, status: &str) -> Class {
        Class {
            id: "c1".to_string(),
            title: "Algebra".to_string(),
            description: None,
            teacher_id: "t1".to_string(),
            scheduled_time: scheduled.to_rfc3339(),
            duration_minutes: duration,
            status: status.to_string(),
            meeting_room: "class-1-abc".to_string(),
            meeting_link: "https://meet.jit.si/class-1-abc".to_string(),
            created_at: scheduled.to_rfc3339(),
            updated_at: scheduled.to_rfc3339(),
        }
    }

    #[test]
    fn test_live_window_boundaries() {
        let start = "2026-03-10T15:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let class = class_at(start, 60, "scheduled");

        // Opens exactly 5 minutes before the scheduled time
        assert!(class.is_live_at(start - Duration::minutes(5)));
        assert!(!class.is_live_at(start - Duration::minutes(5) - Duration::seconds(1)));

        // Closes exactly at scheduled + duration
        assert!(class.is_live_at(start + Duration::minutes(60)));
        assert!(!class.is_live_at(start + Duration::minutes(60) + Duration::seconds(1)));

        assert!(class.is_live_at(start));
    }

    #[test]
    fn test_terminal_status_is_never_live() {
        let start = "2026-03-10T15:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let completed = class_at(start, 60, "completed");
        assert!(!completed.is_live_at(start));

        let cancelled = class_at(start, 60, "cancelled");
        assert!(!cancelled.is_live_at(start));

        // Manually flagged ongoing still honours the window
        let ongoing = class_at(start, 60, "ongoing");
        assert!(ongoing.is_live_at(start + Duration::minutes(30)));
    }

    #[test]
    fn test_scenario_half_hour_out() {
        // Class scheduled 30 minutes from "now" with a 60 minute duration
        let now = "2026-03-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let class = class_at(now + Duration::minutes(30), 60, "scheduled");

        // 10 minutes in: still 20 minutes before the join window opens
        assert!(!class.is_live_at(now + Duration::minutes(10)));
        // One minute past the scheduled start: in progress
        assert!(class.is_live_at(now + Duration::minutes(31)));
        // 95 minutes in: five minutes past the end of the window
        assert!(!class.is_live_at(now + Duration::minutes(95)));
    }

    #[test]
    fn test_unparseable_time_is_not_live() {
        let start = "2026-03-10T15:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut class = class_at(start, 60, "scheduled");
        class.scheduled_time = "not-a-timestamp".to_string();
        assert!(!class.is_live_at(start));
    }
}
