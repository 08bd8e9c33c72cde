//! User and session models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Platform roles. A user's role is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self, UserRole::Teacher)
    }

    pub fn is_student(&self) -> bool {
        matches!(self, UserRole::Student)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Teacher => write!(f, "teacher"),
            UserRole::Student => write!(f, "student"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(UserRole::Student)
    }
}

/// A subject a student is enrolled in, with booked class count and fees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrolledSubject {
    pub subject: String,
    #[serde(default)]
    pub classes: i64,
    #[serde(default)]
    pub fees: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub avatar: String,
    pub is_active: i32,
    // Student fields
    pub grade: Option<String>,
    pub school: Option<String>,
    pub father_name: Option<String>,
    pub father_contact: Option<String>,
    pub mother_name: Option<String>,
    pub mother_contact: Option<String>,
    /// JSON-serialized list of [`EnrolledSubject`]
    pub enrolled_subjects: Option<String>,
    // Teacher fields
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> UserRole {
        self.role.clone().into()
    }

    pub fn is_enabled(&self) -> bool {
        self.is_active != 0
    }

    pub fn enrolled_subjects(&self) -> Vec<EnrolledSubject> {
        self.enrolled_subjects
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Full user view: everything except the password hash. Returned for
/// self-views and admin views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub avatar: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_contact: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub enrolled_subjects: Vec<EnrolledSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let enrolled = user.enrolled_subjects();
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            avatar: user.avatar,
            is_active: user.is_active != 0,
            grade: user.grade,
            school: user.school,
            father_name: user.father_name,
            father_contact: user.father_contact,
            mother_name: user.mother_name,
            mother_contact: user.mother_contact,
            enrolled_subjects: enrolled,
            specialization: user.specialization,
            qualification: user.qualification,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    /// "teacher" or "student"; admin accounts are never self-registered
    pub role: Option<String>,
}

/// Admin-created teacher or student account
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    // Student fields
    pub grade: Option<String>,
    pub school: Option<String>,
    pub father_name: Option<String>,
    pub father_contact: Option<String>,
    pub mother_name: Option<String>,
    pub mother_contact: Option<String>,
    pub enrolled_subjects: Option<Vec<EnrolledSubject>>,
    // Teacher fields
    pub specialization: Option<String>,
    pub qualification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: &str) -> User {
        User {
            id: "u1".to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            phone: Some("12345".to_string()),
            password_hash: "hash".to_string(),
            role: role.to_string(),
            avatar: String::new(),
            is_active: 1,
            grade: None,
            school: None,
            father_name: None,
            father_contact: None,
            mother_name: None,
            mother_contact: None,
            enrolled_subjects: None,
            specialization: None,
            qualification: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("Teacher".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert_eq!("student".parse::<UserRole>().unwrap(), UserRole::Student);
        assert!("principal".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_unknown_role_defaults_to_student() {
        let mut user = sample_user("something-else");
        user.role = "something-else".to_string();
        assert_eq!(user.role_enum(), UserRole::Student);
    }

    #[test]
    fn test_enrolled_subjects_parsing() {
        let mut user = sample_user("student");
        user.enrolled_subjects =
            Some(r#"[{"subject":"Math","classes":8,"fees":120.0}]"#.to_string());

        let subjects = user.enrolled_subjects();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].subject, "Math");
        assert_eq!(subjects[0].classes, 8);
    }

    #[test]
    fn test_profile_never_exposes_password_hash() {
        let profile = UserProfile::from(sample_user("teacher"));
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "test@example.com");
    }
}
