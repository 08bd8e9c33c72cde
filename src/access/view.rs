//! Typed user projections per (viewer, subject) pairing.
//!
//! Each view is its own struct listing exactly the fields it carries, so a
//! response can never leak a field by forgetting to strip it from a full
//! record.

use serde::{Deserialize, Serialize};

use crate::db::{EnrolledSubject, User, UserProfile, UserRole};

/// Student record as seen by a teacher: the full profile minus the contact
/// fields (`email`, `phone`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactedUser {
    pub id: String,
    pub name: String,
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
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for RedactedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            avatar: user.avatar.clone(),
            is_active: user.is_active != 0,
            grade: user.grade.clone(),
            school: user.school.clone(),
            father_name: user.father_name.clone(),
            father_contact: user.father_contact.clone(),
            mother_name: user.mother_name.clone(),
            mother_contact: user.mother_contact.clone(),
            enrolled_subjects: user.enrolled_subjects(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// Directory entry visible to students: display fields only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub role: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            role: user.role.clone(),
        }
    }
}

/// A user record projected for a particular viewer
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Full(UserProfile),
    Redacted(RedactedUser),
    Public(PublicUser),
}

/// Choose the projection of `subject` appropriate for `viewer`.
///
/// Admins and self-views get the full record. A teacher looking at a student
/// gets the redacted view; any other record a teacher looks at is full.
/// Students see display fields only for anyone but themselves.
pub fn project_user(viewer: &User, subject: &User) -> UserView {
    if viewer.id == subject.id || viewer.role_enum().is_admin() {
        return UserView::Full(UserProfile::from(subject.clone()));
    }

    match viewer.role_enum() {
        UserRole::Teacher => {
            if subject.role_enum().is_student() {
                UserView::Redacted(RedactedUser::from(subject))
            } else {
                UserView::Full(UserProfile::from(subject.clone()))
            }
        }
        UserRole::Student => UserView::Public(PublicUser::from(subject)),
        UserRole::Admin => UserView::Full(UserProfile::from(subject.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            phone: Some("555-0100".to_string()),
            password_hash: "hash".to_string(),
            role: role.to_string(),
            avatar: String::new(),
            is_active: 1,
            grade: Some("10".to_string()),
            school: None,
            father_name: None,
            father_contact: Some("555-0199".to_string()),
            mother_name: None,
            mother_contact: None,
            enrolled_subjects: None,
            specialization: None,
            qualification: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn fields(view: &UserView) -> serde_json::Value {
        serde_json::to_value(view).unwrap()
    }

    #[test]
    fn test_teacher_viewing_student_has_no_contact_fields() {
        let json = fields(&project_user(&user("t1", "teacher"), &user("s1", "student")));
        assert!(json.get("email").is_none());
        assert!(json.get("phone").is_none());
        // Non-contact student data stays visible
        assert_eq!(json["grade"], "10");
        assert_eq!(json["name"], "User s1");
    }

    #[test]
    fn test_admin_and_self_views_are_unrestricted() {
        let student = user("s1", "student");

        let json = fields(&project_user(&user("a1", "admin"), &student));
        assert_eq!(json["email"], "s1@example.com");
        assert_eq!(json["phone"], "555-0100");

        let json = fields(&project_user(&student, &student));
        assert_eq!(json["email"], "s1@example.com");
    }

    #[test]
    fn test_student_viewing_others_gets_display_fields_only() {
        let json = fields(&project_user(&user("s1", "student"), &user("t1", "teacher")));
        assert_eq!(json["name"], "User t1");
        assert_eq!(json["role"], "teacher");
        assert!(json.get("email").is_none());
        assert!(json.get("phone").is_none());
        assert!(json.get("grade").is_none());
        assert!(json.get("father_contact").is_none());
    }

    #[test]
    fn test_teacher_viewing_teacher_is_full() {
        let json = fields(&project_user(&user("t1", "teacher"), &user("t2", "teacher")));
        assert_eq!(json["email"], "t2@example.com");
    }

    #[test]
    fn test_no_view_carries_the_password_hash() {
        for viewer_role in ["admin", "teacher", "student"] {
            let json = fields(&project_user(&user("v", viewer_role), &user("s1", "student")));
            assert!(json.get("password_hash").is_none());
        }
    }
}
