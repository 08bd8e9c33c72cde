//! Role- and ownership-based access decisions.
//!
//! Pure functions over rows the caller has already fetched; nothing here
//! touches the database. Handlers resolve the resource first (missing ids
//! surface as not-found before any rule runs) and then ask these functions
//! whether the operation is allowed. Every denial maps to the same uniform
//! forbidden error.

mod view;

pub use view::{project_user, PublicUser, RedactedUser, UserView};

use crate::db::{Chat, Class, User, UserRole};

/// Read access to a class: admins see everything, teachers their own
/// classes, students the classes on whose roster they appear.
pub fn can_view_class(actor: &User, class: &Class, roster: &[String]) -> bool {
    match actor.role_enum() {
        UserRole::Admin => true,
        UserRole::Teacher => class.teacher_id == actor.id,
        UserRole::Student => roster.iter().any(|id| id == &actor.id),
    }
}

/// Write access to a class (schedule, status, roster, deletion): the owning
/// teacher or an admin. Students never mutate a class directly; their only
/// write path is the self-enrolling join.
pub fn can_modify_class(actor: &User, class: &Class) -> bool {
    match actor.role_enum() {
        UserRole::Admin => true,
        UserRole::Teacher => class.teacher_id == actor.id,
        UserRole::Student => false,
    }
}

pub fn can_join_class(actor: &User) -> bool {
    actor.role_enum().is_student()
}

/// Chat reads and writes share one rule: admins always, everyone else only
/// where they participate. Messages inherit this from their chat.
pub fn can_access_chat(actor: &User, participant_ids: &[String]) -> bool {
    actor.role_enum().is_admin() || participant_ids.iter().any(|id| id == &actor.id)
}

pub fn can_create_group_chat(actor: &User) -> bool {
    actor.role_enum().is_admin()
}

/// Soft-deleting a chat: admin, or whoever created it
pub fn can_delete_chat(actor: &User, chat: &Chat) -> bool {
    actor.role_enum().is_admin() || chat.created_by.as_deref() == Some(actor.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            phone: None,
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

    fn class_owned_by(teacher_id: &str) -> Class {
        Class {
            id: "c1".to_string(),
            title: "Physics".to_string(),
            description: None,
            teacher_id: teacher_id.to_string(),
            scheduled_time: "2026-03-10T15:00:00Z".to_string(),
            duration_minutes: 60,
            status: "scheduled".to_string(),
            meeting_room: "class-1-abcdefg".to_string(),
            meeting_link: "https://meet.jit.si/class-1-abcdefg".to_string(),
            created_at: "2026-03-01T00:00:00Z".to_string(),
            updated_at: "2026-03-01T00:00:00Z".to_string(),
        }
    }

    fn chat_created_by(creator: &str) -> Chat {
        Chat {
            id: "chat1".to_string(),
            name: None,
            chat_type: "group".to_string(),
            created_by: Some(creator.to_string()),
            is_active: 1,
            created_at: "2026-03-01T00:00:00Z".to_string(),
            updated_at: "2026-03-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_class_read_rules() {
        let class = class_owned_by("t1");
        let roster = vec!["s1".to_string()];

        assert!(can_view_class(&user("a1", "admin"), &class, &roster));
        assert!(can_view_class(&user("t1", "teacher"), &class, &roster));
        assert!(!can_view_class(&user("t2", "teacher"), &class, &roster));
        assert!(can_view_class(&user("s1", "student"), &class, &roster));
        assert!(!can_view_class(&user("s2", "student"), &class, &roster));
    }

    #[test]
    fn test_class_write_rules() {
        let class = class_owned_by("t1");

        assert!(can_modify_class(&user("a1", "admin"), &class));
        assert!(can_modify_class(&user("t1", "teacher"), &class));
        assert!(!can_modify_class(&user("t2", "teacher"), &class));
        // Students on the roster still may not change schedule or status
        assert!(!can_modify_class(&user("s1", "student"), &class));
    }

    #[test]
    fn test_only_students_join() {
        assert!(can_join_class(&user("s1", "student")));
        assert!(!can_join_class(&user("t1", "teacher")));
        assert!(!can_join_class(&user("a1", "admin")));
    }

    #[test]
    fn test_chat_access_rules() {
        let participants = vec!["s1".to_string(), "t1".to_string()];

        assert!(can_access_chat(&user("a1", "admin"), &participants));
        assert!(can_access_chat(&user("s1", "student"), &participants));
        assert!(can_access_chat(&user("t1", "teacher"), &participants));
        assert!(!can_access_chat(&user("s2", "student"), &participants));
    }

    #[test]
    fn test_group_chat_creation_is_admin_only() {
        assert!(can_create_group_chat(&user("a1", "admin")));
        assert!(!can_create_group_chat(&user("t1", "teacher")));
        assert!(!can_create_group_chat(&user("s1", "student")));
    }

    #[test]
    fn test_chat_deletion_rules() {
        let chat = chat_created_by("t1");

        assert!(can_delete_chat(&user("a1", "admin"), &chat));
        assert!(can_delete_chat(&user("t1", "teacher"), &chat));
        assert!(!can_delete_chat(&user("s1", "student"), &chat));

        let orphaned = Chat {
            created_by: None,
            ..chat
        };
        assert!(can_delete_chat(&user("a1", "admin"), &orphaned));
        assert!(!can_delete_chat(&user("t1", "teacher"), &orphaned));
    }
}
