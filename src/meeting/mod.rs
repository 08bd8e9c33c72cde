//! External meeting provider integration.
//!
//! The provider is an opaque collaborator: it accepts any room name and
//! implies a join URL under a configured base. We only generate a
//! collision-resistant room name once per class and never touch it again.

use rand::Rng;

const ROOM_SUFFIX_LEN: usize = 7;
const ROOM_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A freshly allocated meeting room with its join link
#[derive(Debug, Clone)]
pub struct MeetingRoom {
    pub room: String,
    pub link: String,
}

/// Allocate a room name from the creation timestamp plus a random base36
/// suffix, and derive its join link.
pub fn create_room(base_url: &str) -> MeetingRoom {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..ROOM_SUFFIX_LEN)
        .map(|_| ROOM_CHARS[rng.random_range(0..ROOM_CHARS.len())] as char)
        .collect();

    let room = format!("class-{}-{}", timestamp, suffix);
    let link = join_link(base_url, &room);
    MeetingRoom { room, link }
}

pub fn join_link(base_url: &str, room: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), room)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_shape() {
        let meeting = create_room("https://meet.jit.si");
        let parts: Vec<&str> = meeting.room.splitn(3, '-').collect();

        assert_eq!(parts[0], "class");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), ROOM_SUFFIX_LEN);
        assert!(parts[2]
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_rooms_are_distinct() {
        let a = create_room("https://meet.jit.si");
        let b = create_room("https://meet.jit.si");
        assert_ne!(a.room, b.room);
    }

    #[test]
    fn test_join_link_handles_trailing_slash() {
        assert_eq!(
            join_link("https://meet.jit.si/", "class-1-abc"),
            "https://meet.jit.si/class-1-abc"
        );
        assert_eq!(
            join_link("https://meet.example.org", "class-1-abc"),
            "https://meet.example.org/class-1-abc"
        );
    }
}
