//! Deterministic document paths
//!
//! Composite ids make the key writes idempotent: a connection always lives at
//! `connections/{studentId}_{tutorId}` and a chat roster shortcut at
//! `chat_index/{ownerId}_{peerId}`, so repeating an upsert can never create a
//! duplicate document.

/// User profile collection
pub const USERS: &str = "users";
/// Tutor-student connection collection
pub const CONNECTIONS: &str = "connections";
/// Per-user chat roster shortcut collection
pub const CHAT_INDEX: &str = "chat_index";
/// Shared resource/video collection
pub const RESOURCES: &str = "resources";

/// Composite connection id: `{studentId}_{tutorId}`
pub fn connection_id(student_id: &str, tutor_id: &str) -> String {
    format!("{student_id}_{tutor_id}")
}

/// Path of the connection document for a (student, tutor) pair
pub fn connection(student_id: &str, tutor_id: &str) -> String {
    format!("{CONNECTIONS}/{}", connection_id(student_id, tutor_id))
}

/// Path of a user profile document
pub fn profile(user_id: &str) -> String {
    format!("{USERS}/{user_id}")
}

/// Path of the chat roster shortcut `owner` keeps for `peer`
pub fn chat_entry(owner_id: &str, peer_id: &str) -> String {
    format!("{CHAT_INDEX}/{owner_id}_{peer_id}")
}

/// Path of a resource document
pub fn resource(resource_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}")
}

/// Likes sub-collection of a resource
pub fn resource_likes(resource_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/likes")
}

/// Per-viewer like marker; existence is the flag
pub fn like_marker(resource_id: &str, user_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/likes/{user_id}")
}

/// Comments sub-collection of a resource
pub fn resource_comments(resource_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/comments")
}

/// Path of one comment on a resource
pub fn comment(resource_id: &str, comment_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/comments/{comment_id}")
}

/// Reports sub-collection of a resource
pub fn resource_reports(resource_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/reports")
}

/// Per-viewer report marker; existence is the flag
pub fn report_marker(resource_id: &str, user_id: &str) -> String {
    format!("{RESOURCES}/{resource_id}/reports/{user_id}")
}

/// Ratings sub-collection of a tutor profile
pub fn tutor_ratings(tutor_id: &str) -> String {
    format!("{USERS}/{tutor_id}/ratings")
}

/// Path of one student's rating of a tutor
pub fn rating(tutor_id: &str, student_id: &str) -> String {
    format!("{USERS}/{tutor_id}/ratings/{student_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_ids_are_deterministic() {
        assert_eq!(connection("alice", "bob"), "connections/alice_bob");
        assert_eq!(connection("alice", "bob"), connection("alice", "bob"));
        // Direction matters: the student always comes first
        assert_ne!(connection("alice", "bob"), connection("bob", "alice"));
        assert_eq!(chat_entry("bob", "alice"), "chat_index/bob_alice");
    }

    #[test]
    fn test_marker_paths() {
        assert_eq!(like_marker("r1", "u1"), "resources/r1/likes/u1");
        assert_eq!(report_marker("r1", "u1"), "resources/r1/reports/u1");
        assert_eq!(rating("tutor", "student"), "users/tutor/ratings/student");
    }
}
