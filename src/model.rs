//! Data model shared across the studylink services
//!
//! Wire documents use camelCase field names; everything here (de)serializes
//! through `serde_json::Value` at the store boundary.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tutor-student connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Created by the student, awaiting the tutor's decision
    Pending,
    /// Accepted by the tutor
    Accepted,
}

/// A (student, tutor) connection document
///
/// Stored at `connections/{studentId}_{tutorId}`; the composite id makes the
/// connect upsert idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub student_id: String,
    pub tutor_id: String,
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<String>,
}

/// Per-user chat roster shortcut, written on both sides when a connection is
/// accepted so each party sees the other before any message exists.
///
/// A cache, not source of truth: [`Connection`] is authoritative for whether
/// the relationship exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatIndexEntry {
    pub owner_id: String,
    pub peer_id: String,
    pub peer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
}

/// Status of a roster entry as shown to the actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterStatus {
    Accepted,
    Pending,
}

/// Derived, in-memory roster row; rebuilt from scratch on every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Peer user id
    pub id: String,
    /// Resolved display name, falling back to the raw id
    pub name: String,
    pub status: RosterStatus,
}

/// Which side of the relationship the current actor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Tutor,
    Student,
}

impl ActorRole {
    /// Connection field holding the actor's own id for this role
    pub(crate) fn own_field(self) -> &'static str {
        match self {
            ActorRole::Tutor => "tutorId",
            ActorRole::Student => "studentId",
        }
    }

    /// Connection field holding the peer's id for this role
    pub(crate) fn peer_field(self) -> &'static str {
        match self {
            ActorRole::Tutor => "studentId",
            ActorRole::Student => "tutorId",
        }
    }
}

/// A shared resource or video document
///
/// The count fields are denormalized hints maintained by atomic increments;
/// for display the comments sub-list size is the ground truth (see
/// [`crate::feed::FeedService`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub owner_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub report_count: i64,
    /// Storage path of the attached binary, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A resource enriched with uploader identity and per-viewer state
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAggregate {
    pub id: String,
    pub resource: Resource,
    /// Uploader display name, falling back to the raw owner id
    pub owner_name: String,
    /// Recomputed from the comments sub-list, never trusted from the counter
    pub comment_count: usize,
    pub user_liked: bool,
    pub user_commented: bool,
    pub user_reported: bool,
}

/// One comment on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Per-(resource, user) report marker; existence toggles the reported flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub reporter_id: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One student's rating of a tutor, 1 to 5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub tutor_id: String,
    pub student_id: String,
    pub value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Mean and count over all rating documents of a tutor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}
