use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LaunchpadError;

// --- Identifiers ---

/// Store-assigned record identifier. Stable within one store, never used to
/// match upstream data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to an account by its external identity (`uid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(pub String);

impl AccountRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// --- Entity kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Event,
    Person,
    Vehicle,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Person, EntityKind::Vehicle, EntityKind::Event];

    /// Collection / route segment for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Event => "events",
            EntityKind::Person => "people",
            EntityKind::Vehicle => "vehicles",
        }
    }

    /// Number of keywords a record of this kind must carry to count as enriched.
    pub fn keyword_target(&self) -> usize {
        match self {
            EntityKind::Event => 10,
            EntityKind::Person => 6,
            EntityKind::Vehicle => 10,
        }
    }

    /// Only events carry interest counters and comment threads.
    pub fn has_social_state(&self) -> bool {
        matches!(self, EntityKind::Event)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Event => write!(f, "event"),
            EntityKind::Person => write!(f, "person"),
            EntityKind::Vehicle => write!(f, "vehicle"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" | "events" => Ok(EntityKind::Event),
            "person" | "people" | "astronaut" | "astronauts" => Ok(EntityKind::Person),
            "vehicle" | "vehicles" | "spacecraft" | "spacecrafts" => Ok(EntityKind::Vehicle),
            other => Err(LaunchpadError::NotFound(format!("entity kind '{other}'"))),
        }
    }
}

// --- Document field names ---

/// Field names as they appear in stored documents. Shared by the reconciler
/// and the social mutator so field-scoped updates address the same paths.
pub mod fields {
    pub const RECORD_ID: &str = "_id";
    pub const EXTERNAL_ID: &str = "externalId";
    pub const KIND: &str = "kind";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const OCCURS_AT: &str = "occursAt";
    pub const METADATA: &str = "metadata";
    pub const SYNCED_AT: &str = "syncedAt";
    pub const DETAILED_INFO: &str = "detailedInfo";
    pub const KEYWORDS: &str = "keywords";
    pub const INTEREST_COUNT: &str = "interestCount";
    pub const INTERESTED_BY: &str = "interestedBy";
    pub const COMMENTS: &str = "comments";
    pub const REPLIES: &str = "replies";
    pub const LIKED_BY: &str = "likedBy";
    pub const UUID: &str = "uuid";
    pub const THREAD_UUIDS: &str = "threadUuids";

    pub const UID: &str = "uid";
    pub const SAVED_EVENT_REFS: &str = "savedEventRefs";
    pub const LIKED_COMMENTS: &str = "likedComments";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
}

// --- Upstream ---

/// One entity as delivered by the upstream feed, normalized across kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub occurs_at: Option<DateTime<Utc>>,
    /// Full upstream object, kept verbatim.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Paging parameters for one upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub limit: u32,
    pub offset: u32,
}

// --- Persisted entities ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(rename = "_id")]
    pub record_id: RecordId,
    pub external_id: String,
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occurs_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub synced_at: DateTime<Utc>,

    #[serde(default)]
    pub detailed_info: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub interest_count: u64,
    #[serde(default)]
    pub interested_by: Vec<AccountRef>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Every comment and reply uuid ever assigned on this event, deleted
    /// ones included. Identifiers in here are never handed out again.
    #[serde(default)]
    pub thread_uuids: Vec<String>,
}

impl EntityRecord {
    /// Derived fields present and keyword count matching the kind's target.
    pub fn is_enriched(&self) -> bool {
        let has_info = self
            .detailed_info
            .as_deref()
            .is_some_and(|info| !info.trim().is_empty());
        has_info && self.keywords.len() == self.kind.keyword_target()
    }

    pub fn is_interested(&self, account: &AccountRef) -> bool {
        self.interested_by.contains(account)
    }

    pub fn comment(&self, uuid: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.uuid == uuid)
    }

    /// Whether `uuid` was ever used by a comment or reply on this event.
    pub fn uuid_taken(&self, uuid: &str) -> bool {
        self.thread_uuids.iter().any(|u| u == uuid)
            || self.comment(uuid).is_some()
            || self.find_reply(uuid).is_some()
    }

    /// Linear scan of every comment's replies. Returns the parent comment with the reply.
    pub fn find_reply(&self, reply_uuid: &str) -> Option<(&Comment, &Reply)> {
        self.comments.iter().find_map(|comment| {
            comment
                .replies
                .iter()
                .find(|r| r.uuid == reply_uuid)
                .map(|reply| (comment, reply))
        })
    }
}

/// Existing records of one kind keyed by external id.
pub type ExistingRecords = HashMap<String, EntityRecord>;

// --- Comments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub uuid: String,
    pub author_ref: AccountRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub liked_by: Vec<AccountRef>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Comment {
    pub fn reply(&self, uuid: &str) -> Option<&Reply> {
        self.replies.iter().find(|r| r.uuid == uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub uuid: String,
    pub parent_comment_uuid: String,
    pub author_ref: AccountRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub liked_by: Vec<AccountRef>,
}

// --- Accounts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub record_id: RecordId,
    pub uid: AccountRef,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub saved_event_refs: Vec<RecordId>,
    /// Denormalized mirror of the comment/reply likes this account holds.
    /// Written best-effort; may drift from the event documents.
    #[serde(default)]
    pub liked_comments: Vec<CommentLike>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLike {
    pub event_ref: RecordId,
    pub comment_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_uuid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(keywords: usize, info: Option<&str>) -> EntityRecord {
        EntityRecord {
            record_id: RecordId::from("r1"),
            external_id: "evt-1".into(),
            kind: EntityKind::Event,
            name: "Launch X".into(),
            description: None,
            occurs_at: None,
            metadata: serde_json::Value::Null,
            synced_at: Utc::now(),
            detailed_info: info.map(String::from),
            keywords: (0..keywords).map(|i| format!("k{i}")).collect(),
            interest_count: 0,
            interested_by: vec![],
            comments: vec![],
            thread_uuids: vec![],
        }
    }

    #[test]
    fn enriched_requires_info_and_exact_keyword_count() {
        assert!(event(10, Some("summary")).is_enriched());
        assert!(!event(9, Some("summary")).is_enriched());
        assert!(!event(11, Some("summary")).is_enriched());
        assert!(!event(10, None).is_enriched());
        assert!(!event(10, Some("   ")).is_enriched());
    }

    #[test]
    fn kind_parses_collection_and_legacy_names() {
        assert_eq!("events".parse::<EntityKind>().unwrap(), EntityKind::Event);
        assert_eq!("astronauts".parse::<EntityKind>().unwrap(), EntityKind::Person);
        assert_eq!("Spacecraft".parse::<EntityKind>().unwrap(), EntityKind::Vehicle);
        assert!("rockets".parse::<EntityKind>().is_err());
    }

    #[test]
    fn record_serializes_store_field_names() {
        let json = serde_json::to_value(event(0, None)).unwrap();
        assert_eq!(json[fields::RECORD_ID], "r1");
        assert_eq!(json[fields::EXTERNAL_ID], "evt-1");
        assert_eq!(json[fields::INTEREST_COUNT], 0);
        assert!(json[fields::INTERESTED_BY].as_array().unwrap().is_empty());
    }

    #[test]
    fn missing_social_fields_default_on_read() {
        let json = serde_json::json!({
            "_id": "r2",
            "externalId": "p-1",
            "kind": "person",
            "name": "Ada",
            "syncedAt": "2026-01-01T00:00:00Z"
        });
        let record: EntityRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.interest_count, 0);
        assert!(record.comments.is_empty());
        assert!(record.detailed_info.is_none());
    }

    #[test]
    fn find_reply_scans_all_comments() {
        let mut record = event(0, None);
        let now = Utc::now();
        for (c, r) in [("c1", "r1"), ("c2", "r2")] {
            record.comments.push(Comment {
                uuid: c.into(),
                author_ref: "u".into(),
                content: "hi".into(),
                created_at: now,
                liked_by: vec![],
                replies: vec![Reply {
                    uuid: r.into(),
                    parent_comment_uuid: c.into(),
                    author_ref: "u".into(),
                    content: "yo".into(),
                    created_at: now,
                    liked_by: vec![],
                }],
            });
        }
        let (parent, reply) = record.find_reply("r2").unwrap();
        assert_eq!(parent.uuid, "c2");
        assert_eq!(reply.uuid, "r2");
        assert!(record.find_reply("r9").is_none());

        assert!(record.uuid_taken("c1"));
        assert!(record.uuid_taken("r2"));
        assert!(!record.uuid_taken("c9"));
        record.thread_uuids.push("c9".into());
        assert!(record.uuid_taken("c9"));
    }
}
