//! Wire records exchanged with the persistence service.
//!
//! All records use camelCase field names, matching what the web UI consumed.
//! The interesting one is [`MessageRecord`]: on the wire a message carries
//! two optional target fields (`recipientId`, `groupId`), and the fallible
//! conversion into the domain [`Message`] is the single place where the
//! exactly-one-of-two invariant is enforced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Message;
use crate::types::{ChatTarget, GroupId, MessageId, Role, UserId};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("Message {0} targets both a user and a group")]
    AmbiguousTarget(MessageId),

    #[error("Message {0} targets neither a user nor a group")]
    MissingTarget(MessageId),
}

// ---------------------------------------------------------------------------
// Message record
// ---------------------------------------------------------------------------

/// A message as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RecordError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let target = match (record.recipient_id, record.group_id) {
            (Some(user), None) => ChatTarget::User(user),
            (None, Some(group)) => ChatTarget::Group(group),
            (Some(_), Some(_)) => return Err(RecordError::AmbiguousTarget(record.id)),
            (None, None) => return Err(RecordError::MissingTarget(record.id)),
        };
        Ok(Message {
            id: record.id,
            sender: record.sender_id,
            target,
            body: record.body,
            created_at: record.created_at,
            read: record.read,
            edited: record.edited,
            deleted: record.deleted,
        })
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        let (recipient_id, group_id) = match message.target {
            ChatTarget::User(user) => (Some(user), None),
            ChatTarget::Group(group) => (None, Some(group)),
        };
        Self {
            id: message.id,
            sender_id: message.sender,
            recipient_id,
            group_id,
            body: message.body,
            created_at: message.created_at,
            read: message.read,
            edited: message.edited,
            deleted: message.deleted,
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub body: String,
}

impl SendMessageRequest {
    pub fn new(target: ChatTarget, body: String) -> Self {
        let (recipient_id, group_id) = match target {
            ChatTarget::User(user) => (Some(user), None),
            ChatTarget::Group(group) => (None, Some(group)),
        };
        Self {
            recipient_id,
            group_id,
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: String,
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub display_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDeletedResponse {
    pub deleted: bool,
    /// Messages removed by the cascade.
    pub messages_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadResponse {
    /// URL path under which the uploaded file is served.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
