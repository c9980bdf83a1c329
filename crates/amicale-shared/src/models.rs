//! Canonical domain model structs.
//!
//! `User` and `Group` derive `Serialize`/`Deserialize` and travel over the
//! wire as-is.  `Message` carries its target as a [`ChatTarget`] and crosses
//! the wire through [`crate::protocol::MessageRecord`], which normalizes the
//! two optional id fields into the exactly-one-of-two shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatTarget, GroupId, MessageId, Role, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A member of the association, as seen from the conversation directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user identifier, issued at registration.
    pub id: UserId,
    /// Display name shown in conversation lists.
    pub display_name: String,
    /// Role within the association.
    pub role: Role,
    /// Optional URL of the profile picture (served by the media endpoint).
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Optional club affiliation, used to bucket members for bulk selection.
    #[serde(default)]
    pub club: Option<String>,
    /// Last time this user made an authenticated request.  Presence is
    /// derived from it, see [`crate::presence`].
    pub last_active: DateTime<Utc>,
    /// Direct messages from this user to the caller that are still unread.
    /// Computed per caller by the directory endpoint.
    #[serde(default)]
    pub unread_count: u32,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique group identifier.
    pub id: GroupId,
    /// Display name of the group.
    pub name: String,
    /// Member set.  Unique by id; order carries no meaning.
    pub members: Vec<UserId>,
    /// Members who may manage (rename, re-member, delete) this group in
    /// addition to global admins and presidents.
    #[serde(default)]
    pub admins: Vec<UserId>,
    /// Group messages the caller has not seen yet.  Computed per caller by
    /// the directory endpoint.
    #[serde(default)]
    pub unread_count: u32,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Whether `user` belongs to this group.
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Whether `user` is listed in the per-group admin sub-list.
    pub fn has_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message, direct or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// The author.  Always an id reference; display data comes from the
    /// directory.
    pub sender: UserId,
    /// The conversation this message belongs to.
    pub target: ChatTarget,
    /// Message text.  Replaced by the deletion placeholder once `deleted`.
    pub body: String,
    /// When the message was created, as recorded by the persistence layer.
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has seen the message.  Only meaningful for
    /// direct messages; always `false` for group messages.
    pub read: bool,
    /// Whether the body was edited after sending.
    pub edited: bool,
    /// Soft-deletion flag.  Terminal: a deleted message can no longer be
    /// edited or deleted.
    pub deleted: bool,
}

impl Message {
    /// The text to render: the body, or the deletion placeholder.
    pub fn display_body(&self) -> &str {
        if self.deleted {
            crate::constants::DELETED_BODY_PLACEHOLDER
        } else {
            &self.body
        }
    }
}
