//! The persistence-API contract the messaging core depends on.

use async_trait::async_trait;

use amicale_shared::types::{ChatTarget, GroupId, MessageId, UserId};
use amicale_shared::{Group, Message, User};

use crate::error::Result;

/// Request/response surface of the persistence layer, scoped to one caller.
///
/// Implementations carry the caller's identity themselves (the HTTP client
/// sends it as a header on every request), so the core never passes it
/// around per call.  The persistence layer is the source of truth for
/// read/unread state and for authorization; implementations must surface its
/// refusals as errors rather than guessing locally.
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    /// All other users visible to the caller, annotated with unread counts.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// All groups the caller belongs to.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Ordered history (oldest first) of one conversation.
    async fn fetch_history(&self, target: ChatTarget) -> Result<Vec<Message>>;

    /// Create a message; returns the acknowledged record.
    async fn send_message(&self, target: ChatTarget, body: &str) -> Result<Message>;

    /// Replace a message body; returns the canonical edited record.
    async fn edit_message(&self, id: MessageId, body: &str) -> Result<Message>;

    /// Soft-delete a message; returns the confirmed record
    /// (`deleted = true`, placeholder body).
    async fn delete_message(&self, id: MessageId) -> Result<Message>;

    /// Create a group conversation.
    async fn create_group(&self, name: &str, members: &[UserId]) -> Result<Group>;

    /// Rename and/or replace the membership of a group.
    async fn update_group(&self, id: GroupId, name: &str, members: &[UserId]) -> Result<Group>;

    /// Delete a group and cascade-delete its messages.  Returns the number
    /// of messages removed.
    async fn delete_group(&self, id: GroupId) -> Result<usize>;
}
