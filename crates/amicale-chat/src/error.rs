use thiserror::Error;

use amicale_api::ApiError;
use amicale_shared::types::{GroupId, MessageId};
use amicale_shared::ValidationError;

/// Errors surfaced to the view layer by the messaging core.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The persistence layer refused or failed the request.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No conversation is currently selected.
    #[error("No active conversation")]
    NoActiveConversation,

    /// The message is not present in the loaded history.
    #[error("Unknown message: {0}")]
    UnknownMessage(MessageId),

    /// Only the sender may edit or delete a message.
    #[error("Message {0} was sent by someone else")]
    NotYourMessage(MessageId),

    /// A deleted message is immutable.
    #[error("Message {0} is deleted")]
    AlreadyDeleted(MessageId),

    /// The caller's role does not allow this group operation.
    #[error("Not permitted to manage groups")]
    NotPermitted,

    /// The group is not in the caller's directory.
    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
