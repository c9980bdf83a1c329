//! Client-side input validation.
//!
//! Invalid input is rejected before any network call; the persistence
//! service applies the same checks on its side of the contract.

use thiserror::Error;

use crate::constants::MAX_BODY_CHARS;
use crate::types::UserId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Group name must not be empty")]
    EmptyGroupName,

    #[error("A group needs at least one member")]
    EmptyMemberSet,

    #[error("Message body must not be empty")]
    EmptyBody,

    #[error("Message body too long: {len} characters (max {max})")]
    BodyTooLong { len: usize, max: usize },
}

/// Trim a group name and reject it if nothing remains.
pub fn group_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyGroupName);
    }
    Ok(trimmed.to_string())
}

/// Deduplicate a member list (first occurrence wins) and reject an empty set.
pub fn member_set(raw: &[UserId]) -> Result<Vec<UserId>, ValidationError> {
    let mut seen = std::collections::HashSet::new();
    let members: Vec<UserId> = raw.iter().copied().filter(|id| seen.insert(*id)).collect();
    if members.is_empty() {
        return Err(ValidationError::EmptyMemberSet);
    }
    Ok(members)
}

/// Trim a message body and reject empty or oversized input.
pub fn message_body(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyBody);
    }
    let len = trimmed.chars().count();
    if len > MAX_BODY_CHARS {
        return Err(ValidationError::BodyTooLong {
            len,
            max: MAX_BODY_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
