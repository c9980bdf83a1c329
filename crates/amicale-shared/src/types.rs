use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a member within the association.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Ordinary member.
    Member,
    /// Club president.
    President,
    /// National board member.
    NationalBoard,
    /// Global administrator.
    Admin,
}

impl Role {
    /// Whether this role may create group conversations.
    pub fn may_create_groups(self) -> bool {
        matches!(self, Role::President | Role::Admin)
    }

    /// Whether this role alone (ignoring per-group admin lists) may manage
    /// any group conversation.
    pub fn may_manage_any_group(self) -> bool {
        matches!(self, Role::President | Role::Admin)
    }
}

/// The addressee of a conversation: exactly one of a direct peer or a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    User(UserId),
    Group(GroupId),
}

impl ChatTarget {
    pub fn as_user(&self) -> Option<UserId> {
        match self {
            ChatTarget::User(id) => Some(*id),
            ChatTarget::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<GroupId> {
        match self {
            ChatTarget::Group(id) => Some(*id),
            ChatTarget::User(_) => None,
        }
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatTarget::User(id) => write!(f, "user:{id}"),
            ChatTarget::Group(id) => write!(f, "group:{id}"),
        }
    }
}
