//! Test fixtures: model builders and an in-memory persistence backend that
//! implements the contract rules the real service enforces (participant
//! checks, sender-only mutation, terminal deletion, read-marking, cascade).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use amicale_api::{ApiError, PersistenceApi, Result};
use amicale_shared::constants::DELETED_BODY_PLACEHOLDER;
use amicale_shared::types::{ChatTarget, GroupId, MessageId, Role, UserId};
use amicale_shared::{Group, Message, User};

pub fn user(name: &str, club: Option<&str>) -> User {
    User {
        id: UserId::new(),
        display_name: name.to_string(),
        role: Role::Member,
        avatar_url: None,
        club: club.map(str::to_string),
        last_active: Utc::now(),
        unread_count: 0,
    }
}

pub fn user_with_role(name: &str, role: Role) -> User {
    User {
        role,
        ..user(name, None)
    }
}

pub fn group(name: &str, members: &[UserId]) -> Group {
    Group {
        id: GroupId::new(),
        name: name.to_string(),
        members: members.to_vec(),
        admins: Vec::new(),
        unread_count: 0,
        created_at: Utc::now(),
    }
}

pub fn direct_message(sender: UserId, recipient: UserId, body: &str) -> Message {
    Message {
        id: MessageId::new(),
        sender,
        target: ChatTarget::User(recipient),
        body: body.to_string(),
        created_at: Utc::now(),
        read: false,
        edited: false,
        deleted: false,
    }
}

#[derive(Default)]
struct FakeState {
    users: Vec<User>,
    groups: Vec<Group>,
    messages: Vec<Message>,
    fail_next: bool,
    calls: usize,
}

/// In-memory persistence backend.  State is shared between callers created
/// with [`FakeApi::as_caller`], so two sessions can talk to each other.
pub struct FakeApi {
    caller: UserId,
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    /// Seed the backend with users; the first one is the default caller.
    pub fn new(users: Vec<User>) -> Self {
        let caller = users[0].id;
        Self {
            caller,
            state: Arc::new(Mutex::new(FakeState {
                users,
                ..FakeState::default()
            })),
        }
    }

    /// Another caller over the same shared state.
    pub fn as_caller(&self, caller: UserId) -> Self {
        Self {
            caller,
            state: self.state.clone(),
        }
    }

    /// Fail the next request with a server error.
    pub fn fail_next(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Number of requests that reached the backend.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn enter(&self) -> std::result::Result<std::sync::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_next {
            state.fail_next = false;
            return Err(status(500, "injected failure"));
        }
        Ok(state)
    }

    fn role_of(state: &FakeState, id: UserId) -> Role {
        state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.role)
            .unwrap_or(Role::Member)
    }
}

fn status(code: u16, message: &str) -> ApiError {
    ApiError::Status {
        status: code,
        message: message.to_string(),
    }
}

#[async_trait]
impl PersistenceApi for FakeApi {
    async fn list_users(&self) -> Result<Vec<User>> {
        let state = self.enter()?;
        Ok(state
            .users
            .iter()
            .filter(|u| u.id != self.caller)
            .cloned()
            .map(|mut u| {
                u.unread_count = state
                    .messages
                    .iter()
                    .filter(|m| {
                        m.target == ChatTarget::User(self.caller)
                            && m.sender == u.id
                            && !m.read
                            && !m.deleted
                    })
                    .count() as u32;
                u
            })
            .collect())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let state = self.enter()?;
        Ok(state
            .groups
            .iter()
            .filter(|g| g.has_member(self.caller))
            .cloned()
            .collect())
    }

    async fn fetch_history(&self, target: ChatTarget) -> Result<Vec<Message>> {
        let mut state = self.enter()?;
        let mut history: Vec<Message> = match target {
            ChatTarget::User(peer) => {
                if !state.users.iter().any(|u| u.id == peer) {
                    return Err(status(404, "unknown user"));
                }
                let history = state
                    .messages
                    .iter()
                    .filter(|m| {
                        (m.sender == self.caller && m.target == ChatTarget::User(peer))
                            || (m.sender == peer && m.target == ChatTarget::User(self.caller))
                    })
                    .cloned()
                    .collect();
                // Side effect of the fetch: the recipient has now seen
                // everything the peer sent them.
                for m in state.messages.iter_mut() {
                    if m.sender == peer && m.target == ChatTarget::User(self.caller) {
                        m.read = true;
                    }
                }
                history
            }
            ChatTarget::Group(id) => {
                let group = state
                    .groups
                    .iter()
                    .find(|g| g.id == id)
                    .ok_or_else(|| status(404, "unknown group"))?;
                if !group.has_member(self.caller) {
                    return Err(status(403, "not a member"));
                }
                state
                    .messages
                    .iter()
                    .filter(|m| m.target == target)
                    .cloned()
                    .collect()
            }
        };
        history.sort_by_key(|m| m.created_at);
        Ok(history)
    }

    async fn send_message(&self, target: ChatTarget, body: &str) -> Result<Message> {
        let mut state = self.enter()?;
        match target {
            ChatTarget::User(peer) => {
                if !state.users.iter().any(|u| u.id == peer) {
                    return Err(status(404, "unknown user"));
                }
            }
            ChatTarget::Group(id) => {
                let group = state
                    .groups
                    .iter()
                    .find(|g| g.id == id)
                    .ok_or_else(|| status(404, "unknown group"))?;
                if !group.has_member(self.caller) {
                    return Err(status(403, "not a member"));
                }
            }
        }
        if body.trim().is_empty() {
            return Err(status(400, "empty body"));
        }
        let message = Message {
            id: MessageId::new(),
            sender: self.caller,
            target,
            body: body.to_string(),
            created_at: Utc::now(),
            read: false,
            edited: false,
            deleted: false,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn edit_message(&self, id: MessageId, body: &str) -> Result<Message> {
        let mut state = self.enter()?;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| status(404, "unknown message"))?;
        if message.sender != self.caller {
            return Err(status(403, "not the sender"));
        }
        if message.deleted {
            return Err(status(409, "message is deleted"));
        }
        message.body = body.to_string();
        message.edited = true;
        Ok(message.clone())
    }

    async fn delete_message(&self, id: MessageId) -> Result<Message> {
        let mut state = self.enter()?;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| status(404, "unknown message"))?;
        if message.sender != self.caller {
            return Err(status(403, "not the sender"));
        }
        if message.deleted {
            return Err(status(409, "message is deleted"));
        }
        message.deleted = true;
        message.body = DELETED_BODY_PLACEHOLDER.to_string();
        Ok(message.clone())
    }

    async fn create_group(&self, name: &str, members: &[UserId]) -> Result<Group> {
        let mut state = self.enter()?;
        if !Self::role_of(&state, self.caller).may_create_groups() {
            return Err(status(403, "role may not create groups"));
        }
        if name.trim().is_empty() || members.is_empty() {
            return Err(status(400, "invalid group"));
        }
        let mut group = group(name.trim(), members);
        if !group.has_member(self.caller) {
            group.members.insert(0, self.caller);
        }
        group.admins = vec![self.caller];
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(&self, id: GroupId, name: &str, members: &[UserId]) -> Result<Group> {
        let mut state = self.enter()?;
        let caller_role = Self::role_of(&state, self.caller);
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| status(404, "unknown group"))?;
        if !caller_role.may_manage_any_group() && !group.has_admin(self.caller) {
            return Err(status(403, "not a group admin"));
        }
        if name.trim().is_empty() || members.is_empty() {
            return Err(status(400, "invalid group"));
        }
        group.name = name.trim().to_string();
        group.members = members.to_vec();
        Ok(group.clone())
    }

    async fn delete_group(&self, id: GroupId) -> Result<usize> {
        let mut state = self.enter()?;
        let caller_role = Self::role_of(&state, self.caller);
        let position = state
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| status(404, "unknown group"))?;
        let group = &state.groups[position];
        if !caller_role.may_manage_any_group() && !group.has_admin(self.caller) {
            return Err(status(403, "not a group admin"));
        }
        state.groups.remove(position);
        let before = state.messages.len();
        state.messages.retain(|m| m.target != ChatTarget::Group(id));
        Ok(before - state.messages.len())
    }
}
