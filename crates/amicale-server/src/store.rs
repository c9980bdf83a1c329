//! In-memory chat store behind the REST surface.
//!
//! Single source of truth for read/unread state and for authorization:
//! sender-only mutation, terminal soft-deletion, participant checks, the
//! group-manage set, and the cascade on group deletion all live here.
//!
//! Direct messages carry a `read` flag, set when the recipient fetches the
//! conversation (the fetched snapshot still shows the pre-fetch state).
//! Group unread counts come from a per-(user, group) read mark advanced on
//! every group-history fetch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use amicale_shared::constants::{DELETED_BODY_PLACEHOLDER, MAX_BODY_CHARS};
use amicale_shared::protocol::{RegisterUserRequest, UpdateProfileRequest};
use amicale_shared::types::{ChatTarget, GroupId, MessageId, Role, UserId};
use amicale_shared::{Group, Message, User};

use crate::error::ServerError;

type Result<T> = std::result::Result<T, ServerError>;

#[derive(Default)]
struct StoreInner {
    users: Vec<User>,
    groups: Vec<Group>,
    messages: Vec<Message>,
    group_read_marks: HashMap<(UserId, GroupId), DateTime<Utc>>,
}

impl StoreInner {
    fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn role_of(&self, id: UserId) -> Option<Role> {
        self.user(id).map(|u| u.role)
    }

    fn group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Group {id}")))
    }

    fn may_manage(&self, caller: UserId, group: &Group) -> bool {
        self.role_of(caller)
            .is_some_and(Role::may_manage_any_group)
            || group.has_admin(caller)
    }

    /// Unread, non-deleted direct messages from `from` to `to`.
    fn direct_unread(&self, from: UserId, to: UserId) -> u32 {
        self.messages
            .iter()
            .filter(|m| {
                m.target == ChatTarget::User(to) && m.sender == from && !m.read && !m.deleted
            })
            .count() as u32
    }

    /// Group messages `caller` has not seen: sent by someone else after the
    /// caller's read mark (or ever, if the caller never opened the group).
    fn group_unread(&self, caller: UserId, group: GroupId) -> u32 {
        let mark = self.group_read_marks.get(&(caller, group));
        self.messages
            .iter()
            .filter(|m| {
                m.target == ChatTarget::Group(group)
                    && m.sender != caller
                    && !m.deleted
                    && mark.map_or(true, |mark| m.created_at > *mark)
            })
            .count() as u32
    }
}

fn validated_body(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServerError::BadRequest("Message body is empty".into()));
    }
    let len = trimmed.chars().count();
    if len > MAX_BODY_CHARS {
        return Err(ServerError::BadRequest(format!(
            "Message body too long: {len} characters (max {MAX_BODY_CHARS})"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a group's name and member set against the registered users.
/// Returns the trimmed name and the deduplicated member list.
fn validated_group_input(
    inner: &StoreInner,
    name: &str,
    members: &[UserId],
) -> Result<(String, Vec<UserId>)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServerError::BadRequest("Group name is empty".into()));
    }
    let mut seen = std::collections::HashSet::new();
    let members: Vec<UserId> = members.iter().copied().filter(|id| seen.insert(*id)).collect();
    if members.is_empty() {
        return Err(ServerError::BadRequest("Group has no members".into()));
    }
    for id in &members {
        if inner.user(*id).is_none() {
            return Err(ServerError::BadRequest(format!("Unknown member: {id}")));
        }
    }
    Ok((name.to_string(), members))
}

/// Thread-safe store handle shared by all request handlers.
pub struct ChatStore {
    inner: Mutex<StoreInner>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn register_user(&self, request: RegisterUserRequest) -> Result<User> {
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(ServerError::BadRequest("Display name is empty".into()));
        }

        let user = User {
            id: UserId::new(),
            display_name: display_name.to_string(),
            role: request.role,
            avatar_url: None,
            club: request.club.filter(|c| !c.trim().is_empty()),
            last_active: Utc::now(),
            unread_count: 0,
        };

        let mut inner = self.inner.lock().await;
        inner.users.push(user.clone());
        info!(user = %user.id, name = %user.display_name, "User registered");
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        id: UserId,
        update: UpdateProfileRequest,
    ) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("User {id}")))?;

        if let Some(name) = update.display_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServerError::BadRequest("Display name is empty".into()));
            }
            user.display_name = name;
        }
        if let Some(url) = update.avatar_url {
            user.avatar_url = Some(url);
        }
        if let Some(club) = update.club {
            user.club = if club.trim().is_empty() { None } else { Some(club) };
        }
        Ok(user.clone())
    }

    /// Record activity for presence.  Returns `false` for unknown callers.
    pub async fn touch(&self, id: UserId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Every user except the caller, annotated with the caller's unread
    /// count for that sender.  Stable registration order.
    pub async fn list_users(&self, caller: UserId) -> Vec<User> {
        let inner = self.inner.lock().await;
        inner
            .users
            .iter()
            .filter(|u| u.id != caller)
            .cloned()
            .map(|mut u| {
                u.unread_count = inner.direct_unread(u.id, caller);
                u
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// The caller's groups, annotated with unread counts.  Stable creation
    /// order.
    pub async fn list_groups(&self, caller: UserId) -> Vec<Group> {
        let inner = self.inner.lock().await;
        inner
            .groups
            .iter()
            .filter(|g| g.has_member(caller))
            .cloned()
            .map(|mut g| {
                g.unread_count = inner.group_unread(caller, g.id);
                g
            })
            .collect()
    }

    pub async fn create_group(
        &self,
        caller: UserId,
        name: &str,
        members: &[UserId],
    ) -> Result<Group> {
        let mut inner = self.inner.lock().await;
        let role = inner
            .role_of(caller)
            .ok_or_else(|| ServerError::Unauthorized("Unknown caller".into()))?;
        if !role.may_create_groups() {
            return Err(ServerError::Forbidden(
                "Only presidents and admins may create groups".into(),
            ));
        }

        let (name, mut members) = validated_group_input(&inner, name, members)?;
        // The creator always takes part in the conversation they create.
        if !members.contains(&caller) {
            members.insert(0, caller);
        }

        let group = Group {
            id: GroupId::new(),
            name,
            members,
            admins: vec![caller],
            unread_count: 0,
            created_at: Utc::now(),
        };
        inner.groups.push(group.clone());
        info!(group = %group.id, name = %group.name, "Group created");
        Ok(group)
    }

    pub async fn update_group(
        &self,
        caller: UserId,
        id: GroupId,
        name: &str,
        members: &[UserId],
    ) -> Result<Group> {
        let mut inner = self.inner.lock().await;
        {
            let group = inner.group(id)?;
            if !inner.may_manage(caller, group) {
                return Err(ServerError::Forbidden(
                    "Not allowed to manage this group".into(),
                ));
            }
        }
        let (name, members) = validated_group_input(&inner, name, members)?;

        let group = inner
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Group {id}")))?;
        group.name = name;
        group.members = members;
        // The admin sub-list never references non-members.
        let members = group.members.clone();
        group.admins.retain(|a| members.contains(a));
        Ok(group.clone())
    }

    /// Delete a group and every message that belonged to it.  Returns the
    /// number of messages removed by the cascade.
    pub async fn delete_group(&self, caller: UserId, id: GroupId) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let position = inner
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Group {id}")))?;
        if !inner.may_manage(caller, &inner.groups[position]) {
            return Err(ServerError::Forbidden(
                "Not allowed to manage this group".into(),
            ));
        }
        inner.groups.remove(position);

        let before = inner.messages.len();
        inner
            .messages
            .retain(|m| m.target != ChatTarget::Group(id));
        let removed = before - inner.messages.len();
        inner.group_read_marks.retain(|(_, group), _| *group != id);

        info!(group = %id, messages = removed, "Group deleted, messages cascaded");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Ordered history of one conversation, oldest first.
    ///
    /// Side effects: fetching a direct conversation marks the peer's
    /// messages to the caller as read (the returned snapshot still shows
    /// the pre-fetch flags); fetching a group advances the caller's read
    /// mark for that group.
    pub async fn fetch_history(
        &self,
        caller: UserId,
        target: ChatTarget,
    ) -> Result<Vec<Message>> {
        let mut inner = self.inner.lock().await;
        let mut history: Vec<Message> = match target {
            ChatTarget::User(peer) => {
                if inner.user(peer).is_none() {
                    return Err(ServerError::NotFound(format!("User {peer}")));
                }
                let history: Vec<Message> = inner
                    .messages
                    .iter()
                    .filter(|m| {
                        (m.sender == caller && m.target == ChatTarget::User(peer))
                            || (m.sender == peer && m.target == ChatTarget::User(caller))
                    })
                    .cloned()
                    .collect();

                let mut marked = 0;
                for m in inner.messages.iter_mut() {
                    if m.sender == peer && m.target == ChatTarget::User(caller) && !m.read {
                        m.read = true;
                        marked += 1;
                    }
                }
                if marked > 0 {
                    debug!(caller = %caller, peer = %peer, marked, "Marked direct messages read");
                }
                history
            }
            ChatTarget::Group(id) => {
                let group = inner.group(id)?;
                if !group.has_member(caller) {
                    return Err(ServerError::Forbidden("Not a member of this group".into()));
                }
                let history: Vec<Message> = inner
                    .messages
                    .iter()
                    .filter(|m| m.target == target)
                    .cloned()
                    .collect();
                inner.group_read_marks.insert((caller, id), Utc::now());
                history
            }
        };
        history.sort_by_key(|m| m.created_at);
        Ok(history)
    }

    pub async fn send_message(
        &self,
        caller: UserId,
        target: ChatTarget,
        body: &str,
    ) -> Result<Message> {
        let body = validated_body(body)?;

        let mut inner = self.inner.lock().await;
        match target {
            ChatTarget::User(peer) => {
                if inner.user(peer).is_none() {
                    return Err(ServerError::NotFound(format!("User {peer}")));
                }
            }
            ChatTarget::Group(id) => {
                let group = inner.group(id)?;
                if !group.has_member(caller) {
                    return Err(ServerError::Forbidden("Not a member of this group".into()));
                }
            }
        }

        let message = Message {
            id: MessageId::new(),
            sender: caller,
            target,
            body,
            created_at: Utc::now(),
            read: false,
            edited: false,
            deleted: false,
        };
        inner.messages.push(message.clone());
        debug!(message = %message.id, %target, "Message stored");
        Ok(message)
    }

    pub async fn edit_message(
        &self,
        caller: UserId,
        id: MessageId,
        body: &str,
    ) -> Result<Message> {
        let body = validated_body(body)?;

        let mut inner = self.inner.lock().await;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Message {id}")))?;
        if message.sender != caller {
            return Err(ServerError::Forbidden(
                "Only the sender may edit a message".into(),
            ));
        }
        if message.deleted {
            return Err(ServerError::Conflict("Message is deleted".into()));
        }
        message.body = body;
        message.edited = true;
        Ok(message.clone())
    }

    pub async fn delete_message(&self, caller: UserId, id: MessageId) -> Result<Message> {
        let mut inner = self.inner.lock().await;
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Message {id}")))?;
        if message.sender != caller {
            return Err(ServerError::Forbidden(
                "Only the sender may delete a message".into(),
            ));
        }
        if message.deleted {
            return Err(ServerError::Conflict("Message is already deleted".into()));
        }
        message.deleted = true;
        message.body = DELETED_BODY_PLACEHOLDER.to_string();
        Ok(message.clone())
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn register(store: &ChatStore, name: &str, role: Role) -> User {
        store
            .register_user(RegisterUserRequest {
                display_name: name.to_string(),
                role,
                club: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_touch_unknown_caller() {
        let store = ChatStore::new();
        assert!(!store.touch(UserId::new()).await);

        let alice = register(&store, "Alice", Role::Member).await;
        assert!(store.touch(alice.id).await);
    }

    #[tokio::test]
    async fn test_direct_read_marking() {
        let store = ChatStore::new();
        let alice = register(&store, "Alice", Role::Member).await;
        let bob = register(&store, "Bob", Role::Member).await;

        store
            .send_message(alice.id, ChatTarget::User(bob.id), "hello")
            .await
            .unwrap();

        // Bob's directory shows one unread from Alice.
        let users = store.list_users(bob.id).await;
        let alice_entry = users.iter().find(|u| u.id == alice.id).unwrap();
        assert_eq!(alice_entry.unread_count, 1);

        // Bob fetches: the snapshot is still unread, the stored state flips.
        let history = store
            .fetch_history(bob.id, ChatTarget::User(alice.id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].read);

        let users = store.list_users(bob.id).await;
        assert_eq!(users.iter().find(|u| u.id == alice.id).unwrap().unread_count, 0);

        // Alice sees the read receipt.
        let history = store
            .fetch_history(alice.id, ChatTarget::User(bob.id))
            .await
            .unwrap();
        assert!(history[0].read);
    }

    #[tokio::test]
    async fn test_sender_only_mutation_and_terminal_delete() {
        let store = ChatStore::new();
        let alice = register(&store, "Alice", Role::Member).await;
        let bob = register(&store, "Bob", Role::Member).await;

        let message = store
            .send_message(alice.id, ChatTarget::User(bob.id), "hello")
            .await
            .unwrap();

        assert!(matches!(
            store.edit_message(bob.id, message.id, "hijack").await,
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            store.delete_message(bob.id, message.id).await,
            Err(ServerError::Forbidden(_))
        ));

        let edited = store
            .edit_message(alice.id, message.id, "hello!")
            .await
            .unwrap();
        assert!(edited.edited);
        assert_eq!(edited.body, "hello!");

        let deleted = store.delete_message(alice.id, message.id).await.unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.body, DELETED_BODY_PLACEHOLDER);

        // Terminal: no further edit or delete.
        assert!(matches!(
            store.edit_message(alice.id, message.id, "back").await,
            Err(ServerError::Conflict(_))
        ));
        assert!(matches!(
            store.delete_message(alice.id, message.id).await,
            Err(ServerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_send_validation() {
        let store = ChatStore::new();
        let alice = register(&store, "Alice", Role::Member).await;
        let bob = register(&store, "Bob", Role::Member).await;

        assert!(matches!(
            store
                .send_message(alice.id, ChatTarget::User(bob.id), "   ")
                .await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store
                .send_message(alice.id, ChatTarget::User(UserId::new()), "salut")
                .await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_group_create_auth_and_validation() {
        let store = ChatStore::new();
        let member = register(&store, "Membre", Role::Member).await;
        let president = register(&store, "Présidente", Role::President).await;

        assert!(matches!(
            store.create_group(member.id, "Complot", &[president.id]).await,
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            store.create_group(president.id, "  ", &[member.id]).await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.create_group(president.id, "Vide", &[]).await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store
                .create_group(president.id, "Fantômes", &[UserId::new()])
                .await,
            Err(ServerError::BadRequest(_))
        ));

        // Duplicates collapse, the creator joins, the creator administers.
        let group = store
            .create_group(president.id, "Chorale", &[member.id, member.id])
            .await
            .unwrap();
        assert_eq!(group.members.len(), 2);
        assert!(group.has_member(president.id));
        assert!(group.has_admin(president.id));
    }

    #[tokio::test]
    async fn test_group_membership_enforced() {
        let store = ChatStore::new();
        let president = register(&store, "Présidente", Role::President).await;
        let member = register(&store, "Membre", Role::Member).await;
        let outsider = register(&store, "Extérieur", Role::Member).await;

        let group = store
            .create_group(president.id, "Bureau", &[member.id])
            .await
            .unwrap();
        let target = ChatTarget::Group(group.id);

        assert!(matches!(
            store.fetch_history(outsider.id, target).await,
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            store.send_message(outsider.id, target, "coucou").await,
            Err(ServerError::Forbidden(_))
        ));

        store
            .send_message(member.id, target, "présents ce soir ?")
            .await
            .unwrap();
        let history = store.fetch_history(president.id, target).await.unwrap();
        assert_eq!(history.len(), 1);

        // The group message never shows up in a direct history.
        let direct = store
            .fetch_history(president.id, ChatTarget::User(member.id))
            .await
            .unwrap();
        assert!(direct.is_empty());

        // Removing the author from the group does not rewrite history.
        store
            .update_group(president.id, group.id, "Bureau", &[president.id])
            .await
            .unwrap();
        let history = store.fetch_history(president.id, target).await.unwrap();
        assert_eq!(history[0].sender, member.id);
    }

    #[tokio::test]
    async fn test_group_update_auth_and_admin_pruning() {
        let store = ChatStore::new();
        let president = register(&store, "Présidente", Role::President).await;
        let m1 = register(&store, "Un", Role::Member).await;
        let m2 = register(&store, "Deux", Role::Member).await;

        let group = store
            .create_group(president.id, "Conseil", &[m1.id, m2.id])
            .await
            .unwrap();

        assert!(matches!(
            store
                .update_group(m1.id, group.id, "Putsch", &[m1.id])
                .await,
            Err(ServerError::Forbidden(_))
        ));

        // Create-then-update with identical inputs preserves the group.
        let updated = store
            .update_group(president.id, group.id, &group.name, &group.members)
            .await
            .unwrap();
        assert_eq!(updated.name, group.name);
        let mut before = group.members.clone();
        let mut after = updated.members.clone();
        before.sort();
        after.sort();
        assert_eq!(before, after);

        // Removing the only admin from the member set prunes the admin list.
        let updated = store
            .update_group(president.id, group.id, "Conseil", &[m1.id, m2.id])
            .await
            .unwrap();
        assert!(!updated.has_member(president.id));
        assert!(updated.admins.is_empty());
    }

    #[tokio::test]
    async fn test_group_delete_cascades() {
        let store = ChatStore::new();
        let president = register(&store, "Présidente", Role::President).await;
        let member = register(&store, "Membre", Role::Member).await;

        let group = store
            .create_group(president.id, "Éphémère", &[member.id])
            .await
            .unwrap();
        let target = ChatTarget::Group(group.id);
        for body in ["un", "deux", "trois"] {
            store.send_message(member.id, target, body).await.unwrap();
        }

        assert!(matches!(
            store.delete_group(member.id, group.id).await,
            Err(ServerError::Forbidden(_))
        ));

        let removed = store.delete_group(president.id, group.id).await.unwrap();
        assert_eq!(removed, 3);

        assert!(matches!(
            store.fetch_history(president.id, target).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(store.list_groups(member.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_group_unread_marks() {
        let store = ChatStore::new();
        let president = register(&store, "Présidente", Role::President).await;
        let member = register(&store, "Membre", Role::Member).await;

        let group = store
            .create_group(president.id, "Annonces", &[member.id])
            .await
            .unwrap();
        let target = ChatTarget::Group(group.id);

        store.send_message(president.id, target, "une").await.unwrap();
        store.send_message(president.id, target, "deux").await.unwrap();

        // The member has never opened the group: everything is unread.
        let groups = store.list_groups(member.id).await;
        assert_eq!(groups[0].unread_count, 2);
        // The sender's own messages never count against them.
        let groups = store.list_groups(president.id).await;
        assert_eq!(groups[0].unread_count, 0);

        // Opening the group advances the read mark.
        store.fetch_history(member.id, target).await.unwrap();
        let groups = store.list_groups(member.id).await;
        assert_eq!(groups[0].unread_count, 0);

        store.send_message(president.id, target, "trois").await.unwrap();
        let groups = store.list_groups(member.id).await;
        assert_eq!(groups[0].unread_count, 1);
    }
}
