//! Conversation directory: the merged list of reachable peers.
//!
//! Holds the last successfully fetched users and groups.  A failed refresh
//! never touches it; the stale snapshot stays visible until the next poll
//! tick succeeds.

use chrono::{DateTime, Utc};

use amicale_shared::presence;
use amicale_shared::types::{GroupId, UserId};
use amicale_shared::{Group, User};

/// In-memory snapshot of the caller's reachable conversations.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: Vec<User>,
    groups: Vec<Group>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the user list with a fresh server snapshot.
    pub fn replace_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    /// Replace the group list with a fresh server snapshot.
    pub fn replace_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Replace one group in place (after an update), or append it if it is
    /// new (after a create).
    pub fn upsert_group(&mut self, group: Group) {
        match self.groups.iter_mut().find(|g| g.id == group.id) {
            Some(slot) => *slot = group,
            None => self.groups.push(group),
        }
    }

    /// Drop one group (after a delete).
    pub fn remove_group(&mut self, id: GroupId) {
        self.groups.retain(|g| g.id != id);
    }

    /// Case-insensitive substring filter over the fetched users, matching
    /// display name or club.  Purely local; never hits the network.
    pub fn search<'a>(&'a self, query: &str) -> Vec<&'a User> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.users.iter().collect();
        }
        self.users
            .iter()
            .filter(|u| {
                u.display_name.to_lowercase().contains(&needle)
                    || u.club
                        .as_deref()
                        .is_some_and(|club| club.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Presence of a user at `now`, derived from their last-active stamp.
    pub fn is_online(&self, id: UserId, now: DateTime<Utc>) -> bool {
        self.user(id)
            .is_some_and(|u| presence::is_online(u.last_active, now))
    }

    /// Total unread messages across users and groups.
    pub fn total_unread(&self) -> u32 {
        let direct: u32 = self.users.iter().map(|u| u.unread_count).sum();
        let grouped: u32 = self.groups.iter().map(|g| g.unread_count).sum();
        direct + grouped
    }
}
