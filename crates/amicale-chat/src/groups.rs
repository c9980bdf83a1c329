//! Group membership management helpers.
//!
//! The network operations live on [`crate::ChatSession`]; this module holds
//! the authorization predicate mirrored from the persistence layer and the
//! bulk member-selection model used by the create/update forms.

use std::collections::HashSet;

use amicale_shared::types::{Role, UserId};
use amicale_shared::{Group, User};

/// Bucket label for members without a club affiliation.
pub const NO_CLUB_BUCKET: &str = "Sans club";

/// Whether `caller` may rename, re-member, or delete `group`.
///
/// Mirrors the server-side rule: global admins and presidents may manage any
/// group; otherwise the caller must be listed in the group's admin sub-list.
/// The UI uses this to hide the controls; the server still has the final say.
pub fn can_manage(caller: UserId, role: Role, group: &Group) -> bool {
    role.may_manage_any_group() || group.has_admin(caller)
}

/// One club's worth of selectable members.
#[derive(Debug, Clone)]
pub struct ClubBucket {
    /// Club name, or [`NO_CLUB_BUCKET`] for unaffiliated members.
    pub club: String,
    pub members: Vec<User>,
}

/// Member selection state for the group create/update forms, bucketed by
/// club so whole sub-organizations can be (de)selected at once.
#[derive(Debug, Clone, Default)]
pub struct MemberPicker {
    candidates: Vec<User>,
    selected: HashSet<UserId>,
}

impl MemberPicker {
    /// Start a fresh selection over `candidates` (typically the directory's
    /// user list).
    pub fn new(candidates: Vec<User>) -> Self {
        Self {
            candidates,
            selected: HashSet::new(),
        }
    }

    /// Start from an existing member set (the update form).
    pub fn with_selected(candidates: Vec<User>, selected: &[UserId]) -> Self {
        let mut picker = Self::new(candidates);
        for id in selected {
            // Ignore ids that are no longer candidates (e.g. deactivated).
            if picker.candidates.iter().any(|u| u.id == *id) {
                picker.selected.insert(*id);
            }
        }
        picker
    }

    pub fn is_selected(&self, id: UserId) -> bool {
        self.selected.contains(&id)
    }

    pub fn toggle_member(&mut self, id: UserId) {
        if !self.selected.remove(&id) && self.candidates.iter().any(|u| u.id == id) {
            self.selected.insert(id);
        }
    }

    /// Selected ids in candidate order (stable across toggles).
    pub fn selected_ids(&self) -> Vec<UserId> {
        self.candidates
            .iter()
            .filter(|u| self.selected.contains(&u.id))
            .map(|u| u.id)
            .collect()
    }

    /// Candidates grouped by club, in first-appearance order, with the
    /// "no club" bucket last.
    pub fn buckets(&self) -> Vec<ClubBucket> {
        let mut order: Vec<String> = Vec::new();
        for user in &self.candidates {
            if let Some(club) = &user.club {
                if !order.contains(club) {
                    order.push(club.clone());
                }
            }
        }

        let mut buckets: Vec<ClubBucket> = order
            .into_iter()
            .map(|club| ClubBucket {
                members: self
                    .candidates
                    .iter()
                    .filter(|u| u.club.as_deref() == Some(club.as_str()))
                    .cloned()
                    .collect(),
                club,
            })
            .collect();

        let unaffiliated: Vec<User> = self
            .candidates
            .iter()
            .filter(|u| u.club.is_none())
            .cloned()
            .collect();
        if !unaffiliated.is_empty() {
            buckets.push(ClubBucket {
                club: NO_CLUB_BUCKET.to_string(),
                members: unaffiliated,
            });
        }
        buckets
    }

    /// Per-club toggle: if every member of the bucket is selected, deselect
    /// them all; otherwise select them all.  A mixed bucket always resolves
    /// to select-all, never to a partial state.
    pub fn toggle_club(&mut self, club: Option<&str>) {
        let bucket_ids: Vec<UserId> = self
            .candidates
            .iter()
            .filter(|u| u.club.as_deref() == club)
            .map(|u| u.id)
            .collect();
        if bucket_ids.is_empty() {
            return;
        }

        let all_selected = bucket_ids.iter().all(|id| self.selected.contains(id));
        if all_selected {
            for id in &bucket_ids {
                self.selected.remove(id);
            }
        } else {
            self.selected.extend(bucket_ids);
        }
    }
}
