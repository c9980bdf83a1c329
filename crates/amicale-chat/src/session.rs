//! The chat session: one view instance's entire messaging state.
//!
//! [`ChatSession`] owns the directory, the active conversation, the compose
//! draft, and the action-menu selection, all behind one mutex.  Every
//! suspension point is a network call; the mutex is only ever held for
//! short synchronous sections, never across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Utc;
use tracing::{info, warn};

use amicale_api::PersistenceApi;
use amicale_shared::types::{ChatTarget, GroupId, MessageId, Role, UserId};
use amicale_shared::validation;
use amicale_shared::{Group, Message, User};

use crate::conversation::{Conversation, HistoryOutcome, LoadKind};
use crate::directory::Directory;
use crate::error::{ChatError, Result};
use crate::groups::{can_manage, MemberPicker};
use crate::mutate::{check_mutable, Selection};
use crate::sync::{spawn_directory_poll, spawn_history_poll, Synchronizer};

/// Who is driving this session.  Passed in explicitly; there is no ambient
/// current-user global anywhere in the core.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub caller: UserId,
    pub role: Role,
}

/// Mutable view state owned by the session.
#[derive(Debug, Default)]
struct ViewState {
    directory: Directory,
    conversation: Conversation,
    selection: Selection,
    draft: String,
}

/// One user's messaging session over a persistence backend `B`.
pub struct ChatSession<B> {
    api: Arc<B>,
    ctx: SessionContext,
    state: Mutex<ViewState>,
    sync: Mutex<Synchronizer>,
    weak_self: Weak<Self>,
}

impl<B> ChatSession<B>
where
    B: PersistenceApi + 'static,
{
    pub fn new(api: Arc<B>, ctx: SessionContext) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            api,
            ctx,
            state: Mutex::new(ViewState::default()),
            sync: Mutex::new(Synchronizer::default()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn caller(&self) -> UserId {
        self.ctx.caller
    }

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    /// A poisoned lock only means some tick panicked mid-update; the state
    /// itself stays usable, so recover it instead of propagating.
    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sync(&self) -> MutexGuard<'_, Synchronizer> {
        self.sync.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load the directory once and install the repeating directory poll.
    /// A failed initial load is logged and left to the next tick, like any
    /// other poll failure.
    pub async fn start(&self) {
        self.poll_directory_tick().await;
        self.sync().directory = Some(spawn_directory_poll(self.weak_self.clone()));
    }

    /// Cancel all timers and drop all view state.  No background work
    /// survives this call.
    pub fn teardown(&self) {
        self.sync().stop_all();
        let mut state = self.state();
        state.conversation.close();
        state.selection.clear();
        state.draft.clear();
        info!(caller = %self.ctx.caller, "Chat session torn down");
    }

    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    /// Fetch users and groups, replacing whichever snapshot arrived intact.
    /// A failure leaves the prior directory state untouched.
    async fn refresh_directory(&self) -> Result<()> {
        let (users, groups) = tokio::join!(self.api.list_users(), self.api.list_groups());
        let mut first_error = None;

        match users {
            Ok(users) => self.state().directory.replace_users(users),
            Err(e) => first_error = Some(e),
        }
        match groups {
            Ok(groups) => self.state().directory.replace_groups(groups),
            Err(e) => first_error = first_error.or(Some(e)),
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub(crate) async fn poll_directory_tick(&self) {
        if let Err(e) = self.refresh_directory().await {
            warn!(error = %e, "Directory refresh failed; keeping previous state");
        }
    }

    /// Snapshot of the fetched users.
    pub fn users(&self) -> Vec<User> {
        self.state().directory.users().to_vec()
    }

    /// Snapshot of the caller's groups.
    pub fn groups(&self) -> Vec<Group> {
        self.state().directory.groups().to_vec()
    }

    /// Local, case-insensitive name-or-club filter over the fetched users.
    pub fn search_users(&self, query: &str) -> Vec<User> {
        self.state()
            .directory
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Whether `user` is currently online.
    pub fn is_online(&self, user: UserId) -> bool {
        self.state().directory.is_online(user, Utc::now())
    }

    // ------------------------------------------------------------------
    // Active conversation
    // ------------------------------------------------------------------

    /// Select a conversation: discard the previous history, restart the
    /// history timer, and load the new target's history from scratch.
    /// Returns whether the view should scroll to the latest message.
    pub async fn select_conversation(&self, target: ChatTarget) -> Result<bool> {
        let generation = {
            let mut state = self.state();
            state.selection.clear();
            state.draft.clear();
            state.conversation.retarget(target)
        };
        {
            // Both timers restart from the switch, so the next refreshes
            // land a full period after the load below.
            let mut sync = self.sync();
            sync.history = Some(spawn_history_poll(self.weak_self.clone()));
            sync.directory = Some(spawn_directory_poll(self.weak_self.clone()));
        }
        info!(%target, "Conversation selected");

        let messages = self.api.fetch_history(target).await?;
        let outcome = self
            .state()
            .conversation
            .apply_history(generation, messages, LoadKind::UserInitiated);
        Ok(matches!(
            outcome,
            HistoryOutcome::Applied {
                scroll_to_latest: true
            }
        ))
    }

    /// Close the active conversation and stop its poll timer.
    pub fn close_conversation(&self) {
        self.sync().history = None;
        let mut state = self.state();
        state.conversation.close();
        state.selection.clear();
        state.draft.clear();
    }

    pub fn active_target(&self) -> Option<ChatTarget> {
        self.state().conversation.target()
    }

    /// Snapshot of the loaded history, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.state().conversation.messages().to_vec()
    }

    /// One silent history refresh.  Failures are swallowed and retried at
    /// the next tick; a response for a target the user has left is
    /// discarded by the generation check.
    pub(crate) async fn poll_history_tick(&self) {
        let Some((target, generation)) = ({
            let state = self.state();
            state
                .conversation
                .target()
                .map(|target| (target, state.conversation.generation()))
        }) else {
            return;
        };

        match self.api.fetch_history(target).await {
            Ok(messages) => {
                self.state()
                    .conversation
                    .apply_history(generation, messages, LoadKind::PollTick);
            }
            Err(e) => warn!(%target, error = %e, "History poll failed; retrying next tick"),
        }
    }

    // ------------------------------------------------------------------
    // Composing
    // ------------------------------------------------------------------

    pub fn set_draft(&self, text: impl Into<String>) {
        self.state().draft = text.into();
    }

    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    /// Send the current draft to the active conversation.  The draft is
    /// cleared only once the server acknowledges the message; on any
    /// failure it stays in the composer for retry.
    pub async fn send_draft(&self) -> Result<Message> {
        let (target, draft) = {
            let state = self.state();
            let target = state
                .conversation
                .target()
                .ok_or(ChatError::NoActiveConversation)?;
            (target, state.draft.clone())
        };
        let body = validation::message_body(&draft)?;

        let message = self.api.send_message(target, &body).await?;

        let mut state = self.state();
        state.conversation.append(message.clone());
        // Only clear the draft if the user is still composing for the
        // conversation the message was sent to.
        if state.conversation.target() == Some(target) {
            state.draft.clear();
        }
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Message mutations
    // ------------------------------------------------------------------

    /// Toggle the action menu of a loaded message.  Local state only.
    pub fn toggle_action_menu(&self, id: MessageId) -> Result<bool> {
        let mut state = self.state();
        if state.conversation.message(id).is_none() {
            return Err(ChatError::UnknownMessage(id));
        }
        Ok(state.selection.toggle(id))
    }

    pub fn dismiss_action_menu(&self) {
        self.state().selection.clear();
    }

    pub fn action_menu(&self) -> Option<MessageId> {
        self.state().selection.active()
    }

    /// Edit one of the caller's own messages.  The server's canonical
    /// record replaces the local one in place; on failure nothing changes.
    pub async fn edit_message(&self, id: MessageId, new_body: &str) -> Result<Message> {
        {
            let state = self.state();
            check_mutable(state.conversation.message(id), id, self.ctx.caller)?;
        }
        let body = validation::message_body(new_body)?;

        let message = self.api.edit_message(id, &body).await?;

        let mut state = self.state();
        state.conversation.replace(message.clone());
        state.selection.clear();
        Ok(message)
    }

    /// Soft-delete one of the caller's own messages.  The record keeps its
    /// position in the history; only its rendered content changes.
    pub async fn delete_message(&self, id: MessageId) -> Result<Message> {
        {
            let state = self.state();
            check_mutable(state.conversation.message(id), id, self.ctx.caller)?;
        }

        let message = self.api.delete_message(id).await?;

        let mut state = self.state();
        state.conversation.replace(message.clone());
        state.selection.clear();
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Group management
    // ------------------------------------------------------------------

    /// Create a group conversation.  Validation failures never reach the
    /// server.
    pub async fn create_group(&self, name: &str, members: &[UserId]) -> Result<Group> {
        if !self.ctx.role.may_create_groups() {
            return Err(ChatError::NotPermitted);
        }
        let name = validation::group_name(name)?;
        let members = validation::member_set(members)?;

        let group = self.api.create_group(&name, &members).await?;
        info!(group = %group.id, name = %group.name, "Group created");
        self.state().directory.upsert_group(group.clone());
        Ok(group)
    }

    /// Rename and/or re-member a group the caller may manage.
    pub async fn update_group(
        &self,
        id: GroupId,
        name: &str,
        members: &[UserId],
    ) -> Result<Group> {
        self.check_can_manage(id)?;
        let name = validation::group_name(name)?;
        let members = validation::member_set(members)?;

        let group = self.api.update_group(id, &name, &members).await?;
        self.state().directory.upsert_group(group.clone());
        Ok(group)
    }

    /// Delete a group.  Destructive: the persistence layer cascades the
    /// deletion to every message of the group.  Returns the number of
    /// messages removed.
    pub async fn delete_group(&self, id: GroupId) -> Result<usize> {
        self.check_can_manage(id)?;

        let removed = self.api.delete_group(id).await?;
        info!(group = %id, messages = removed, "Group deleted");

        let was_active = {
            let mut state = self.state();
            state.directory.remove_group(id);
            if state.conversation.target() == Some(ChatTarget::Group(id)) {
                state.conversation.close();
                state.selection.clear();
                state.draft.clear();
                true
            } else {
                false
            }
        };
        if was_active {
            self.sync().history = None;
        }
        Ok(removed)
    }

    /// Whether the caller may manage (update/delete) the given group.  The
    /// UI uses this to decide whether to show the controls at all.
    pub fn may_manage_group(&self, id: GroupId) -> bool {
        let state = self.state();
        state
            .directory
            .group(id)
            .is_some_and(|group| can_manage(self.ctx.caller, self.ctx.role, group))
    }

    fn check_can_manage(&self, id: GroupId) -> Result<()> {
        let state = self.state();
        let group = state.directory.group(id).ok_or(ChatError::UnknownGroup(id))?;
        if !can_manage(self.ctx.caller, self.ctx.role, group) {
            return Err(ChatError::NotPermitted);
        }
        Ok(())
    }

    /// Fresh member picker over the current directory (the create form).
    pub fn member_picker(&self) -> MemberPicker {
        MemberPicker::new(self.users())
    }

    /// Member picker pre-selected with a group's members (the update form).
    pub fn member_picker_for(&self, id: GroupId) -> Result<MemberPicker> {
        let state = self.state();
        let group = state.directory.group(id).ok_or(ChatError::UnknownGroup(id))?;
        Ok(MemberPicker::with_selected(
            state.directory.users().to_vec(),
            &group.members,
        ))
    }
}
