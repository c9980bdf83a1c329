//! Local affordances around message mutation: the per-message action menu
//! and the guards applied before an edit/delete leaves the process.
//!
//! The persistence layer re-checks everything; the guards here only keep
//! obviously invalid mutations (someone else's message, an already-deleted
//! one) from producing a round trip.

use amicale_shared::types::{MessageId, UserId};
use amicale_shared::Message;

use crate::error::ChatError;

/// Which message currently shows its action menu.  Mutually exclusive:
/// activating one message deactivates any other.  Pure local state, no
/// server call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    active: Option<MessageId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<MessageId> {
        self.active
    }

    pub fn is_active(&self, id: MessageId) -> bool {
        self.active == Some(id)
    }

    /// Toggle the menu for `id`.  Returns whether it is active afterwards.
    pub fn toggle(&mut self, id: MessageId) -> bool {
        if self.active == Some(id) {
            self.active = None;
            false
        } else {
            self.active = Some(id);
            true
        }
    }

    /// Explicit dismissal, and the cleanup after a successful edit/delete.
    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Reject a mutation the persistence layer would refuse anyway: the message
/// must exist locally, belong to the caller, and not be deleted (deletion is
/// terminal).
pub fn check_mutable(message: Option<&Message>, id: MessageId, caller: UserId) -> Result<(), ChatError> {
    let message = message.ok_or(ChatError::UnknownMessage(id))?;
    if message.sender != caller {
        return Err(ChatError::NotYourMessage(id));
    }
    if message.deleted {
        return Err(ChatError::AlreadyDeleted(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::direct_message;

    #[test]
    fn test_selection_is_mutually_exclusive() {
        let (a, b) = (MessageId::new(), MessageId::new());
        let mut selection = Selection::new();

        assert!(selection.toggle(a));
        assert!(selection.is_active(a));

        // Activating another message moves the menu, it does not stack.
        assert!(selection.toggle(b));
        assert!(selection.is_active(b));
        assert!(!selection.is_active(a));

        // Toggling the active message dismisses it.
        assert!(!selection.toggle(b));
        assert_eq!(selection.active(), None);
    }

    #[test]
    fn test_check_mutable_guards() {
        let (alice, bob) = (UserId::new(), UserId::new());
        let message = direct_message(alice, bob, "coucou");
        let id = message.id;

        assert!(check_mutable(Some(&message), id, alice).is_ok());

        assert!(matches!(
            check_mutable(None, id, alice),
            Err(ChatError::UnknownMessage(_))
        ));
        assert!(matches!(
            check_mutable(Some(&message), id, bob),
            Err(ChatError::NotYourMessage(_))
        ));

        let mut deleted = message;
        deleted.deleted = true;
        assert!(matches!(
            check_mutable(Some(&deleted), id, alice),
            Err(ChatError::AlreadyDeleted(_))
        ));
    }
}
