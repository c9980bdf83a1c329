//! # amicale-chat
//!
//! The messaging core of the Amicale application: conversation directory,
//! active-conversation history, polling synchronization, message mutations
//! (edit / soft-delete), and group membership management.
//!
//! All view state lives in a single [`ChatSession`], generic over the
//! [`amicale_api::PersistenceApi`] backend so the persistence layer can be
//! swapped (HTTP in production, an in-memory fake in tests).  The session is
//! single-writer: one view instance owns it, and background polls only ever
//! merge server state into it, never clobber transient UI state.

pub mod conversation;
pub mod directory;
pub mod error;
pub mod groups;
pub mod mutate;
pub mod session;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use conversation::{Conversation, HistoryOutcome, LoadKind};
pub use directory::Directory;
pub use error::ChatError;
pub use groups::MemberPicker;
pub use session::{ChatSession, SessionContext};
pub use sync::PollHandle;
