//! # amicale-shared
//!
//! Domain model and wire protocol shared by the messaging client and the
//! persistence service: identifiers, the canonical `User`/`Group`/`Message`
//! shapes, the camelCase JSON records exchanged over HTTP, input validation,
//! and presence derivation.

pub mod constants;
pub mod models;
pub mod presence;
pub mod protocol;
pub mod types;
pub mod validation;

pub use models::{Group, Message, User};
pub use types::{ChatTarget, GroupId, MessageId, Role, UserId};
pub use validation::ValidationError;
