/// Application name
pub const APP_NAME: &str = "Amicale";

/// Refresh period for the active conversation's history, in seconds.
pub const HISTORY_POLL_SECS: u64 = 5;

/// Refresh period for the conversation directory (users + groups), in seconds.
pub const DIRECTORY_POLL_SECS: u64 = 10;

/// A user is online iff `now - last_active` is strictly below this window.
pub const PRESENCE_WINDOW_MS: i64 = 300_000;

/// Body stored and rendered in place of a soft-deleted message.
pub const DELETED_BODY_PLACEHOLDER: &str = "[message supprimé]";

/// Maximum message body length in characters.
pub const MAX_BODY_CHARS: usize = 4_000;

/// Maximum media upload size in bytes (10 MiB)
pub const MAX_MEDIA_SIZE: usize = 10 * 1024 * 1024;

/// Default HTTP port of the persistence service.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Header carrying the caller's user id on every authenticated request.
pub const CALLER_HEADER: &str = "x-caller-id";
