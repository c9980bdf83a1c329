//! Online/offline derivation from the last-active timestamp.

use chrono::{DateTime, Duration, Utc};

use crate::constants::PRESENCE_WINDOW_MS;

/// A user is online iff their last activity is strictly less than the
/// presence window ago.  At exactly the window boundary they are offline.
pub fn is_online(last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(last_active) < Duration::milliseconds(PRESENCE_WINDOW_MS)
}
