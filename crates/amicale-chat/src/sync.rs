//! Polling synchronization.
//!
//! There is no push channel; freshness comes from two repeating timers, one
//! for the active conversation's history (5 s) and one for the directory
//! (10 s).  Each timer is a tokio task holding only a [`Weak`] reference to
//! the session: when the view drops its session, the next tick fails to
//! upgrade and the task exits on its own.  Dropping a [`PollHandle`] aborts
//! the task immediately, which is how target switches and teardown cancel
//! timers deterministically.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use amicale_api::PersistenceApi;
use amicale_shared::constants::{DIRECTORY_POLL_SECS, HISTORY_POLL_SECS};

use crate::session::ChatSession;

/// Cancellable handle to one repeating poll task.  Aborts the task on drop,
/// so replacing or discarding the handle is the cancellation.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The session's two timers.  `None` means the concern is not being polled
/// (no active conversation, or the view is torn down).
#[derive(Debug, Default)]
pub(crate) struct Synchronizer {
    pub(crate) history: Option<PollHandle>,
    pub(crate) directory: Option<PollHandle>,
}

impl Synchronizer {
    pub(crate) fn stop_all(&mut self) {
        self.history = None;
        self.directory = None;
    }
}

/// Spawn the active-conversation refresh timer.  The first refresh happens
/// one full period after the spawn; the user-initiated load that accompanies
/// a target switch covers the interim.
pub(crate) fn spawn_history_poll<B>(session: Weak<ChatSession<B>>) -> PollHandle
where
    B: PersistenceApi + 'static,
{
    spawn_repeating(Duration::from_secs(HISTORY_POLL_SECS), session, |session| async move {
        session.poll_history_tick().await;
    })
}

/// Spawn the directory (users + groups) refresh timer.
pub(crate) fn spawn_directory_poll<B>(session: Weak<ChatSession<B>>) -> PollHandle
where
    B: PersistenceApi + 'static,
{
    spawn_repeating(Duration::from_secs(DIRECTORY_POLL_SECS), session, |session| async move {
        session.poll_directory_tick().await;
    })
}

fn spawn_repeating<B, F, Fut>(period: Duration, session: Weak<ChatSession<B>>, tick: F) -> PollHandle
where
    B: PersistenceApi + 'static,
    F: Fn(std::sync::Arc<ChatSession<B>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick of a tokio interval completes immediately; consume
        // it so the loop fires one full period after the spawn.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(session) = session.upgrade() else {
                debug!("Session dropped, poll task exiting");
                break;
            };
            tick(session).await;
        }
    });
    PollHandle { task }
}
