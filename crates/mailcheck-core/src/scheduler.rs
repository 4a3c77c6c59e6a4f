//! Per-mailbox repeating timers.
//!
//! Mailbox `i` first fires after `i * period / 2` and then every `period`.
//! Each mailbox runs on its own task; a slow or failing mailbox never holds
//! up another one. Within a mailbox the next tick is not taken until the
//! current cycle has finished.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::MailboxIdentity;

/// Registry of running mailbox timers.
///
/// Dropping the scheduler aborts every timer.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<MailboxIdentity, JoinHandle<()>>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First-run delay of the mailbox at position `index`.
    #[must_use]
    pub fn stagger_offset(index: usize, period: Duration) -> Duration {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        (period / 2).saturating_mul(index)
    }

    /// Start a timer that runs `cycle` after `offset` and then every `period`.
    ///
    /// Replaces (and aborts) any timer already registered for `identity`.
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(
        &mut self,
        identity: MailboxIdentity,
        offset: Duration,
        period: Duration,
        mut cycle: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(mailbox = %identity, ?offset, ?period, "Scheduling mailbox");

        let mailbox = identity.clone();
        let first = Instant::now() + offset;
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(first, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                debug!(mailbox = %mailbox, "Timer fired");
                cycle().await;
            }
        });

        if let Some(previous) = self.timers.insert(identity, handle) {
            previous.abort();
        }
    }

    /// Stop the timer of one mailbox. Returns false if none was registered.
    pub fn cancel(&mut self, identity: &MailboxIdentity) -> bool {
        self.timers.remove(identity).is_some_and(|handle| {
            handle.abort();
            true
        })
    }

    /// Identities with a registered timer, sorted.
    #[must_use]
    pub fn mailboxes(&self) -> Vec<MailboxIdentity> {
        let mut identities: Vec<_> = self.timers.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Number of registered timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns true if no timer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Abort every timer. In-flight cycles stop at their next suspension point.
    pub fn shutdown(&mut self) {
        if self.timers.is_empty() {
            return;
        }
        info!(timers = self.timers.len(), "Stopping scheduler");
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in self.timers.values() {
            handle.abort();
        }
    }
}
