//! The per-mailbox synchronization cycle.

use std::fmt;

use tracing::{debug, error, info, warn};

use super::{FetchPipeline, filter_new};
use crate::config::MailboxConfig;
use crate::ledger::DeliveryLedger;
use crate::parse::{MessageParser, ParsedMessage};
use crate::session::{MailboxSession, ServerMessageRef, SessionConnector};
use crate::{Error, Result};

/// Cycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CycleState {
    /// Not started.
    #[default]
    Idle,
    /// Opening the session and listing messages.
    Listing,
    /// Checking the listing against the ledger.
    Filtering,
    /// Fetching and parsing the chunk.
    Fetching,
    /// Finished; session closed.
    Closed,
    /// Aborted; session closed if it was opened.
    Errored,
}

impl CycleState {
    /// Returns true for `Closed` and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listing => "listing",
            Self::Filtering => "filtering",
            Self::Fetching => "fetching",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a cycle that reached `Closed`.
#[derive(Debug, Default)]
pub struct CycleSummary {
    /// Messages reported by the server.
    pub listed: usize,
    /// Messages not yet in the ledger.
    pub new: usize,
    /// Messages delivered this cycle, in server order.
    pub delivered: Vec<ParsedMessage>,
    /// Chunk members whose fetch or parse failed.
    pub failed: Vec<(ServerMessageRef, Error)>,
    /// New messages left for a later cycle.
    pub deferred: usize,
}

/// One list → filter → fetch pass over a single mailbox.
///
/// A cycle is single-use: build a fresh one per timer tick.
pub struct SyncCycle<'a> {
    mailbox: &'a MailboxConfig,
    ledger: &'a dyn DeliveryLedger,
    connector: &'a dyn SessionConnector,
    parser: &'a dyn MessageParser,
    chunk_size: usize,
    ledger_key: String,
    history: Vec<CycleState>,
}

impl<'a> SyncCycle<'a> {
    /// Create a cycle in the `Idle` state.
    #[must_use]
    pub fn new(
        mailbox: &'a MailboxConfig,
        ledger: &'a dyn DeliveryLedger,
        connector: &'a dyn SessionConnector,
        parser: &'a dyn MessageParser,
        chunk_size: usize,
    ) -> Self {
        Self {
            mailbox,
            ledger,
            connector,
            parser,
            chunk_size,
            ledger_key: mailbox.identity().ledger_key(),
            history: vec![CycleState::Idle],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CycleState {
        self.history.last().copied().unwrap_or_default()
    }

    /// Every state visited so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[CycleState] {
        &self.history
    }

    fn transition(&mut self, next: CycleState) {
        debug!(
            mailbox = %self.ledger_key,
            from = %self.state(),
            to = %next,
            "Cycle transition"
        );
        self.history.push(next);
    }

    /// Run the cycle to a terminal state.
    ///
    /// An opened session is closed exactly once whatever the outcome. A close
    /// failure is logged and does not affect the result.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the session cannot be opened or listed,
    /// or a ledger read error if filtering fails. Per-message failures are
    /// reported in [`CycleSummary::failed`] instead.
    pub async fn run(&mut self) -> Result<CycleSummary> {
        if self.state() != CycleState::Idle {
            warn!(mailbox = %self.ledger_key, state = %self.state(), "Cycle already ran");
            return Ok(CycleSummary::default());
        }

        self.transition(CycleState::Listing);
        let session = match self.connector.open(self.mailbox).await {
            Ok(session) => session,
            Err(source) => {
                return Err(self.fail(Error::Transport {
                    stage: CycleState::Listing,
                    source,
                }));
            }
        };

        let result = self.run_session(session.as_ref()).await;

        if let Err(e) = session.close().await {
            warn!(mailbox = %self.ledger_key, error = %e, "Failed to close session");
        }

        match result {
            Ok(summary) => {
                self.transition(CycleState::Closed);
                if !summary.delivered.is_empty() {
                    info!(
                        mailbox = %self.ledger_key,
                        listed = summary.listed,
                        new = summary.new,
                        delivered = summary.delivered.len(),
                        failed = summary.failed.len(),
                        deferred = summary.deferred,
                        "Delivered new messages"
                    );
                }
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_session(&mut self, session: &dyn MailboxSession) -> Result<CycleSummary> {
        let refs = session.list().await.map_err(|source| Error::Transport {
            stage: CycleState::Listing,
            source,
        })?;
        let listed = refs.len();

        self.transition(CycleState::Filtering);
        let new_refs = filter_new(self.ledger, &self.ledger_key, refs)
            .await
            .map_err(Error::LedgerRead)?;
        debug!(mailbox = %self.ledger_key, listed, new = new_refs.len(), "Filtered listing");

        if new_refs.is_empty() {
            return Ok(CycleSummary {
                listed,
                ..CycleSummary::default()
            });
        }

        self.transition(CycleState::Fetching);
        let outcome = FetchPipeline::new(
            session,
            self.ledger,
            self.parser,
            &self.ledger_key,
            self.chunk_size,
        )
        .run(&new_refs)
        .await;

        Ok(CycleSummary {
            listed,
            new: new_refs.len(),
            delivered: outcome.delivered,
            failed: outcome.failed,
            deferred: outcome.deferred,
        })
    }

    fn fail(&mut self, err: Error) -> Error {
        let stage = self.state();
        error!(mailbox = %self.ledger_key, %stage, error = %err, "Cycle failed");
        self.transition(CycleState::Errored);
        err
    }
}
