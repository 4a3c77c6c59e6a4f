//! Chunked fetch/parse pipeline.

use futures::future::join_all;
use tracing::{debug, error, warn};

use super::CycleState;
use crate::ledger::DeliveryLedger;
use crate::parse::{MessageParser, ParsedMessage};
use crate::session::{MailboxSession, ServerMessageRef};
use crate::{Error, Result};

/// What one pipeline run produced.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Successfully parsed messages, in server order.
    pub delivered: Vec<ParsedMessage>,
    /// Messages whose fetch or parse failed; they stay undelivered.
    pub failed: Vec<(ServerMessageRef, Error)>,
    /// New messages left for a later cycle by the chunk bound.
    pub deferred: usize,
    /// Delivered messages whose ledger write failed.
    pub unrecorded: usize,
}

/// Fetches, parses and records at most `chunk_size` new messages.
pub struct FetchPipeline<'a> {
    session: &'a dyn MailboxSession,
    ledger: &'a dyn DeliveryLedger,
    parser: &'a dyn MessageParser,
    mailbox: &'a str,
    chunk_size: usize,
}

impl<'a> FetchPipeline<'a> {
    /// Create a pipeline for one mailbox's session.
    #[must_use]
    pub fn new(
        session: &'a dyn MailboxSession,
        ledger: &'a dyn DeliveryLedger,
        parser: &'a dyn MessageParser,
        mailbox: &'a str,
        chunk_size: usize,
    ) -> Self {
        Self {
            session,
            ledger,
            parser,
            mailbox,
            chunk_size,
        }
    }

    /// Process the first chunk of `new_refs`.
    ///
    /// Chunk members run concurrently and fail independently; the outcome is
    /// returned once every member has settled.
    pub async fn run(&self, new_refs: &[ServerMessageRef]) -> PipelineOutcome {
        let chunk = &new_refs[..new_refs.len().min(self.chunk_size)];
        let deferred = new_refs.len() - chunk.len();
        if deferred > 0 {
            debug!(
                mailbox = %self.mailbox,
                chunk = chunk.len(),
                deferred,
                "Leaving remaining messages for the next cycle"
            );
        }

        let results = join_all(chunk.iter().map(|r| self.process(r))).await;

        let mut outcome = PipelineOutcome {
            deferred,
            ..PipelineOutcome::default()
        };
        for (message_ref, result) in chunk.iter().zip(results) {
            match result {
                Ok((parsed, recorded)) => {
                    if !recorded {
                        outcome.unrecorded += 1;
                    }
                    outcome.delivered.push(parsed);
                }
                Err(e) => {
                    warn!(
                        mailbox = %self.mailbox,
                        retrieve_id = message_ref.retrieve_id,
                        message_id = %message_ref.unique_id,
                        error = %e,
                        "Message skipped; it will be retried next cycle"
                    );
                    outcome.failed.push((message_ref.clone(), e));
                }
            }
        }

        outcome
    }

    /// fetch → parse → record. Recording happens only after a successful parse.
    async fn process(&self, message_ref: &ServerMessageRef) -> Result<(ParsedMessage, bool)> {
        let raw = self
            .session
            .fetch(message_ref.retrieve_id)
            .await
            .map_err(|source| Error::Transport {
                stage: CycleState::Fetching,
                source,
            })?;

        debug!(
            mailbox = %self.mailbox,
            retrieve_id = message_ref.retrieve_id,
            message_id = %message_ref.unique_id,
            bytes = raw.len(),
            "Parsing message"
        );
        let parsed = self.parser.parse(&raw)?;

        let recorded = match self.ledger.add(self.mailbox, &message_ref.unique_id).await {
            Ok(()) => true,
            Err(e) => {
                let e = Error::LedgerWrite(e);
                error!(
                    mailbox = %self.mailbox,
                    message_id = %message_ref.unique_id,
                    error = %e,
                    "Delivered message was not recorded and may be delivered again"
                );
                false
            }
        };

        Ok((parsed, recorded))
    }
}
