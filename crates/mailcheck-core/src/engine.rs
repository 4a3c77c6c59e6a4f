//! The mail checker: configuration, ledger, scheduler and events in one place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::{Config, MailboxConfig, MailboxIdentity, validate_config};
use crate::ledger::{DeliveryLedger, open_ledger};
use crate::parse::{MessageParser, MimeParser, ParsedMessage};
use crate::scheduler::Scheduler;
use crate::session::{Pop3Connector, SessionConnector};
use crate::sync::SyncCycle;
use crate::{Error, Result};

/// Notifications published to the application.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A cycle delivered at least one new message.
    Data {
        /// Mailbox the messages came from.
        mailbox: MailboxIdentity,
        /// Delivered messages, in server order.
        messages: Vec<ParsedMessage>,
    },
    /// A cycle ended in `Errored`, or an unprocess request failed.
    Error {
        /// Mailbox concerned.
        mailbox: MailboxIdentity,
        /// What went wrong.
        error: Arc<Error>,
    },
    /// An unprocess request completed.
    Unprocessed {
        /// Mailbox concerned.
        mailbox: MailboxIdentity,
        /// Number of delivery records removed.
        count: u64,
    },
}

/// State shared by every mailbox timer.
struct Shared {
    ledger: Arc<dyn DeliveryLedger>,
    connector: Arc<dyn SessionConnector>,
    parser: Arc<dyn MessageParser>,
    chunk_size: usize,
    events: UnboundedSender<SyncEvent>,
}

impl Shared {
    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    /// Run one cycle and publish its outcome. Returns the delivered count.
    async fn run_cycle(&self, mailbox: &MailboxConfig) -> usize {
        let identity = mailbox.identity();
        let mut cycle = SyncCycle::new(
            mailbox,
            self.ledger.as_ref(),
            self.connector.as_ref(),
            self.parser.as_ref(),
            self.chunk_size,
        );

        match cycle.run().await {
            Ok(summary) if summary.delivered.is_empty() => 0,
            Ok(summary) => {
                let count = summary.delivered.len();
                self.emit(SyncEvent::Data {
                    mailbox: identity,
                    messages: summary.delivered,
                });
                count
            }
            Err(error) => {
                self.emit(SyncEvent::Error {
                    mailbox: identity,
                    error: Arc::new(error),
                });
                0
            }
        }
    }
}

/// Polls every configured mailbox and delivers each new message once.
///
/// # Example
///
/// ```no_run
/// use mailcheck_core::{Config, MailChecker, SyncEvent};
///
/// # async fn run() -> mailcheck_core::Result<()> {
/// let config = Config::load("mailcheck.json".as_ref()).await?;
/// let (mut checker, mut events) = MailChecker::from_config(config).await?;
/// checker.start().await?;
///
/// while let Some(event) = events.recv().await {
///     if let SyncEvent::Data { messages, .. } = event {
///         println!("{} new messages", messages.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct MailChecker {
    config: Config,
    shared: Arc<Shared>,
    scheduler: Scheduler,
    schema_ready: bool,
}

impl MailChecker {
    /// Create a checker from validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] with every problem found in `config`.
    pub fn new(
        config: Config,
        ledger: Arc<dyn DeliveryLedger>,
        connector: Arc<dyn SessionConnector>,
        parser: Arc<dyn MessageParser>,
    ) -> Result<(Self, UnboundedReceiver<SyncEvent>)> {
        validate_config(&config).map_err(Error::Configuration)?;

        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            ledger,
            connector,
            parser,
            chunk_size: config.sync.message_chunk_size,
            events,
        });

        let checker = Self {
            config,
            shared,
            scheduler: Scheduler::new(),
            schema_ready: false,
        };
        Ok((checker, receiver))
    }

    /// Create a checker with the configured ledger, POP3 sessions and MIME decoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `config` is invalid, or
    /// [`Error::Schema`] if the ledger cannot be opened.
    pub async fn from_config(config: Config) -> Result<(Self, UnboundedReceiver<SyncEvent>)> {
        validate_config(&config).map_err(Error::Configuration)?;
        let ledger = open_ledger(&config.sync.ledger)
            .await
            .map_err(Error::Schema)?;
        Self::new(config, ledger, Arc::new(Pop3Connector), Arc::new(MimeParser))
    }

    /// The configuration this checker was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The mailbox timers.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create the ledger table or namespace if needed. Runs at most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the backend rejects the operation.
    pub async fn ensure_schema(&mut self) -> Result<()> {
        if self.schema_ready {
            return Ok(());
        }
        self.shared
            .ledger
            .ensure_schema()
            .await
            .map_err(Error::Schema)?;
        self.schema_ready = true;
        Ok(())
    }

    /// Prepare the ledger and start one timer per mailbox.
    ///
    /// Mailbox `i` first runs after `i * checkPeriod / 2`. Calling `start`
    /// on a running checker does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the ledger cannot be prepared.
    pub async fn start(&mut self) -> Result<()> {
        if !self.scheduler.is_empty() {
            warn!("Mail checker already started");
            return Ok(());
        }
        self.ensure_schema().await?;

        let period = self.config.sync.check_period;
        for (index, mailbox) in self.config.mailboxes.iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let mailbox = Arc::new(mailbox.clone());
            self.scheduler.schedule(
                mailbox.identity(),
                Scheduler::stagger_offset(index, period),
                period,
                move || {
                    let shared = Arc::clone(&shared);
                    let mailbox = Arc::clone(&mailbox);
                    async move {
                        shared.run_cycle(&mailbox).await;
                    }
                },
            );
        }

        info!(
            mailboxes = self.config.mailboxes.len(),
            backend = self.shared.ledger.backend(),
            "Mail checker started"
        );
        Ok(())
    }

    /// Run one cycle for `mailbox` right away, outside its timer.
    ///
    /// The outcome is published as events like a scheduled cycle. Returns the
    /// number of messages delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMailbox`] if `mailbox` is not configured.
    pub async fn check_now(&self, mailbox: &MailboxIdentity) -> Result<usize> {
        let config = self.mailbox(mailbox)?;
        Ok(self.shared.run_cycle(config).await)
    }

    /// Look up a configured mailbox by user name.
    #[must_use]
    pub fn find_mailbox(&self, user: &str) -> Option<&MailboxConfig> {
        self.config.mailboxes.iter().find(|m| m.user == user)
    }

    fn mailbox(&self, identity: &MailboxIdentity) -> Result<&MailboxConfig> {
        self.config
            .mailboxes
            .iter()
            .find(|m| m.identity() == *identity)
            .ok_or_else(|| Error::UnknownMailbox(identity.to_string()))
    }

    /// Forget deliveries of `mailbox` recorded within `[from, to]`.
    ///
    /// Messages still on the server are delivered again on the mailbox's
    /// next cycle. Publishes [`SyncEvent::Unprocessed`] on success and
    /// [`SyncEvent::Error`] on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unprocess`] wrapping the cause.
    pub async fn unprocess(
        &self,
        mailbox: &MailboxIdentity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        match self.remove_deliveries(mailbox, from, to).await {
            Ok(count) => {
                info!(mailbox = %mailbox, %from, %to, count, "Unprocessed deliveries");
                self.shared.emit(SyncEvent::Unprocessed {
                    mailbox: mailbox.clone(),
                    count,
                });
                Ok(count)
            }
            Err(e) => {
                let e = Arc::new(e);
                error!(mailbox = %mailbox, error = %e, "Unprocess failed");
                self.shared.emit(SyncEvent::Error {
                    mailbox: mailbox.clone(),
                    error: Arc::clone(&e),
                });
                Err(Error::Unprocess(e))
            }
        }
    }

    /// [`unprocess`](Self::unprocess) for the mailbox configured with `user`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMailbox`] if no mailbox has that user, or
    /// [`Error::Unprocess`] if the ledger operation fails.
    pub async fn unprocess_user(
        &self,
        user: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        let identity = self
            .find_mailbox(user)
            .map(MailboxConfig::identity)
            .ok_or_else(|| Error::UnknownMailbox(user.to_string()))?;
        self.unprocess(&identity, from, to).await
    }

    async fn remove_deliveries(
        &self,
        mailbox: &MailboxIdentity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        self.mailbox(mailbox)?;
        let key = mailbox.ledger_key();
        let ledger = &self.shared.ledger;

        let records = ledger
            .records_by_date_range(&key, from, to)
            .await
            .map_err(Error::LedgerRead)?;
        for record in &records {
            debug!(
                mailbox = %key,
                message_id = %record.message_id,
                delivered_at = %record.delivered_at,
                "Unprocessing delivery"
            );
        }

        ledger
            .delete_by_date_range(&key, from, to)
            .await
            .map_err(Error::LedgerWrite)
    }

    /// Stop every mailbox timer.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{LedgerConfig, SyncConfig, ValidationError};
    use crate::ledger::DocumentLedger;
    use crate::session::{MemoryConnector, MemoryMailbox};
    use std::time::Duration;

    fn mailbox(user: &str) -> MailboxConfig {
        MailboxConfig {
            user: user.to_string(),
            password: "pw".to_string(),
            host: "pop.example.com".to_string(),
            port: 995,
            use_encryption: true,
        }
    }

    fn config(mailboxes: Vec<MailboxConfig>) -> Config {
        Config {
            sync: SyncConfig {
                check_period: Duration::from_secs(60),
                message_chunk_size: 10,
                ledger: LedgerConfig::Document {
                    path: None,
                    namespace: "processedmessage".to_string(),
                },
            },
            mailboxes,
        }
    }

    fn raw(subject: &str) -> String {
        format!("From: a@example.com\r\nSubject: {subject}\r\n\r\nhi\r\n")
    }

    fn checker(
        mailboxes: Vec<MailboxConfig>,
        connector: MemoryConnector,
    ) -> (MailChecker, UnboundedReceiver<SyncEvent>) {
        MailChecker::new(
            config(mailboxes),
            Arc::new(DocumentLedger::in_memory("processedmessage")),
            Arc::new(connector),
            Arc::new(MimeParser),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config(vec![mailbox("")]);
        cfg.sync.message_chunk_size = 0;
        let result = MailChecker::new(
            cfg,
            Arc::new(DocumentLedger::in_memory("processedmessage")),
            Arc::new(MemoryConnector::new()),
            Arc::new(MimeParser),
        );

        let Err(Error::Configuration(errors)) = result else {
            panic!("expected configuration error");
        };
        assert!(errors.contains(&ValidationError::ZeroChunkSize));
        assert!(errors.contains(&ValidationError::EmptyUser(0)));
    }

    #[tokio::test]
    async fn test_check_now_emits_data_once() {
        let server = MemoryMailbox::new();
        server.push("A", raw("hello"));
        let connector = MemoryConnector::new();
        connector.insert(&mailbox("dave").identity(), server);
        let (mut checker, mut events) = checker(vec![mailbox("dave")], connector);
        checker.ensure_schema().await.unwrap();

        let identity = mailbox("dave").identity();
        assert_eq!(checker.check_now(&identity).await.unwrap(), 1);
        assert_eq!(checker.check_now(&identity).await.unwrap(), 0);

        let Some(SyncEvent::Data { mailbox, messages }) = events.recv().await else {
            panic!("expected data event");
        };
        assert_eq!(mailbox, identity);
        assert_eq!(messages[0].subject.as_deref(), Some("hello"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cycle_error_event() {
        let server = MemoryMailbox::new();
        server.set_fail_open(true);
        let connector = MemoryConnector::new();
        connector.insert(&mailbox("erin").identity(), server);
        let (checker, mut events) = checker(vec![mailbox("erin")], connector);

        checker
            .check_now(&mailbox("erin").identity())
            .await
            .unwrap();

        let Some(SyncEvent::Error { error, .. }) = events.recv().await else {
            panic!("expected error event");
        };
        assert!(matches!(*error, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_unknown_mailbox() {
        let (checker, _events) = checker(vec![mailbox("frank")], MemoryConnector::new());

        let result = checker.check_now(&mailbox("nobody").identity()).await;
        assert!(matches!(result, Err(Error::UnknownMailbox(_))));

        let result = checker
            .unprocess_user("nobody", DateTime::<Utc>::MIN_UTC, Utc::now())
            .await;
        assert!(matches!(result, Err(Error::UnknownMailbox(_))));
    }

    #[tokio::test]
    async fn test_unprocess_emits_count() {
        let server = MemoryMailbox::new();
        server.push("A", raw("a"));
        server.push("B", raw("b"));
        let connector = MemoryConnector::new();
        connector.insert(&mailbox("gina").identity(), server);
        let (mut checker, mut events) = checker(vec![mailbox("gina")], connector);
        checker.ensure_schema().await.unwrap();

        let identity = mailbox("gina").identity();
        checker.check_now(&identity).await.unwrap();
        let _ = events.recv().await;

        let count = checker
            .unprocess_user("gina", DateTime::<Utc>::MIN_UTC, Utc::now())
            .await
            .unwrap();
        assert_eq!(count, 2);

        let Some(SyncEvent::Unprocessed { mailbox, count }) = events.recv().await else {
            panic!("expected unprocessed event");
        };
        assert_eq!(mailbox, identity);
        assert_eq!(count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_schedules_every_mailbox() {
        let (mut checker, _events) =
            checker(vec![mailbox("a"), mailbox("b")], MemoryConnector::new());
        checker.start().await.unwrap();
        assert_eq!(checker.scheduler().len(), 2);

        checker.start().await.unwrap();
        assert_eq!(checker.scheduler().len(), 2);

        checker.shutdown();
        assert!(checker.scheduler().is_empty());
    }
}
