//! POP3 implementation of the session contract.

use async_trait::async_trait;
use mailcheck_pop3::connection::connect;
use mailcheck_pop3::{Client, Pop3Stream, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{MailboxSession, ServerMessageRef, SessionConnector, SessionError, SessionResult};
use crate::config::MailboxConfig;

type Pop3Client = Client<Pop3Stream, Transaction>;

impl From<mailcheck_pop3::Error> for SessionError {
    fn from(err: mailcheck_pop3::Error) -> Self {
        match err {
            mailcheck_pop3::Error::Auth(message) => Self::Authentication(message),
            e if e.is_transport() => Self::Connection(e.to_string()),
            e => Self::Operation(e.to_string()),
        }
    }
}

/// Opens POP3 sessions, with implicit TLS when the mailbox asks for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pop3Connector;

#[async_trait]
impl SessionConnector for Pop3Connector {
    async fn open(&self, mailbox: &MailboxConfig) -> SessionResult<Box<dyn MailboxSession>> {
        info!(mailbox = %mailbox.identity(), tls = mailbox.use_encryption, "Connecting");

        let stream = connect(&mailbox.host, mailbox.port, mailbox.use_encryption)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        let client = Client::from_stream(stream)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        let client = client.login(&mailbox.user, &mailbox.password).await?;

        Ok(Box::new(Pop3Session {
            user: mailbox.user.clone(),
            client: Mutex::new(Some(client)),
        }))
    }
}

/// One authenticated POP3 connection.
///
/// POP3 answers one command at a time, so concurrent callers queue on the
/// client lock.
pub struct Pop3Session {
    user: String,
    client: Mutex<Option<Pop3Client>>,
}

#[async_trait]
impl MailboxSession for Pop3Session {
    async fn list(&self) -> SessionResult<Vec<ServerMessageRef>> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(SessionError::Closed)?;

        let listing = client.uidl().await?;
        debug!(user = %self.user, count = listing.len(), "UIDL listing received");

        Ok(listing
            .into_iter()
            .map(|entry| ServerMessageRef::new(entry.message_number, entry.unique_id))
            .collect())
    }

    async fn fetch(&self, retrieve_id: u32) -> SessionResult<Vec<u8>> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(SessionError::Closed)?;

        debug!(user = %self.user, retrieve_id, "Fetching message via POP3");
        Ok(client.retr(retrieve_id).await?)
    }

    async fn close(&self) -> SessionResult<()> {
        let client = self.client.lock().await.take().ok_or(SessionError::Closed)?;
        info!(user = %self.user, "Closing session");
        client.quit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let auth: SessionError = mailcheck_pop3::Error::Auth("bad password".into()).into();
        assert!(matches!(auth, SessionError::Authentication(_)));

        let closed: SessionError = mailcheck_pop3::Error::ConnectionClosed.into();
        assert!(matches!(closed, SessionError::Connection(_)));

        let server: SessionError = mailcheck_pop3::Error::server("no such message").into();
        assert!(matches!(server, SessionError::Operation(_)));
    }
}
