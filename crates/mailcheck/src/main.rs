//! `mailcheck` - poll mailboxes and print every new message once.
//!
//! Delivered messages are written to stdout as JSON lines; logs go to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::io::Write;

use anyhow::Context;
use mailcheck_core::{Config, MailChecker, SyncEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Action;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailcheck=info,mailcheck_core=info,mailcheck_pop3=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e:#}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load(&command.config)
        .await
        .with_context(|| format!("Failed to load {}", command.config.display()))?;
    let (mut checker, events) = MailChecker::from_config(config).await?;

    match command.action {
        Action::Run => run(checker, events).await,
        Action::Once => {
            checker.ensure_schema().await?;
            once(&checker, events).await
        }
        Action::Unprocess { user, from, to } => {
            checker.ensure_schema().await?;
            let count = checker.unprocess_user(&user, from, to).await?;
            println!("{count}");
            Ok(())
        }
    }
}

/// Poll until Ctrl-C.
async fn run(
    mut checker: MailChecker,
    mut events: UnboundedReceiver<SyncEvent>,
) -> anyhow::Result<()> {
    info!("Starting mailcheck");
    checker.start().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_event(event)?,
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Shutting down");
                break;
            }
        }
    }

    checker.shutdown();
    Ok(())
}

/// Check every mailbox one time, in configuration order.
async fn once(
    checker: &MailChecker,
    mut events: UnboundedReceiver<SyncEvent>,
) -> anyhow::Result<()> {
    for mailbox in &checker.config().mailboxes {
        checker.check_now(&mailbox.identity()).await?;
        while let Ok(event) = events.try_recv() {
            handle_event(event)?;
        }
    }
    Ok(())
}

fn handle_event(event: SyncEvent) -> anyhow::Result<()> {
    match event {
        SyncEvent::Data { mailbox, messages } => {
            let mut out = std::io::stdout().lock();
            for message in messages {
                let line = serde_json::json!({
                    "mailbox": mailbox.to_string(),
                    "message": message,
                });
                writeln!(out, "{line}")?;
            }
            out.flush()?;
        }
        SyncEvent::Error { mailbox, error } => {
            warn!(mailbox = %mailbox, error = %error, "Mailbox check failed");
        }
        SyncEvent::Unprocessed { mailbox, count } => {
            info!(mailbox = %mailbox, count, "Unprocessed");
        }
    }
    Ok(())
}
