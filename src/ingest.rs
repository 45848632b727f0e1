//! Ingestion boundary — pure I/O adapters that feed the job queue.
//!
//! The engine places no constraint on where messages come from (API polling,
//! file drop, …), only on the `(id, headers, body)` shape. Mail-provider
//! authentication and retrieval live behind [`EmailSource`] implementations
//! outside this crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::IngestError;
use crate::store::JobStore;

/// One message as produced by an ingestion collaborator.
#[derive(Debug, Clone)]
pub struct RawEmail {
    /// Globally unique, stable across re-ingestion.
    pub id: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Ingestion collaborator — fetches new messages from somewhere.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Fetch messages not yet handed over. Re-delivering a message is fine:
    /// the store deduplicates on id.
    async fn fetch_new(&self) -> Result<Vec<RawEmail>, IngestError>;
}

/// Spawn a background task that polls a source and pushes into the store.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_ingest_poller(
    source: Arc<dyn EmailSource>,
    store: Arc<dyn JobStore>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(source = source.name(), "Ingest poller started");
        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Ingest poller shutting down");
                return;
            }

            let emails = match source.fetch_new().await {
                Ok(emails) => emails,
                Err(e) => {
                    error!(source = source.name(), error = %e, "Fetch failed");
                    continue;
                }
            };

            for email in emails {
                match store.push(&email.id, email.headers, email.body).await {
                    Ok(true) => debug!(id = %email.id, "Ingested"),
                    Ok(false) => debug!(id = %email.id, "Already queued"),
                    Err(e) => error!(id = %email.id, error = %e, "Push failed"),
                }
            }
        }
    });

    (handle, shutdown_flag)
}

/// Fixed in-memory source for the demo binary and tests.
pub struct StaticSource {
    emails: Vec<RawEmail>,
}

impl StaticSource {
    pub fn new(emails: Vec<RawEmail>) -> Self {
        Self { emails }
    }

    /// Three canned messages: a benign newsletter, a spoofed wire request,
    /// and an all-auth-fail credential lure.
    pub fn samples() -> Self {
        let email = |id: &str, headers: &[(&str, &str)], body: &str| RawEmail {
            id: id.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        };

        Self::new(vec![
            email(
                "email_001",
                &[
                    ("From", "newsletter@marketing.com"),
                    ("Reply-To", "newsletter@marketing.com"),
                    ("Subject", "Weekly deals"),
                    ("Authentication-Results", "spf=pass dkim=pass dmarc=pass"),
                ],
                "Check out our weekly deals.",
            ),
            email(
                "email_002",
                &[
                    ("From", "ceo@company.com"),
                    ("Reply-To", "ceo@gmail.com"),
                    ("Subject", "Quick favor"),
                    ("Authentication-Results", "spf=pass dkim=pass dmarc=pass"),
                ],
                "Please wire funds immediately.",
            ),
            email(
                "email_003",
                &[
                    ("From", "support@bank.com"),
                    ("Reply-To", "support@bank.com"),
                    ("Subject", "Account compromised"),
                    ("Authentication-Results", "spf=fail dkim=fail dmarc=fail"),
                ],
                "Your account is compromised. Take immediate action and verify account.",
            ),
        ])
    }
}

#[async_trait]
impl EmailSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_new(&self) -> Result<Vec<RawEmail>, IngestError> {
        Ok(self.emails.clone())
    }
}
