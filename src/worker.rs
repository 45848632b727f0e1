//! Worker loop — single logical consumer of the job queue.
//!
//! Per-job state machine: `Pending → Analyzing → {Completed | Failed}`.
//! `Failed` is terminal here: automatic requeue of a poison job would loop
//! forever, so operators requeue by policy instead. One job's failure never
//! terminates the loop, and store I/O trouble backs off and retries rather
//! than exiting.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::detector::EmailContent;
use crate::fusion::FusionEngine;
use crate::model::EmailJob;
use crate::store::JobStore;

/// Spawn the background analysis worker.
///
/// Returns a `JoinHandle` and a shutdown flag. Setting the flag stops the
/// worker from claiming new jobs; the in-flight job finishes first.
pub fn spawn_analysis_worker(
    store: Arc<dyn JobStore>,
    engine: Arc<FusionEngine>,
    config: EngineConfig,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Analysis worker started");
        let mut backoff = config.store_backoff_base;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Analysis worker shutting down");
                return;
            }

            match store.claim_next().await {
                Ok(Some(job)) => {
                    backoff = config.store_backoff_base;
                    process_job(&store, &engine, &config, job).await;
                }
                Ok(None) => {
                    backoff = config.store_backoff_base;
                    tokio::time::sleep(config.poll_interval).await;
                }
                Err(e) => {
                    // Transient store I/O must not halt the service.
                    error!(error = %e, delay = ?backoff, "Claim failed, backing off");
                    tokio::time::sleep(with_jitter(backoff)).await;
                    backoff = (backoff * 2).min(config.store_backoff_max);
                }
            }
        }
    });

    (handle, shutdown_flag)
}

/// Run one claimed job through the fusion engine and persist the outcome.
async fn process_job(
    store: &Arc<dyn JobStore>,
    engine: &Arc<FusionEngine>,
    config: &EngineConfig,
    job: EmailJob,
) {
    let id = job.id.clone();
    info!(id = %id, "Worker picked up job");

    let content = match (job.headers, job.body) {
        (Some(headers), Some(body)) => EmailContent {
            id: id.clone(),
            headers,
            body,
        },
        _ => {
            warn!(id = %id, "Claimed job has no content, marking failed");
            mark_failed(store, config, &id).await;
            return;
        }
    };

    // Spawned so a panic anywhere in the pipeline surfaces as a JoinError
    // and fails this job instead of killing the loop.
    let engine = Arc::clone(engine);
    let outcome = tokio::spawn(async move { engine.process(&content).await }).await;

    match outcome {
        Ok(report) => {
            info!(
                id = %id,
                score = report.score,
                verdict = %report.verdict,
                primary = %report.primary_reason,
                "Analysis completed"
            );
            if let Err(e) = retry_store(config, || store.complete(&id, report.clone())).await {
                error!(id = %id, error = %e, "Could not persist report; job stays claimed for restart recovery");
            }
        }
        Err(e) => {
            error!(id = %id, error = %e, "Analysis task failed");
            mark_failed(store, config, &id).await;
        }
    }
}

async fn mark_failed(store: &Arc<dyn JobStore>, config: &EngineConfig, id: &str) {
    if let Err(e) = retry_store(config, || store.fail(id)).await {
        error!(id = %id, error = %e, "Could not mark job failed");
    }
}

/// Retry a store mutation with exponential backoff and jitter.
///
/// Gives up after a few attempts; startup recovery covers whatever is left
/// stuck in `Analyzing`.
async fn retry_store<F, Fut, T>(config: &EngineConfig, mut op: F) -> Result<T, crate::error::StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, crate::error::StoreError>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut delay = config.store_backoff_base;

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                warn!(error = %e, attempt, "Store mutation failed, retrying");
                tokio::time::sleep(with_jitter(delay)).await;
                delay = (delay * 2).min(config.store_backoff_max);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &crate::error::StoreError) -> bool {
    matches!(
        e,
        crate::error::StoreError::Io { .. } | crate::error::StoreError::Serialization(_)
    )
}

/// Full jitter on top of the base delay, against thundering-herd retries.
fn with_jitter(base: Duration) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..1000);
    base + Duration::from_millis(jitter_ms)
}
