use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mailwarden::config::EngineConfig;
use mailwarden::detector::{SemanticDetector, TechnicalDetector};
use mailwarden::fusion::FusionEngine;
use mailwarden::ingest::{StaticSource, spawn_ingest_poller};
use mailwarden::probe::HttpProbe;
use mailwarden::scorer::{HttpScorer, PhishScorer};
use mailwarden::store::{JobStore, JsonFileStore};
use mailwarden::worker::spawn_analysis_worker;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let defaults = EngineConfig::default();
    let config = EngineConfig {
        high_risk_threshold: env_or("MAILWARDEN_HIGH_THRESHOLD", defaults.high_risk_threshold),
        medium_risk_threshold: env_or(
            "MAILWARDEN_MEDIUM_THRESHOLD",
            defaults.medium_risk_threshold,
        ),
        early_exit: env_or("MAILWARDEN_EARLY_EXIT", defaults.early_exit),
        ..defaults
    };

    let queue_path =
        std::env::var("MAILWARDEN_DB_PATH").unwrap_or_else(|_| "./data/queue.json".to_string());

    eprintln!("📬 Mailwarden v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Queue: {}", queue_path);
    eprintln!(
        "   Verdicts: SUSPICIOUS >= {}, PHISHING >= {}",
        config.medium_risk_threshold, config.high_risk_threshold
    );

    // Opening the store also recovers jobs left mid-analysis by a crash
    let store: Arc<dyn JobStore> = Arc::new(JsonFileStore::open(&queue_path).await?);

    let probe = Arc::new(HttpProbe::new(
        config.probe_timeout,
        config.redirect_depth_limit,
    )?);
    let technical = Arc::new(TechnicalDetector::new(probe, config.probe_timeout));

    // The ML scorer is optional: without an endpoint the semantic detector
    // runs keyword-only.
    let scorer: Option<Arc<dyn PhishScorer>> = match std::env::var("MAILWARDEN_SCORER_URL") {
        Ok(url) => {
            eprintln!("   Scorer: {}", url);
            Some(Arc::new(HttpScorer::new(url, Duration::from_secs(10))?))
        }
        Err(_) => {
            eprintln!("   Scorer: disabled (keyword analysis only)");
            None
        }
    };
    let semantic = Arc::new(SemanticDetector::new(
        scorer,
        config.scorer_threshold,
        config.scorer_max_chars,
    ));

    let engine = Arc::new(FusionEngine::new(technical, semantic, config.clone()));

    let (worker_handle, worker_shutdown) =
        spawn_analysis_worker(Arc::clone(&store), engine, config.clone());

    let source = Arc::new(StaticSource::samples());
    let (ingest_handle, ingest_shutdown) =
        spawn_ingest_poller(source, Arc::clone(&store), Duration::from_secs(30));

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");

    ingest_shutdown.store(true, Ordering::Relaxed);
    worker_shutdown.store(true, Ordering::Relaxed);
    ingest_handle.await?;
    worker_handle.await?;

    for job in store.list_completed().await? {
        if let Some(report) = &job.report {
            eprintln!(
                "   {} => {} ({}) — {}",
                job.id, report.verdict, report.score, report.primary_reason
            );
        }
    }

    Ok(())
}
