//! Configuration types.

use std::time::Duration;

/// Engine configuration.
///
/// Thresholds and timeouts are configuration, not constants — the binary reads
/// env overrides, tests construct variants directly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Score at or above which the verdict is PHISHING.
    pub high_risk_threshold: u8,
    /// Score at or above which the verdict is SUSPICIOUS.
    pub medium_risk_threshold: u8,
    /// Hard timeout for a single URL probe.
    pub probe_timeout: Duration,
    /// Soft-failure boundary for a whole detector call.
    pub detector_timeout: Duration,
    /// Redirect chains strictly longer than this are penalized.
    pub redirect_depth_limit: usize,
    /// Skip the semantic detector when the technical score alone reaches
    /// `early_exit_threshold`. Changes observable output (semantic reasons are
    /// dropped from the report), so it is off by default.
    pub early_exit: bool,
    /// Technical score that triggers the early exit when enabled.
    pub early_exit_threshold: u8,
    /// ML probability above which the AI signal is taken.
    pub scorer_threshold: f64,
    /// Body truncation length for the ML scorer call.
    pub scorer_max_chars: usize,
    /// Worker idle wait between empty polls.
    pub poll_interval: Duration,
    /// Initial backoff after a store I/O failure.
    pub store_backoff_base: Duration,
    /// Backoff ceiling for repeated store failures.
    pub store_backoff_max: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 70,
            medium_risk_threshold: 40,
            probe_timeout: Duration::from_secs(5),
            detector_timeout: Duration::from_secs(30),
            redirect_depth_limit: 4,
            early_exit: false,
            early_exit_threshold: 80,
            scorer_threshold: 0.75,
            scorer_max_chars: 2048,
            poll_interval: Duration::from_secs(1),
            store_backoff_base: Duration::from_secs(2),
            store_backoff_max: Duration::from_secs(60),
        }
    }
}
