//! Fusion engine — runs the detectors and combines their partial verdicts.
//!
//! Fusion is deterministic given identical detector outputs: all randomness
//! and timing live inside the detectors. Score combination is additive with a
//! cap (cumulative risk from independent signal families), followed by
//! worst-link elevation for the auth-failure + urgency combination. An
//! earlier trust-override variant (zeroing semantic risk on low technical
//! score) was removed upstream as a security regression and is deliberately
//! not implemented.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::detector::{Detector, EmailContent};
use crate::model::{DetectorResult, FusionReport, Verdict};

/// Synthetic reason prepended when auth failure and urgency co-occur.
const ELEVATION_REASON: &str = "CRITICAL: Auth Failure + High Urgency Detected";
/// Floor the score is raised to by the elevation rule.
const ELEVATION_FLOOR: u8 = 85;

/// Orchestrates the technical and semantic detectors into one report.
pub struct FusionEngine {
    technical: Arc<dyn Detector>,
    semantic: Arc<dyn Detector>,
    config: EngineConfig,
}

impl FusionEngine {
    pub fn new(
        technical: Arc<dyn Detector>,
        semantic: Arc<dyn Detector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            technical,
            semantic,
            config,
        }
    }

    /// Analyze one email. Infallible: a failed detector contributes zero
    /// score and a synthetic reason, never an error.
    pub async fn process(&self, email: &EmailContent) -> FusionReport {
        info!(id = %email.id, "Fusion started");

        let (technical, semantic) = if self.config.early_exit {
            // Policy choice, explicitly toggled: a very high technical score
            // skips semantic analysis for latency, dropping its reasons from
            // the report.
            let technical = run_detector(
                Arc::clone(&self.technical),
                email.clone(),
                self.config.detector_timeout,
            )
            .await;
            if technical.risk_score >= self.config.early_exit_threshold {
                info!(
                    id = %email.id,
                    score = technical.risk_score,
                    "Early exit: technical score alone decides"
                );
                return self.assemble(technical.risk_score, technical.reasons, Vec::new());
            }
            let semantic = run_detector(
                Arc::clone(&self.semantic),
                email.clone(),
                self.config.detector_timeout,
            )
            .await;
            (technical, semantic)
        } else {
            tokio::join!(
                run_detector(
                    Arc::clone(&self.technical),
                    email.clone(),
                    self.config.detector_timeout,
                ),
                run_detector(
                    Arc::clone(&self.semantic),
                    email.clone(),
                    self.config.detector_timeout,
                ),
            )
        };

        let combined =
            (technical.risk_score as u32 + semantic.risk_score as u32).min(100) as u8;

        self.assemble(combined, technical.reasons, semantic.reasons)
    }

    /// Apply elevation and thresholding, then build the report.
    fn assemble(
        &self,
        mut score: u8,
        technical_reasons: Vec<String>,
        semantic_reasons: Vec<String>,
    ) -> FusionReport {
        let mut reasons = technical_reasons;
        let has_auth_failure = reasons.iter().any(|r| {
            r.contains("Validation Failed")
                || r.contains("Signature Invalid")
                || r.contains("Policy Violation")
        });
        let has_urgency = semantic_reasons.iter().any(|r| r.contains("Urgency Detected"));
        reasons.extend(semantic_reasons);

        // Worst-link elevation: only when it actually raises the score, so
        // the synthetic reason is never a duplicate signal.
        if has_auth_failure && has_urgency && score < ELEVATION_FLOOR {
            score = ELEVATION_FLOOR;
            reasons.insert(0, ELEVATION_REASON.to_string());
        }

        let verdict = Verdict::from_score(
            score,
            self.config.medium_risk_threshold,
            self.config.high_risk_threshold,
        );
        let primary_reason = reasons
            .first()
            .cloned()
            .unwrap_or_else(|| "Clean".to_string());

        FusionReport {
            score,
            verdict,
            primary_reason,
            reasons,
        }
    }
}

/// Run one detector inside its timeout, absorbing panics.
///
/// Timeout or panic yields a zero-score result with a single synthetic
/// failure reason — the other detector is never blocked or invalidated.
async fn run_detector(
    detector: Arc<dyn Detector>,
    email: EmailContent,
    timeout: Duration,
) -> DetectorResult {
    let name = detector.name();
    let task = tokio::spawn(async move { detector.analyze(&email).await });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            error!(detector = name, error = %join_err, "Detector task failed");
            failure_result(name)
        }
        Err(_) => {
            warn!(detector = name, ?timeout, "Detector timed out");
            failure_result(name)
        }
    }
}

fn failure_result(name: &str) -> DetectorResult {
    DetectorResult {
        risk_score: 0,
        reasons: vec![format!("Error: {name} Analysis Failed")],
    }
}
