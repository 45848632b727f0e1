//! Core data model: jobs, detector results, and fusion reports.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed by the worker.
    Pending,
    /// Claimed — analysis in flight.
    Analyzing,
    /// Analysis finished, report stored, content scrubbed.
    Completed,
    /// Analysis failed. Terminal; operators requeue by policy, never automatically.
    Failed,
}

impl JobStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Analyzing)
                | (Analyzing, Completed)
                | (Analyzing, Failed)
                // Startup recovery after a crashed run.
                | (Analyzing, Pending)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One email message tracked through the analysis queue.
///
/// `headers` and `body` are scrubbed to `None` on completion — the report is
/// the only retained record of content. Failed jobs keep their content for
/// diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    /// Globally unique, stable across re-ingestion (dedup key).
    pub id: String,
    /// Raw header map as ingested. `None` once completed.
    pub headers: Option<HashMap<String, String>>,
    /// Plain-text body. `None` once completed.
    pub body: Option<String>,
    pub status: JobStatus,
    /// Fixes FIFO processing order.
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Present once `Completed`.
    pub report: Option<FusionReport>,
}

impl EmailJob {
    /// Create a fresh pending job.
    pub fn new(id: impl Into<String>, headers: HashMap<String, String>, body: String) -> Self {
        Self {
            id: id.into(),
            headers: Some(headers),
            body: Some(body),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
            report: None,
        }
    }
}

/// Partial verdict from a single detector. Transient — never persisted alone.
///
/// Reason order is significant: the first reason is treated as primary when
/// the report is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorResult {
    /// 0..=100, clamped by the detector.
    pub risk_score: u8,
    pub reasons: Vec<String>,
}

impl DetectorResult {
    /// Empty result — zero score, no reasons.
    pub fn clean() -> Self {
        Self::default()
    }
}

/// Final classification, a pure function of score and the two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Safe,
    Suspicious,
    Phishing,
}

impl Verdict {
    /// Derive the verdict from a score and the configured thresholds.
    pub fn from_score(score: u8, medium_threshold: u8, high_threshold: u8) -> Self {
        if score >= high_threshold {
            Self::Phishing
        } else if score >= medium_threshold {
            Self::Suspicious
        } else {
            Self::Safe
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Safe => "SAFE",
            Self::Suspicious => "SUSPICIOUS",
            Self::Phishing => "PHISHING",
        };
        write!(f, "{s}")
    }
}

/// Persisted outcome of one fused analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionReport {
    /// 0..=100, always produced by the fusion algorithm — never set elsewhere.
    pub score: u8,
    pub verdict: Verdict,
    /// First entry of `reasons`, or `"Clean"` if empty.
    pub primary_reason: String,
    /// Ordered reasons from all detectors plus any synthetic elevation reasons.
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_valid() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Analyzing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Analyzing));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Analyzing.is_terminal());
    }

    #[test]
    fn status_serde_roundtrip() {
        let json = serde_json::to_string(&JobStatus::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
        let parsed: JobStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JobStatus::Analyzing);
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::from_score(0, 40, 70), Verdict::Safe);
        assert_eq!(Verdict::from_score(39, 40, 70), Verdict::Safe);
        assert_eq!(Verdict::from_score(40, 40, 70), Verdict::Suspicious);
        assert_eq!(Verdict::from_score(69, 40, 70), Verdict::Suspicious);
        assert_eq!(Verdict::from_score(70, 40, 70), Verdict::Phishing);
        assert_eq!(Verdict::from_score(100, 40, 70), Verdict::Phishing);
    }

    #[test]
    fn verdict_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Verdict::Phishing).unwrap(),
            "\"PHISHING\""
        );
        assert_eq!(serde_json::to_string(&Verdict::Safe).unwrap(), "\"SAFE\"");
    }

    #[test]
    fn job_serde_roundtrip_preserves_shape() {
        let mut headers = HashMap::new();
        headers.insert("From".to_string(), "a@b.com".to_string());
        let job = EmailJob::new("job-1", headers, "hello".to_string());

        let json = serde_json::to_string(&job).unwrap();
        let parsed: EmailJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "job-1");
        assert_eq!(parsed.status, JobStatus::Pending);
        assert_eq!(parsed.body.as_deref(), Some("hello"));
        assert!(parsed.report.is_none());
    }
}
