//! Keyword/intent scanning plus the external ML scorer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::analysis::text::{IntentScanner, normalize_text};
use crate::detector::{Detector, EmailContent};
use crate::model::DetectorResult;
use crate::scorer::PhishScorer;

/// Body-semantics evidence: pattern categories over normalized text, with an
/// optional ML probability taken as `max(keyword, ai)`.
pub struct SemanticDetector {
    scanner: IntentScanner,
    scorer: Option<Arc<dyn PhishScorer>>,
    /// Probability above which the AI signal is used.
    scorer_threshold: f64,
    /// Body truncation length for the scorer call.
    scorer_max_chars: usize,
}

impl SemanticDetector {
    pub fn new(
        scorer: Option<Arc<dyn PhishScorer>>,
        scorer_threshold: f64,
        scorer_max_chars: usize,
    ) -> Self {
        Self {
            scanner: IntentScanner::new(),
            scorer,
            scorer_threshold,
            scorer_max_chars,
        }
    }

    /// Keyword-only detector, no ML.
    pub fn keyword_only() -> Self {
        Self::new(None, 0.75, 2048)
    }

    /// Truncate on a char boundary for the scorer call.
    fn truncated_body<'a>(&self, body: &'a str) -> &'a str {
        match body.char_indices().nth(self.scorer_max_chars) {
            Some((idx, _)) => &body[..idx],
            None => body,
        }
    }
}

#[async_trait]
impl Detector for SemanticDetector {
    fn name(&self) -> &'static str {
        "Semantic"
    }

    async fn analyze(&self, email: &EmailContent) -> DetectorResult {
        let normalized = normalize_text(&email.body);

        let mut keyword_score = 0u32;
        let mut reasons = Vec::new();
        for hit in self.scanner.scan(&normalized) {
            keyword_score += hit.severity as u32;
            reasons.push(hit.reason);
        }

        let mut score = keyword_score;

        // The scorer sees the *original* body (truncated): normalization is
        // for the regexes, the model handles raw text itself.
        if let Some(scorer) = &self.scorer {
            if !email.body.is_empty() {
                match scorer.score(self.truncated_body(&email.body)).await {
                    Ok(probability) if probability > self.scorer_threshold => {
                        let ai_score = (probability * 100.0).round() as u32;
                        score = score.max(ai_score);
                        reasons.push(format!("AI: High Phishing Probability ({ai_score}%)"));
                        debug!(probability, "AI signal taken");
                    }
                    Ok(probability) => {
                        debug!(probability, "AI probability below threshold");
                    }
                    Err(e) => {
                        // Degrade to keyword-only, never fail the detector.
                        warn!(error = %e, "ML scorer unavailable, keyword score only");
                    }
                }
            }
        }

        DetectorResult {
            risk_score: score.min(100) as u8,
            reasons,
        }
    }
}
