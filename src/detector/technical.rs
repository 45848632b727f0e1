//! Deterministic header and URL checks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::analysis::headers::{AuthResults, domain_from_email, domain_from_url, is_same_org};
use crate::analysis::urls::extract_urls;
use crate::detector::{Detector, EmailContent};
use crate::model::DetectorResult;
use crate::probe::{ProbeOutcome, UrlProbe};

/// Header and URL evidence: Reply-To mismatch, SPF/DKIM/DMARC policy, and
/// per-URL sandbox probing. Sub-check severities sum; the total clamps to 100.
pub struct TechnicalDetector {
    probe: Arc<dyn UrlProbe>,
    probe_timeout: Duration,
}

impl TechnicalDetector {
    pub fn new(probe: Arc<dyn UrlProbe>, probe_timeout: Duration) -> Self {
        Self {
            probe,
            probe_timeout,
        }
    }

    /// Reply-To/From domain mismatch: +30.
    fn check_reply_to(&self, email: &EmailContent) -> Option<(u8, String)> {
        let from = email.header("From")?;
        let reply_to = email.header("Reply-To")?;
        if from.is_empty() || reply_to.is_empty() {
            return None;
        }

        let from_domain = domain_from_email(from);
        let reply_domain = domain_from_email(reply_to);
        if from_domain.is_empty() || reply_domain.is_empty() || from_domain == reply_domain {
            return None;
        }

        Some((30, format!("Reply-To Mismatch (From: {from})")))
    }

    /// SPF/DKIM/DMARC statuses from `Authentication-Results`.
    fn check_auth(&self, email: &EmailContent) -> (u8, Vec<String>) {
        let auth = AuthResults::parse(email.header("Authentication-Results").unwrap_or(""));

        let mut score = 0u8;
        let mut reasons = Vec::new();

        if auth.spf != "pass" {
            score += 25;
            reasons.push(format!("SPF Validation Failed: {}", auth.spf));
            warn!(status = %auth.spf, "SPF check failed");
        }
        if auth.dkim != "pass" {
            score += 20;
            reasons.push(format!("DKIM Signature Invalid: {}", auth.dkim));
        }
        if matches!(auth.dmarc.as_str(), "fail" | "quarantine") {
            score += 40;
            reasons.push(format!("DMARC Policy Violation: {}", auth.dmarc));
        }

        (score, reasons)
    }

    /// Probe every distinct URL in the body.
    ///
    /// Each distinct finding reason contributes its severity at most once per
    /// email, no matter how many URLs trigger it, and the reason text is
    /// emitted at most once. Timeouts and network noise contribute nothing.
    async fn check_urls(&self, email: &EmailContent) -> (u32, Vec<String>) {
        let urls = extract_urls(&email.body);
        if urls.is_empty() {
            return (0, Vec::new());
        }
        debug!(count = urls.len(), "Probing URLs");

        let sender_domain = email
            .header("From")
            .map(domain_from_email)
            .unwrap_or_default();

        let mut score = 0u32;
        let mut reasons = Vec::new();
        let mut applied_penalties: HashSet<String> = HashSet::new();

        for url in urls {
            let outcome = match tokio::time::timeout(self.probe_timeout, self.probe.probe(&url))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => ProbeOutcome::Timeout,
            };

            let finding = match outcome {
                ProbeOutcome::Finding(f) => f,
                ProbeOutcome::Clean | ProbeOutcome::Skipped => continue,
                ProbeOutcome::Timeout | ProbeOutcome::Inconclusive => {
                    debug!(url = %url, "Probe inconclusive");
                    continue;
                }
            };

            // Source-destination consistency: a redirect chain that lands on
            // the sender's own domain (or a subdomain) is not penalized.
            if finding.reason == "Excessive Redirects" {
                if let Some(final_url) = &finding.final_url {
                    let final_domain = domain_from_url(final_url);
                    if is_same_org(&final_domain, &sender_domain) {
                        debug!(
                            sender = %sender_domain,
                            target = %final_domain,
                            "Consistency check passed, redirect not penalized"
                        );
                        continue;
                    }
                }
            }

            if applied_penalties.insert(finding.reason.clone()) {
                score += finding.severity as u32;
                reasons.push(format!("URL: {} ({})", finding.reason, finding.detail));
            }
        }

        (score, reasons)
    }
}

#[async_trait]
impl Detector for TechnicalDetector {
    fn name(&self) -> &'static str {
        "Technical"
    }

    async fn analyze(&self, email: &EmailContent) -> DetectorResult {
        let mut score = 0u32;
        let mut reasons = Vec::new();

        if let Some((s, reason)) = self.check_reply_to(email) {
            score += s as u32;
            reasons.push(reason);
        }

        let (auth_score, auth_reasons) = self.check_auth(email);
        score += auth_score as u32;
        reasons.extend(auth_reasons);

        let (url_score, url_reasons) = self.check_urls(email).await;
        score += url_score;
        reasons.extend(url_reasons);

        DetectorResult {
            risk_score: score.min(100) as u8,
            reasons,
        }
    }
}
