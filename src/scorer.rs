//! External ML scorer boundary.
//!
//! The pretrained text classifier is consumed only as "given body text,
//! return a phishing probability in [0, 1]". It may be slow or absent;
//! callers treat every error here as "no signal", never as a crash.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ScorerError;

/// ML scorer collaborator.
#[async_trait]
pub trait PhishScorer: Send + Sync {
    /// Score `text`, returning a phishing probability in `[0, 1]`.
    async fn score(&self, text: &str) -> Result<f64, ScorerError>;
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    probability: f64,
}

/// Scorer backed by a remote inference endpoint.
///
/// Posts `{"text": …}` and expects `{"probability": 0.93}` back.
pub struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpScorer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl PhishScorer for HttpScorer {
    async fn score(&self, text: &str) -> Result<f64, ScorerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScorerError::Timeout(self.timeout)
                } else {
                    ScorerError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ScorerError::RequestFailed(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ScoreResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::InvalidResponse(e.to_string()))?;

        if !(0.0..=1.0).contains(&parsed.probability) || parsed.probability.is_nan() {
            return Err(ScorerError::OutOfRange(parsed.probability));
        }

        Ok(parsed.probability)
    }
}
