//! Detector contract and the email view detectors analyze.
//!
//! Every detector — technical, semantic, future ones — implements one
//! interface returning a fixed `{score, reasons}` record. Historical variants
//! distinguished detectors by field-presence checks; the trait replaces that.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::DetectorResult;

pub mod semantic;
pub mod technical;

pub use semantic::SemanticDetector;
pub use technical::TechnicalDetector;

/// Normalized email data handed to detectors.
#[derive(Debug, Clone, Default)]
pub struct EmailContent {
    pub id: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl EmailContent {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A component producing an independent partial risk assessment from one
/// evidence family.
///
/// `analyze` never errors: internal sub-check failures are absorbed inside
/// the detector and contribute zero score plus no reason. Whole-call timeouts
/// and panics are the fusion engine's concern.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Display name used in synthetic failure reasons and logs.
    fn name(&self) -> &'static str;

    async fn analyze(&self, email: &EmailContent) -> DetectorResult;
}
