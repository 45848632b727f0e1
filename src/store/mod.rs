//! Job persistence — durable queue of analysis jobs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{EmailJob, FusionReport};

pub mod json_file;

pub use json_file::JsonFileStore;

/// Durable, single-writer-at-a-time queue of jobs keyed by id.
///
/// All mutations are serialized at the store boundary so a claim can never
/// race another claim, and a reader never observes a half-written record.
/// Instantiated once per process and passed by reference — never an ambient
/// global.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job. Returns `false` (not an error) when a job
    /// with this id already exists — first write wins.
    async fn push(
        &self,
        id: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<bool, StoreError>;

    /// Atomically claim the oldest pending job (by `created_at`), moving it
    /// to `Analyzing`. `None` when nothing is pending. Claim and transition
    /// are one atomic unit: two concurrent callers never get the same job.
    async fn claim_next(&self) -> Result<Option<EmailJob>, StoreError>;

    /// Mark a job completed, store its report, and scrub `headers`/`body`.
    async fn complete(&self, id: &str, report: FusionReport) -> Result<(), StoreError>;

    /// Mark a job failed. Content is kept for diagnosis.
    async fn fail(&self, id: &str) -> Result<(), StoreError>;

    /// All completed jobs, newest `created_at` first.
    async fn list_completed(&self) -> Result<Vec<EmailJob>, StoreError>;

    /// Look up one job by id.
    async fn get(&self, id: &str) -> Result<Option<EmailJob>, StoreError>;

    /// Administrative wipe to empty state.
    async fn clear(&self) -> Result<(), StoreError>;
}
