//! JSON-file store backend.
//!
//! Jobs live in memory behind a single async Mutex and are persisted to one
//! pretty-printed JSON file on every mutation. Using `Mutex` (not `RwLock`)
//! keeps the single-writer discipline literal: claim-and-transition happens
//! as one atomic unit under the lock. Writes go to a temp file first and are
//! renamed into place, so a concurrent reader of the file never sees a
//! half-written record. The format is deliberately human-inspectable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::{EmailJob, FusionReport, JobStatus};
use crate::store::JobStore;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    jobs: Mutex<Vec<EmailJob>>,
}

impl JsonFileStore {
    /// Open (or create) the store file and run startup recovery: any job left
    /// `Analyzing` by a crashed run is reset to `Pending` before the store is
    /// handed out, so no job stays unclaimed because a worker died mid-flight.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_err(&path, e))?;
            }
        }

        let mut jobs = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice::<Vec<EmailJob>>(&bytes).map_err(|e| {
                    StoreError::Corrupt {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(io_err(&path, e)),
        };

        let mut recovered = 0usize;
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Analyzing {
                job.status = JobStatus::Pending;
                job.updated_at = Some(chrono::Utc::now());
                recovered += 1;
            }
        }

        let store = Self {
            path,
            jobs: Mutex::new(jobs),
        };

        if recovered > 0 {
            warn!(recovered, "Reset in-flight jobs from a previous run to pending");
            let guard = store.jobs.lock().await;
            store.persist(&guard).await?;
        }

        info!(path = %store.path.display(), "Job store opened");
        Ok(store)
    }

    /// Write the full job list atomically: temp file, then rename.
    async fn persist(&self, jobs: &[EmailJob]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(jobs)?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl JobStore for JsonFileStore {
    async fn push(
        &self,
        id: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;

        if jobs.iter().any(|j| j.id == id) {
            info!(id, "Duplicate job id, push is a no-op");
            return Ok(false);
        }

        jobs.push(EmailJob::new(id, headers, body));
        self.persist(&jobs).await?;
        info!(id, "Job queued");
        Ok(true)
    }

    async fn claim_next(&self) -> Result<Option<EmailJob>, StoreError> {
        let mut jobs = self.jobs.lock().await;

        // Oldest pending by created_at; insertion order breaks ties.
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at);

        let Some(job) = next else {
            return Ok(None);
        };

        job.status = JobStatus::Analyzing;
        job.updated_at = Some(chrono::Utc::now());
        let claimed = job.clone();

        self.persist(&jobs).await?;
        Ok(Some(claimed))
    }

    async fn complete(&self, id: &str, report: FusionReport) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = find_mut(&mut jobs, id)?;
        guard_transition(job, JobStatus::Completed)?;

        job.status = JobStatus::Completed;
        job.report = Some(report);
        // Privacy scrub: the report is the only retained record of content.
        job.headers = None;
        job.body = None;
        job.updated_at = Some(chrono::Utc::now());

        self.persist(&jobs).await
    }

    async fn fail(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = find_mut(&mut jobs, id)?;
        guard_transition(job, JobStatus::Failed)?;

        // No scrub: content is kept for diagnosis and manual requeue.
        job.status = JobStatus::Failed;
        job.updated_at = Some(chrono::Utc::now());

        self.persist(&jobs).await
    }

    async fn list_completed(&self) -> Result<Vec<EmailJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut completed: Vec<EmailJob> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(completed)
    }

    async fn get(&self, id: &str) -> Result<Option<EmailJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        jobs.clear();
        self.persist(&jobs).await?;
        info!("Job store cleared");
        Ok(())
    }
}

fn find_mut<'a>(jobs: &'a mut [EmailJob], id: &str) -> Result<&'a mut EmailJob, StoreError> {
    jobs.iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

fn guard_transition(job: &EmailJob, target: JobStatus) -> Result<(), StoreError> {
    if !job.status.can_transition_to(target) {
        return Err(StoreError::InvalidTransition {
            id: job.id.clone(),
            state: job.status.to_string(),
            target: target.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::model::Verdict;

    fn sample_headers() -> HashMap<String, String> {
        let mut h = HashMap::new();
        h.insert("From".to_string(), "a@b.com".to_string());
        h
    }

    fn sample_report(score: u8) -> FusionReport {
        FusionReport {
            score,
            verdict: Verdict::from_score(score, 40, 70),
            primary_reason: "Clean".into(),
            reasons: vec![],
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("queue.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn push_is_idempotent_per_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.push("e1", sample_headers(), "first".into()).await.unwrap());
        assert!(!store.push("e1", sample_headers(), "second".into()).await.unwrap());

        // First write wins
        let job = store.get("e1").await.unwrap().unwrap();
        assert_eq!(job.body.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn claim_follows_fifo_by_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.push("e1", sample_headers(), "a".into()).await.unwrap();
        store.push("e2", sample_headers(), "b".into()).await.unwrap();

        assert_eq!(store.claim_next().await.unwrap().unwrap().id, "e1");
        assert_eq!(store.claim_next().await.unwrap().unwrap().id, "e2");
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_transitions_to_analyzing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.push("e1", sample_headers(), "a".into()).await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Analyzing);
        assert_eq!(
            store.get("e1").await.unwrap().unwrap().status,
            JobStatus::Analyzing
        );
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open_store(&dir).await);
        store.push("only", sample_headers(), "x".into()).await.unwrap();

        let s1 = Arc::clone(&store);
        let s2 = Arc::clone(&store);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { s1.claim_next().await.unwrap() }),
            tokio::spawn(async move { s2.claim_next().await.unwrap() }),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a.is_some() != b.is_some(), "exactly one claim must win");
    }

    #[tokio::test]
    async fn complete_scrubs_content_and_keeps_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.push("e1", sample_headers(), "secret body".into()).await.unwrap();
        store.claim_next().await.unwrap();

        store.complete("e1", sample_report(10)).await.unwrap();

        let job = store.get("e1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.headers.is_none());
        assert!(job.body.is_none());
        assert_eq!(job.report.unwrap().score, 10);
        assert!(job.updated_at.is_some());
    }

    #[tokio::test]
    async fn fail_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.push("e1", sample_headers(), "keep me".into()).await.unwrap();
        store.claim_next().await.unwrap();

        store.fail("e1").await.unwrap();

        let job = store.get("e1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.body.as_deref(), Some("keep me"));
        assert!(job.report.is_none());
    }

    #[tokio::test]
    async fn complete_requires_claimed_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.push("e1", sample_headers(), "x".into()).await.unwrap();

        // Still pending — completing it is an invalid transition
        let err = store.complete("e1", sample_report(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(matches!(
            store.fail("ghost").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn list_completed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        for id in ["e1", "e2", "e3"] {
            store.push(id, sample_headers(), "x".into()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        // FIFO claims: e1 then e2
        store.claim_next().await.unwrap();
        store.claim_next().await.unwrap();
        store.complete("e1", sample_report(5)).await.unwrap();
        store.fail("e2").await.unwrap();

        let completed = store.list_completed().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "e1");

        store.claim_next().await.unwrap();
        store.complete("e3", sample_report(7)).await.unwrap();

        let completed = store.list_completed().await.unwrap();
        let ids: Vec<_> = completed.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e1"]);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.push("e1", sample_headers(), "x".into()).await.unwrap();
            store.claim_next().await.unwrap();
            store.complete("e1", sample_report(42)).await.unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        let job = store.get("e1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.report.unwrap().score, 42);
    }

    #[tokio::test]
    async fn reopen_recovers_analyzing_jobs_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.push("e1", sample_headers(), "x".into()).await.unwrap();
            store.claim_next().await.unwrap();
            // Simulated crash: job stays Analyzing on disk
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            store.get("e1").await.unwrap().unwrap().status,
            JobStatus::Pending
        );
        // And it can be claimed again
        assert_eq!(store.claim_next().await.unwrap().unwrap().id, "e1");
    }

    #[tokio::test]
    async fn corrupt_file_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        tokio::fs::write(&path, b"{ not json ]").await.unwrap();

        assert!(matches!(
            JsonFileStore::open(&path).await.unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.push("e1", sample_headers(), "x".into()).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.get("e1").await.unwrap().is_none());
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn on_disk_format_is_inspectable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store.push("e1", sample_headers(), "hello".into()).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0]["id"], "e1");
        assert_eq!(parsed[0]["status"], "pending");
        assert_eq!(parsed[0]["body"], "hello");
    }
}
