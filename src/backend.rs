//! Backend interface: the abstract contract over remote job execution
//! (spec.md §4.1).
//!
//! Concrete backends (cloud VM provisioning, workflow-scheduler clients, SSH
//! execution) are out of scope for the core; [`crate::backends::local`]
//! provides one runnable reference implementation.

use async_trait::async_trait;

use crate::error::BackendError;

/// Opaque identifier issued by the backend at launch time. The core stores
/// it verbatim and passes it back for every subsequent query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// The backend's view of a job (spec.md §3). `Pending` is treated
/// identically to `Running` by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Pending,
    Killed,
    NotFound,
    Unknown,
}

/// Abstraction over remote compute: launches jobs, polls status, retrieves
/// logs, and kills jobs. Every operation may fail with a retryable
/// [`BackendError`]; the core retries up to `max_retries` times before
/// giving up (spec.md §4.1, §7).
///
/// `Send + Sync` so the engine can share one backend instance (`Arc<dyn
/// Backend>`) across every concurrently-running Job Lifecycle Actor; a
/// backend that is not internally thread-safe must serialize itself.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fixed, positive worker count, queried once at startup.
    fn num_workers(&self) -> usize;

    /// Whether the given worker is free to accept a new job. A transient
    /// error is treated by the core as "not available at this instant".
    async fn is_worker_available(&self, worker_id: usize) -> Result<bool, BackendError>;

    /// Launch `params_string` on `worker_id`. May assume the worker was
    /// last reported available.
    async fn launch_job(
        &self,
        worker_id: usize,
        params_string: &str,
    ) -> Result<JobHandle, BackendError>;

    /// Current status of a previously-launched job.
    async fn get_job_status(&self, handle: &JobHandle) -> Result<JobStatus, BackendError>;

    /// Combined stdout+stderr of a job, as a single string.
    async fn get_logs_for_job(&self, handle: &JobHandle) -> Result<String, BackendError>;

    /// Terminate a running job.
    async fn kill_job(&self, handle: &JobHandle) -> Result<(), BackendError>;
}
