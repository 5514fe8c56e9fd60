//! Job Lifecycle Actor: the per-job state machine (spec.md §4.5).
//!
//! One task per in-flight job, spawned by the `ExecutionManager`'s
//! Dispatcher. Drives a single `ParameterSet` through launch, polling,
//! constraint checking, and finalization, and pushes the terminal
//! `(result, params_string, status)` tuple onto the results queue.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{Backend, JobHandle, JobStatus};
use crate::constraint::{check_constraints, ConstraintSpec};
use crate::log_parser::parse_result;
use crate::objective::Objective;

/// Tunable timings and retry budget shared by every actor in a run
/// (spec.md §4.5: `poll_interval` / `log_settle_delay` default to 5s / 10s).
#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub poll_interval: Duration,
    pub log_settle_delay: Duration,
    pub max_retries: u32,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            log_settle_delay: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

/// The terminal record an actor pushes onto the results queue. Sequence
/// numbers are assigned later, at results-queue dequeue time (spec.md
/// §4.7), not here.
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub result: f64,
    pub params_string: String,
    pub status: String,
}

/// An `ActorConfig` with minimal sleeps, for tests that need the real
/// state machine without waiting out its default timings.
pub fn actor_config_minimal() -> ActorConfig {
    ActorConfig {
        poll_interval: Duration::from_millis(1),
        log_settle_delay: Duration::from_millis(1),
        max_retries: 3,
    }
}

/// Drive one job from launch to a terminal outcome.
pub async fn run_job(
    backend: Arc<dyn Backend>,
    params_string: String,
    worker_id: usize,
    result_pattern: Arc<str>,
    constraints: Arc<Vec<ConstraintSpec>>,
    objective: Objective,
    config: ActorConfig,
) -> RawOutcome {
    let failure_score = objective.failure_score();

    // --- Launching ---
    let handle = match launch_with_retries(&backend, worker_id, &params_string, &config).await {
        Some(h) => h,
        None => {
            return RawOutcome {
                result: failure_score,
                params_string,
                status: "Job failed: can't launch job on backend".to_string(),
            };
        }
    };
    info!(worker_id, params = %params_string, "job launched");

    // --- Polling / CheckConstraints / Killing / Finalize ---
    loop {
        let status = status_with_retries(&backend, &handle, &config).await;

        match status {
            JobStatus::Running | JobStatus::Pending => {
                if let Some(outcome) =
                    handle_running(&backend, &handle, &params_string, worker_id, &constraints, &config, failure_score)
                        .await
                {
                    return outcome;
                }
                tokio::time::sleep(config.poll_interval).await;
            }
            JobStatus::Succeeded => {
                return handle_succeeded(
                    &backend,
                    &handle,
                    &params_string,
                    worker_id,
                    &result_pattern,
                    &constraints,
                    &config,
                    failure_score,
                )
                .await;
            }
            JobStatus::Failed | JobStatus::Killed | JobStatus::NotFound | JobStatus::Unknown => {
                debug!(worker_id, params = %params_string, ?status, "job reached a failed terminal state");
                return RawOutcome {
                    result: failure_score,
                    params_string,
                    status: "Job failed".to_string(),
                };
            }
        }
    }
}

async fn launch_with_retries(
    backend: &Arc<dyn Backend>,
    worker_id: usize,
    params_string: &str,
    config: &ActorConfig,
) -> Option<JobHandle> {
    for attempt in 0..config.max_retries {
        match backend.launch_job(worker_id, params_string).await {
            Ok(handle) => return Some(handle),
            Err(e) => {
                if attempt + 1 == config.max_retries {
                    warn!(worker_id, error = %e, "exhausted retries launching job");
                    return None;
                }
            }
        }
    }
    None
}

/// A lost status observation is treated as `Running` — liveness over safety.
async fn status_with_retries(
    backend: &Arc<dyn Backend>,
    handle: &JobHandle,
    config: &ActorConfig,
) -> JobStatus {
    for attempt in 0..config.max_retries {
        match backend.get_job_status(handle).await {
            Ok(status) => return status,
            Err(e) => {
                if attempt + 1 == config.max_retries {
                    debug!(error = %e, "exhausted retries getting job status; treating as running");
                    return JobStatus::Running;
                }
            }
        }
    }
    JobStatus::Running
}

/// Handles a job observed as Running/Pending: fetch the log, check
/// constraints, kill on violation. Returns `Some(outcome)` only when the
/// actor should terminate; `None` means keep polling.
#[allow(clippy::too_many_arguments)]
async fn handle_running(
    backend: &Arc<dyn Backend>,
    handle: &JobHandle,
    params_string: &str,
    worker_id: usize,
    constraints: &[ConstraintSpec],
    config: &ActorConfig,
    failure_score: f64,
) -> Option<RawOutcome> {
    let log = match backend.get_logs_for_job(handle).await {
        Ok(log) => log,
        Err(_) => return None, // can't check constraints this tick; keep running
    };

    if check_constraints(&log, constraints) {
        return None;
    }

    // Constraints violated: kill, retrying up to max_retries.
    for attempt in 0..config.max_retries {
        match backend.kill_job(handle).await {
            Ok(()) => {
                info!(worker_id, params = %params_string, "killed job: constraints not satisfied");
                return Some(RawOutcome {
                    result: failure_score,
                    params_string: params_string.to_string(),
                    status: "Some constraints are not satisfied".to_string(),
                });
            }
            Err(e) => {
                if attempt + 1 == config.max_retries {
                    warn!(worker_id, error = %e, "could not kill job; continuing rather than leaking the worker");
                    return None;
                }
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
async fn handle_succeeded(
    backend: &Arc<dyn Backend>,
    handle: &JobHandle,
    params_string: &str,
    worker_id: usize,
    result_pattern: &str,
    constraints: &[ConstraintSpec],
    config: &ActorConfig,
    failure_score: f64,
) -> RawOutcome {
    let mut log = None;
    for attempt in 0..config.max_retries {
        tokio::time::sleep(config.log_settle_delay).await;
        match backend.get_logs_for_job(handle).await {
            Ok(l) => {
                log = Some(l);
                break;
            }
            Err(e) => {
                if attempt + 1 == config.max_retries {
                    warn!(worker_id, error = %e, "could not access logs for succeeded job");
                }
            }
        }
    }

    let Some(log) = log else {
        return RawOutcome {
            result: failure_score,
            params_string: params_string.to_string(),
            status: "Job failed: could not access logs".to_string(),
        };
    };

    let Some(result) = parse_result(&log, result_pattern) else {
        return RawOutcome {
            result: failure_score,
            params_string: params_string.to_string(),
            status: format!("Job failed: {result_pattern} was not found in job's log"),
        };
    };

    if !check_constraints(&log, constraints) {
        return RawOutcome {
            result: failure_score,
            params_string: params_string.to_string(),
            status: "Some constraints are not satisfied".to_string(),
        };
    }

    RawOutcome {
        result,
        params_string: params_string.to_string(),
        status: "Job succeeded".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    /// A scriptable in-memory backend for actor unit tests: each worker has
    /// a queue of statuses to report and a fixed log.
    struct ScriptedBackend {
        statuses: AsyncMutex<Vec<JobStatus>>,
        log: Mutex<String>,
        killed: Mutex<bool>,
        fail_launch_times: usize,
        launches: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn new(statuses: Vec<JobStatus>, log: &str) -> Self {
            Self {
                statuses: AsyncMutex::new(statuses),
                log: Mutex::new(log.to_string()),
                killed: Mutex::new(false),
                fail_launch_times: 0,
                launches: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn num_workers(&self) -> usize {
            1
        }
        async fn is_worker_available(&self, _worker_id: usize) -> Result<bool, BackendError> {
            Ok(true)
        }
        async fn launch_job(&self, _worker_id: usize, _params: &str) -> Result<JobHandle, BackendError> {
            let mut launches = self.launches.lock().unwrap();
            *launches += 1;
            if *launches <= self.fail_launch_times {
                return Err(BackendError::Launch("flaky".to_string()));
            }
            Ok(JobHandle::new("job-1"))
        }
        async fn get_job_status(&self, _handle: &JobHandle) -> Result<JobStatus, BackendError> {
            let mut statuses = self.statuses.lock().await;
            if statuses.len() > 1 {
                Ok(statuses.remove(0))
            } else {
                Ok(statuses[0])
            }
        }
        async fn get_logs_for_job(&self, _handle: &JobHandle) -> Result<String, BackendError> {
            Ok(self.log.lock().unwrap().clone())
        }
        async fn kill_job(&self, _handle: &JobHandle) -> Result<(), BackendError> {
            *self.killed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn fast_config() -> ActorConfig {
        ActorConfig {
            poll_interval: Duration::from_millis(1),
            log_settle_delay: Duration::from_millis(1),
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn succeeded_job_parses_result() {
        let backend: Arc<dyn Backend> =
            Arc::new(ScriptedBackend::new(vec![JobStatus::Succeeded], "Result: 42.5\n"));
        let outcome = run_job(
            backend,
            "x=1".to_string(),
            0,
            Arc::from("Result:"),
            Arc::new(vec![]),
            Objective::Minimize,
            fast_config(),
        )
        .await;
        assert_eq!(outcome.status, "Job succeeded");
        assert_eq!(outcome.result, 42.5);
    }

    #[tokio::test]
    async fn missing_result_pattern_fails() {
        let backend: Arc<dyn Backend> =
            Arc::new(ScriptedBackend::new(vec![JobStatus::Succeeded], "no marker here\n"));
        let outcome = run_job(
            backend,
            "x=1".to_string(),
            0,
            Arc::from("Result:"),
            Arc::new(vec![]),
            Objective::Minimize,
            fast_config(),
        )
        .await;
        assert!(outcome.status.starts_with("Job failed: Result:"));
        assert_eq!(outcome.result, f64::INFINITY);
    }

    #[tokio::test]
    async fn failed_status_produces_job_failed() {
        let backend: Arc<dyn Backend> = Arc::new(ScriptedBackend::new(vec![JobStatus::Failed], ""));
        let outcome = run_job(
            backend,
            "x=1".to_string(),
            0,
            Arc::from("Result:"),
            Arc::new(vec![]),
            Objective::Maximize,
            fast_config(),
        )
        .await;
        assert_eq!(outcome.status, "Job failed");
        assert_eq!(outcome.result, f64::NEG_INFINITY);
    }

    #[tokio::test]
    async fn constraint_violation_on_final_log_fails_after_success() {
        let backend: Arc<dyn Backend> =
            Arc::new(ScriptedBackend::new(vec![JobStatus::Succeeded], "Result: 5\nvalid ppl 1000\n"));
        let constraints = vec![ConstraintSpec::new("valid ppl", (0.0, 500.0), 0)];
        let outcome = run_job(
            backend,
            "x=1".to_string(),
            0,
            Arc::from("Result:"),
            Arc::new(constraints),
            Objective::Minimize,
            fast_config(),
        )
        .await;
        assert_eq!(outcome.status, "Some constraints are not satisfied");
        assert_eq!(outcome.result, f64::INFINITY);
    }

    #[tokio::test]
    async fn running_job_with_violated_constraint_is_killed() {
        let backend: Arc<dyn Backend> = Arc::new(ScriptedBackend::new(
            vec![JobStatus::Running, JobStatus::Running],
            "valid ppl 1000\n",
        ));
        let constraints = vec![ConstraintSpec::new("valid ppl", (0.0, 500.0), 0)];
        let outcome = run_job(
            backend,
            "x=1".to_string(),
            0,
            Arc::from("Result:"),
            Arc::new(constraints),
            Objective::Minimize,
            fast_config(),
        )
        .await;
        assert_eq!(outcome.status, "Some constraints are not satisfied");
    }
}
