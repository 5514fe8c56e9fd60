//! Execution manager: the top-level loop bridging the search algorithm and
//! the pool of concurrent Job Lifecycle Actors (spec.md §4.7).
//!
//! Two long-running tasks share two bounded `tokio::sync::mpsc` queues:
//! - the **Generator** seeds the jobs queue from `gen_initial_params`, then
//!   feeds every completed outcome back into `gen_new_params` and rewrites
//!   the result ledger;
//! - the **Dispatcher** drains the jobs queue, waits for a free worker, and
//!   spawns one Job Lifecycle Actor per job.
//!
//! A sentinel (`None` over the channel, mirroring the original's
//! `queue.put(None)`) drives shutdown in both directions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::actor::{run_job, ActorConfig, RawOutcome};
use crate::allocator::await_worker;
use crate::backend::Backend;
use crate::constraint::ConstraintSpec;
use crate::ledger::{JobOutcome, ResultLedger};
use crate::objective::Objective;
use crate::paramspec::ParameterSet;
use crate::search::{GeneratedParams, SearchAlgorithm};

pub struct ExecutionManager {
    backend: Arc<dyn Backend>,
    search_algorithm: Box<dyn SearchAlgorithm>,
    result_pattern: Arc<str>,
    objective: Objective,
    constraints: Arc<Vec<ConstraintSpec>>,
    output_file: Option<PathBuf>,
    actor_config: ActorConfig,
}

impl ExecutionManager {
    pub fn new(
        backend: Arc<dyn Backend>,
        search_algorithm: Box<dyn SearchAlgorithm>,
        result_pattern: impl Into<Arc<str>>,
        objective: Objective,
        constraints: Vec<ConstraintSpec>,
        output_file: Option<PathBuf>,
        actor_config: ActorConfig,
    ) -> Self {
        Self {
            backend,
            search_algorithm,
            result_pattern: result_pattern.into(),
            objective,
            constraints: Arc::new(constraints),
            output_file,
            actor_config,
        }
    }

    /// Run the tuning loop to completion and return the final, sorted
    /// result ledger.
    pub async fn run(self) -> ResultLedger {
        let capacity = (self.backend.num_workers() * 4).max(16);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Option<ParameterSet>>(capacity);
        let (results_tx, results_rx) = mpsc::channel::<Option<RawOutcome>>(capacity);

        let dispatcher = tokio::spawn(dispatcher_task(
            self.backend,
            jobs_rx,
            results_tx,
            self.result_pattern.clone(),
            self.constraints,
            self.objective,
            self.actor_config,
        ));

        let generator = tokio::spawn(generator_task(
            self.search_algorithm,
            jobs_tx,
            results_rx,
            self.objective,
            self.result_pattern,
            self.output_file,
        ));

        let (dispatcher_result, generator_result) = tokio::join!(dispatcher, generator);
        dispatcher_result.expect("dispatcher task panicked");
        generator_result.expect("generator task panicked")
    }
}

async fn generator_task(
    mut search_algorithm: Box<dyn SearchAlgorithm>,
    jobs_tx: mpsc::Sender<Option<ParameterSet>>,
    mut results_rx: mpsc::Receiver<Option<RawOutcome>>,
    objective: Objective,
    result_pattern: Arc<str>,
    output_file: Option<PathBuf>,
) -> ResultLedger {
    let mut ledger = ResultLedger::new(objective, result_pattern.as_ref());

    for params in search_algorithm.gen_initial_params().await {
        if jobs_tx.send(Some(params)).await.is_err() {
            return ledger;
        }
    }

    let mut sequence_number: u64 = 0;
    // Once the algorithm's sentinel has been forwarded into the jobs queue,
    // the search is done contributing new work, but in-flight jobs the
    // dispatcher already accepted still owe a result. Keep draining
    // results_rx, without calling back into the algorithm, until the
    // dispatcher's own sentinel confirms every outstanding actor has
    // reported in.
    let mut algorithm_done = false;
    loop {
        let Some(raw) = results_rx.recv().await.flatten() else {
            break;
        };
        sequence_number += 1;

        ledger.push(JobOutcome {
            result: raw.result,
            params_string: raw.params_string.clone(),
            status: raw.status.clone(),
            sequence_number,
        });

        if let Some(path) = &output_file {
            if let Err(e) = ledger.write_to(path) {
                warn!(error = %e, path = %path.display(), "failed to write result ledger");
            }
        }

        if algorithm_done {
            continue;
        }

        let evaluation_succeeded = !raw.status.starts_with("Job failed");
        let completed_params = ParameterSet::parse(&raw.params_string);
        let generated = search_algorithm
            .gen_new_params(raw.result, &completed_params, evaluation_succeeded)
            .await;

        let mut sentinel_seen = false;
        for item in generated {
            match item {
                GeneratedParams::Params(p) => {
                    if jobs_tx.send(Some(p)).await.is_err() {
                        sentinel_seen = true;
                        break;
                    }
                }
                GeneratedParams::Sentinel => sentinel_seen = true,
            }
        }
        if sentinel_seen {
            let _ = jobs_tx.send(None).await;
            algorithm_done = true;
        }
    }

    ledger
}

async fn dispatcher_task(
    backend: Arc<dyn Backend>,
    mut jobs_rx: mpsc::Receiver<Option<ParameterSet>>,
    results_tx: mpsc::Sender<Option<RawOutcome>>,
    result_pattern: Arc<str>,
    constraints: Arc<Vec<ConstraintSpec>>,
    objective: Objective,
    actor_config: ActorConfig,
) {
    let mut outstanding: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    loop {
        let Some(params) = jobs_rx.recv().await.flatten() else {
            break;
        };
        let params_string = params.render();
        let worker_id = await_worker(&backend, actor_config.poll_interval).await;

        let actor_handle = tokio::spawn(run_job(
            backend.clone(),
            params_string.clone(),
            worker_id,
            result_pattern.clone(),
            constraints.clone(),
            objective,
            actor_config.clone(),
        ));

        let results_tx_for_forward = results_tx.clone();
        let failure_score = objective.failure_score();
        let params_for_panic = params_string.clone();
        let forward = tokio::spawn(async move {
            let outcome = match actor_handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    warn!(error = %join_error, "job lifecycle actor panicked");
                    RawOutcome {
                        result: failure_score,
                        params_string: params_for_panic,
                        status: "Job failed: unhandled exception".to_string(),
                    }
                }
            };
            let _ = results_tx_for_forward.send(Some(outcome)).await;
        });
        outstanding.push(forward);

        tokio::time::sleep(actor_config.poll_interval).await;
    }

    for handle in outstanding {
        let _ = handle.await;
    }
    let _ = results_tx.send(None).await;
}

/// Convenience constructor for `ActorConfig` durations expressed in
/// fractional seconds, matching the Python `sleep_time` /
/// `wait_for_logs_time` configuration knobs.
pub fn actor_config_from_secs(poll_interval_secs: f64, log_settle_delay_secs: f64, max_retries: u32) -> ActorConfig {
    ActorConfig {
        poll_interval: Duration::from_secs_f64(poll_interval_secs),
        log_settle_delay: Duration::from_secs_f64(log_settle_delay_secs),
        max_retries,
    }
}
