//! Worker allocator: finds an available worker id (spec.md §4.6).
//!
//! The scan is unfair by design — low-indexed workers are preferred —
//! because job durations vary and biased allocation minimizes fragmentation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::backend::Backend;

/// Scans worker ids `0..num_workers` in order and returns the first one
/// reporting available, sleeping `poll_interval` between full scans. Backend
/// errors are treated as "unavailable for this scan".
pub async fn await_worker(backend: &Arc<dyn Backend>, poll_interval: Duration) -> usize {
    loop {
        for worker_id in 0..backend.num_workers() {
            match backend.is_worker_available(worker_id).await {
                Ok(true) => return worker_id,
                Ok(false) => continue,
                Err(e) => {
                    debug!(worker_id, error = %e, "worker availability check failed; treating as unavailable");
                    continue;
                }
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
}
