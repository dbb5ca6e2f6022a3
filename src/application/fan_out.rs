//! Concurrent fan-out of a snapshot to every registered model adapter.
//!
//! Each adapter runs in its own task under its own timeout; the whole batch
//! is bounded by the cycle deadline. Whatever has not answered when the
//! deadline fires is abandoned and reported as a failure. Results come back
//! in adapter registration order regardless of completion order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, warn};

use crate::config::CycleConfig;
use crate::domain::entities::opinion::{AdapterFailure, AdapterOutcome, FailureReason};
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::ports::model_adapter::ModelAdapter;

/// Cancels the prediction task when the guard is dropped, e.g. when the cycle
/// deadline abandons a pending adapter.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}

/// Run one adapter under `timeout`. Never panics and never returns an error:
/// every problem becomes an [`AdapterFailure`].
pub async fn guarded_predict(
    adapter: Arc<dyn ModelAdapter>,
    snapshot: Arc<MarketSnapshot>,
    timeout: Duration,
) -> AdapterOutcome {
    let model_id = adapter.model_id().to_string();
    let started = Instant::now();

    // The prediction runs in its own task so a panic inside the model is
    // caught as a JoinError instead of unwinding through the cycle.
    let task_adapter = Arc::clone(&adapter);
    let mut handle = tokio::spawn(async move { task_adapter.predict(&snapshot).await });
    let _abort = AbortOnDrop(handle.abort_handle());

    let outcome = match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(mut opinion))) => {
            opinion.latency_ms = elapsed_ms(started);
            if opinion.model_id != model_id {
                AdapterFailure::new(
                    &model_id,
                    FailureReason::InvalidOpinion(format!(
                        "opinion tagged with model_id '{}'",
                        opinion.model_id
                    )),
                    opinion.latency_ms,
                )
                .into()
            } else if let Err(reason) = opinion.validate() {
                AdapterFailure::new(
                    &model_id,
                    FailureReason::InvalidOpinion(reason),
                    opinion.latency_ms,
                )
                .into()
            } else {
                AdapterOutcome::Opinion(opinion)
            }
        }
        Ok(Ok(Err(e))) => {
            AdapterFailure::new(&model_id, FailureReason::Error(e.to_string()), elapsed_ms(started))
                .into()
        }
        Ok(Err(join_err)) => {
            AdapterFailure::new(
                &model_id,
                FailureReason::Panicked(join_err.to_string()),
                elapsed_ms(started),
            )
            .into()
        }
        Err(_) => AdapterFailure::new(&model_id, FailureReason::Timeout, elapsed_ms(started)).into(),
    };

    if let AdapterOutcome::Failure(f) = &outcome {
        warn!(model_id = %f.model_id, reason = %f.reason, latency_ms = f.latency_ms, "adapter failed");
    }
    outcome
}

/// Fan the snapshot out to all adapters and join within the cycle deadline.
pub async fn collect_opinions(
    adapters: &[Arc<dyn ModelAdapter>],
    snapshot: Arc<MarketSnapshot>,
    cycle: &CycleConfig,
) -> Vec<AdapterOutcome> {
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + cycle.cycle_deadline();
    let mut slots: Vec<Option<AdapterOutcome>> = vec![None; adapters.len()];
    let mut set = JoinSet::new();

    for (idx, adapter) in adapters.iter().enumerate() {
        let adapter = Arc::clone(adapter);
        let snapshot = Arc::clone(&snapshot);
        let timeout = adapter.timeout().unwrap_or_else(|| cycle.adapter_timeout());
        set.spawn(async move { (idx, guarded_predict(adapter, snapshot, timeout).await) });
    }

    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((idx, outcome)))) => slots[idx] = Some(outcome),
            // guarded_predict does not panic; a join error here means the task was cancelled.
            Ok(Some(Err(e))) => debug!(error = %e, "adapter task ended without a result"),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    request_id = %snapshot.request_id,
                    pending = set.len(),
                    "cycle deadline fired, abandoning pending adapters"
                );
                set.abort_all();
                break;
            }
        }
    }

    slots
        .into_iter()
        .zip(adapters)
        .map(|(slot, adapter)| {
            slot.unwrap_or_else(|| {
                AdapterFailure::new(
                    adapter.model_id(),
                    FailureReason::DeadlineExceeded,
                    elapsed_ms(started),
                )
                .into()
            })
        })
        .collect()
}
