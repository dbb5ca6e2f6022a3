//! Drift monitor and retrain trigger.
//!
//! Owns the only state shared across decision cycles: one
//! [`ModelHealthRecord`] per model. Each record sits behind its own mutex, so
//! updates for one model are serialized while different models update in
//! parallel. The outer map lock is only taken to find or create a slot.
//!
//! State machine per model:
//!
//! ```text
//! HEALTHY --soft breach--> WATCH --hard breach--> EXCLUDED
//!    ^                       |                        |
//!    +------ recovered ------+                        |
//!    +--- cooldown elapsed + full probation window ---+
//! HEALTHY/WATCH --consecutive failures >= limit--> EXCLUDED
//! ```
//!
//! Error and disagreement only move a model once `min_samples` outcomes
//! have been observed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DriftConfig;
use crate::domain::entities::health::{HealthSnapshot, ModelHealthRecord};
use crate::domain::entities::opinion::{FailureReason, ModelOpinion};
use crate::domain::values::health_state::HealthState;
use crate::domain::values::realized_outcome::RealizedOutcome;
use crate::domain::values::signal::Signal;

type Slot = Arc<Mutex<ModelHealthRecord>>;

pub struct DriftMonitor {
    config: DriftConfig,
    records: RwLock<HashMap<String, Slot>>,
}

fn lock(slot: &Slot) -> MutexGuard<'_, ModelHealthRecord> {
    // A panic elsewhere must not take the health state down with it.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DriftMonitor {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Make sure a model shows up in health snapshots before its first outcome.
    pub fn register(&self, model_id: &str) {
        self.slot(model_id);
    }

    fn slot(&self, model_id: &str) -> Slot {
        {
            let map = self.records.read().unwrap_or_else(|p| p.into_inner());
            if let Some(slot) = map.get(model_id) {
                return Arc::clone(slot);
            }
        }
        let mut map = self.records.write().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            map.entry(model_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ModelHealthRecord::new(model_id)))),
        )
    }

    /// Point-in-time copy of every record, read once per decision cycle.
    pub fn get_health_snapshot(&self) -> HealthSnapshot {
        let slots: Vec<Slot> = {
            let map = self.records.read().unwrap_or_else(|p| p.into_inner());
            map.values().cloned().collect()
        };
        slots
            .iter()
            .map(|slot| {
                let rec = lock(slot).clone();
                (rec.model_id.clone(), rec)
            })
            .collect()
    }

    pub fn health_of(&self, model_id: &str) -> Option<ModelHealthRecord> {
        let map = self.records.read().unwrap_or_else(|p| p.into_inner());
        map.get(model_id).map(|slot| lock(slot).clone())
    }

    /// Models excluded for poor predictions that should be retrained.
    pub fn retrain_candidates(&self) -> Vec<String> {
        self.get_health_snapshot()
            .into_values()
            .filter(|r| r.retrain_recommended)
            .map(|r| r.model_id)
            .collect()
    }

    pub fn record_outcome(
        &self,
        model_id: &str,
        opinion: &ModelOpinion,
        consensus_signal: Option<Signal>,
        realized: RealizedOutcome,
    ) -> ModelHealthRecord {
        self.record_outcome_at(model_id, opinion, consensus_signal, realized, Utc::now())
    }

    /// Fold one realized outcome into the model's rolling statistics and
    /// advance its state machine.
    pub fn record_outcome_at(
        &self,
        model_id: &str,
        opinion: &ModelOpinion,
        consensus_signal: Option<Signal>,
        realized: RealizedOutcome,
        now: DateTime<Utc>,
    ) -> ModelHealthRecord {
        let error = realized.prediction_error(opinion.signal, opinion.confidence, self.config.hold_band);
        let alpha = self.config.alpha();

        let slot = self.slot(model_id);
        let mut rec = lock(&slot);
        let first = rec.outcomes_observed == 0;

        rec.rolling_error = if first {
            error
        } else {
            alpha * error + (1.0 - alpha) * rec.rolling_error
        };
        if let Some(consensus) = consensus_signal {
            let disagreed = if opinion.signal != consensus { 1.0 } else { 0.0 };
            rec.rolling_disagreement = if first {
                disagreed
            } else {
                alpha * disagreed + (1.0 - alpha) * rec.rolling_disagreement
            };
        }
        rec.outcomes_observed += 1;
        rec.last_updated = Some(now);

        debug!(
            model_id,
            error,
            rolling_error = rec.rolling_error,
            rolling_disagreement = rec.rolling_disagreement,
            "outcome recorded"
        );

        self.advance(&mut rec, now);
        rec.clone()
    }

    pub fn record_failure(&self, model_id: &str, reason: &FailureReason) -> ModelHealthRecord {
        self.record_failure_at(model_id, reason, Utc::now())
    }

    /// Count an adapter-level failure (timeout, error, panic, invalid opinion).
    pub fn record_failure_at(
        &self,
        model_id: &str,
        reason: &FailureReason,
        now: DateTime<Utc>,
    ) -> ModelHealthRecord {
        let slot = self.slot(model_id);
        let mut rec = lock(&slot);
        rec.consecutive_failures += 1;
        rec.last_updated = Some(now);
        let limit = self.config.max_consecutive_failures;

        if rec.state == HealthState::Excluded {
            rec.probation_streak = 0;
            if rec.consecutive_failures >= limit {
                rec.excluded_until = Some(now + self.config.cooldown());
                rec.consecutive_failures = 0;
                warn!(model_id, %reason, "still failing while excluded, cooldown extended");
            }
        } else if rec.consecutive_failures >= limit {
            let why = format!("{} consecutive failures, last: {reason}", rec.consecutive_failures);
            self.exclude(&mut rec, now, &why, false);
        }
        rec.clone()
    }

    pub fn record_success(&self, model_id: &str) {
        self.record_success_at(model_id, Utc::now());
    }

    pub fn record_success_at(&self, model_id: &str, now: DateTime<Utc>) {
        let slot = self.slot(model_id);
        let mut rec = lock(&slot);
        rec.consecutive_failures = 0;
        rec.last_updated = Some(now);
    }

    fn advance(&self, rec: &mut ModelHealthRecord, now: DateTime<Utc>) {
        let c = &self.config;

        if rec.state == HealthState::Excluded {
            let cooled_down = rec.excluded_until.map_or(true, |until| now >= until);
            if !cooled_down {
                return;
            }
            if rec.rolling_error < c.soft_error && rec.rolling_disagreement < c.soft_disagreement {
                rec.probation_streak += 1;
            } else {
                rec.probation_streak = 0;
            }
            if rec.probation_streak >= c.probation_window {
                self.restore(rec);
            }
            return;
        }

        if rec.outcomes_observed < c.min_samples {
            return;
        }
        let soft = rec.rolling_error >= c.soft_error || rec.rolling_disagreement >= c.soft_disagreement;
        let hard = rec.rolling_error >= c.hard_error || rec.rolling_disagreement >= c.hard_disagreement;

        match rec.state {
            HealthState::Healthy if soft => {
                rec.state = HealthState::Watch;
                info!(
                    model_id = %rec.model_id,
                    rolling_error = rec.rolling_error,
                    rolling_disagreement = rec.rolling_disagreement,
                    "model moved to WATCH"
                );
            }
            HealthState::Watch if hard => {
                let why = format!(
                    "rolling_error {:.3}, rolling_disagreement {:.3} over hard threshold",
                    rec.rolling_error, rec.rolling_disagreement
                );
                self.exclude(rec, now, &why, true);
            }
            HealthState::Watch if !soft => {
                rec.state = HealthState::Healthy;
                info!(model_id = %rec.model_id, "model recovered to HEALTHY");
            }
            _ => {}
        }
    }

    fn exclude(&self, rec: &mut ModelHealthRecord, now: DateTime<Utc>, why: &str, retrain: bool) {
        rec.state = HealthState::Excluded;
        rec.excluded_until = Some(now + self.config.cooldown());
        rec.probation_streak = 0;
        rec.consecutive_failures = 0;
        rec.retrain_recommended |= retrain;
        warn!(
            model_id = %rec.model_id,
            until = ?rec.excluded_until,
            retrain,
            "model EXCLUDED: {why}"
        );
    }

    fn restore(&self, rec: &mut ModelHealthRecord) {
        rec.state = HealthState::Healthy;
        rec.excluded_until = None;
        rec.probation_streak = 0;
        rec.consecutive_failures = 0;
        rec.retrain_recommended = false;
        info!(model_id = %rec.model_id, "model passed probation, restored to HEALTHY");
    }
}
