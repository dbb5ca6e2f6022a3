use crate::domain::values::health_state::HealthState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of every model's health, keyed by model_id.
pub type HealthSnapshot = BTreeMap<String, ModelHealthRecord>;

/// Cross-cycle health of one model, owned by the drift monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHealthRecord {
    pub model_id: String,
    pub state: HealthState,
    /// EMA of realized-vs-predicted error.
    pub rolling_error: f64,
    /// EMA of "signal diverged from consensus".
    pub rolling_disagreement: f64,
    pub excluded_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub outcomes_observed: u64,
    /// Consecutive good outcomes since the exclusion cooldown elapsed.
    pub probation_streak: u32,
    pub retrain_recommended: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ModelHealthRecord {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            state: HealthState::Healthy,
            rolling_error: 0.0,
            rolling_disagreement: 0.0,
            excluded_until: None,
            consecutive_failures: 0,
            outcomes_observed: 0,
            probation_streak: 0,
            retrain_recommended: false,
            last_updated: None,
        }
    }

    /// Whether consensus must give this model zero weight at `now`.
    pub fn is_excluded_at(&self, now: DateTime<Utc>) -> bool {
        self.state == HealthState::Excluded || self.excluded_until.is_some_and(|t| t > now)
    }
}
