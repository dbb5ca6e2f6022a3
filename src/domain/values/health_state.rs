use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a model inside the drift monitor.
///
/// `Healthy -> Watch -> Excluded -> Healthy`; `Watch` falls back to `Healthy`
/// when both rolling metrics recover below their soft thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    #[default]
    Healthy,
    Watch,
    Excluded,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "HEALTHY"),
            HealthState::Watch => write!(f, "WATCH"),
            HealthState::Excluded => write!(f, "EXCLUDED"),
        }
    }
}
