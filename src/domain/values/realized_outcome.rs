use serde::{Deserialize, Serialize};

use crate::domain::values::signal::Signal;

/// What the settlement collaborator reports once the market has moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RealizedOutcome {
    /// Realized relative return of the instrument over the decision horizon.
    Return(f64),
    /// Prediction error already computed by the caller, in [0, 1].
    Error(f64),
}

impl RealizedOutcome {
    /// Prediction error of an opinion against this outcome, in [0, 1].
    ///
    /// For a realized return this is the Brier score of the opinion's
    /// confidence against "the opinion's signal was the right one".
    /// Non-finite inputs count as a maximal error.
    pub fn prediction_error(&self, signal: Signal, confidence: f64, hold_band: f64) -> f64 {
        match *self {
            RealizedOutcome::Error(e) => {
                if e.is_finite() {
                    e.clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
            RealizedOutcome::Return(r) => {
                if !r.is_finite() || !confidence.is_finite() {
                    return 1.0;
                }
                let p = confidence.clamp(0.0, 1.0);
                let hit = if Signal::from_return(r, hold_band) == signal { 1.0 } else { 0.0 };
                (p - hit).powi(2)
            }
        }
    }
}
