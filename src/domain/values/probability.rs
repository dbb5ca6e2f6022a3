use serde::{Deserialize, Serialize};
use std::fmt;

/// A value in the closed unit interval (confidence, uncertainty, weights).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Probability(f64);

impl Probability {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(format!(
                "Probability must be between 0.0 and 1.0, got {value}"
            ));
        }
        Ok(Probability(value))
    }

    /// Clamp into [0, 1]; NaN becomes 0.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Probability(0.0)
        } else {
            Probability(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Probability {
    fn default() -> Self {
        Probability(0.5)
    }
}
