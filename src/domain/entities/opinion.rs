use crate::domain::values::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One model's view of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOpinion {
    pub opinion_id: String,
    pub model_id: String,
    pub signal: Signal,
    /// Calibrated per model, in [0, 1].
    pub confidence: f64,
    /// Self-reported epistemic uncertainty in [0, 1]; higher is less trustworthy.
    pub uncertainty: f64,
    /// Audit trail only. Never read by consensus control flow.
    pub rationale: Vec<String>,
    pub latency_ms: u64,
}

impl ModelOpinion {
    pub fn new(
        model_id: impl Into<String>,
        signal: Signal,
        confidence: f64,
        uncertainty: f64,
        rationale: Vec<String>,
    ) -> Self {
        Self {
            opinion_id: uuid::Uuid::new_v4().to_string(),
            model_id: model_id.into(),
            signal,
            confidence,
            uncertainty,
            rationale,
            latency_ms: 0,
        }
    }

    /// Check that the numeric fields are usable by consensus.
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence out of range: {}", self.confidence));
        }
        if !self.uncertainty.is_finite() || !(0.0..=1.0).contains(&self.uncertainty) {
            return Err(format!("uncertainty out of range: {}", self.uncertainty));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FailureReason {
    /// The adapter's own timeout elapsed.
    Timeout,
    /// The cycle deadline fired while the adapter was still pending.
    DeadlineExceeded,
    /// The adapter returned an error.
    Error(String),
    /// The adapter task panicked.
    Panicked(String),
    /// The adapter produced an opinion consensus cannot use.
    InvalidOpinion(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::DeadlineExceeded => write!(f, "cycle deadline exceeded"),
            FailureReason::Error(msg) => write!(f, "error: {msg}"),
            FailureReason::Panicked(msg) => write!(f, "panicked: {msg}"),
            FailureReason::InvalidOpinion(msg) => write!(f, "invalid opinion: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterFailure {
    pub model_id: String,
    pub reason: FailureReason,
    pub latency_ms: u64,
}

impl AdapterFailure {
    pub fn new(model_id: impl Into<String>, reason: FailureReason, latency_ms: u64) -> Self {
        Self {
            model_id: model_id.into(),
            reason,
            latency_ms,
        }
    }
}

/// Result of running one adapter within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterOutcome {
    Opinion(ModelOpinion),
    Failure(AdapterFailure),
}

impl AdapterOutcome {
    pub fn model_id(&self) -> &str {
        match self {
            AdapterOutcome::Opinion(o) => &o.model_id,
            AdapterOutcome::Failure(f) => &f.model_id,
        }
    }

    pub fn opinion(&self) -> Option<&ModelOpinion> {
        match self {
            AdapterOutcome::Opinion(o) => Some(o),
            AdapterOutcome::Failure(_) => None,
        }
    }
}

impl From<ModelOpinion> for AdapterOutcome {
    fn from(o: ModelOpinion) -> Self {
        AdapterOutcome::Opinion(o)
    }
}

impl From<AdapterFailure> for AdapterOutcome {
    fn from(f: AdapterFailure) -> Self {
        AdapterOutcome::Failure(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_nan_and_range() {
        let mut op = ModelOpinion::new("m", Signal::Buy, 0.7, 0.2, vec![]);
        assert!(op.validate().is_ok());
        op.confidence = f64::NAN;
        assert!(op.validate().is_err());
        op.confidence = 0.7;
        op.uncertainty = 1.2;
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = ModelOpinion::new("m", Signal::Hold, 0.5, 0.5, vec![]);
        let b = ModelOpinion::new("m", Signal::Hold, 0.5, 0.5, vec![]);
        assert_ne!(a.opinion_id, b.opinion_id);
    }
}
