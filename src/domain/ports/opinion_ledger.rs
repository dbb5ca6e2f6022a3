use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::error::DomainError;
use crate::domain::values::signal::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opinion as it was used in a decision cycle, kept until settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionRecord {
    pub opinion: ModelOpinion,
    pub request_id: String,
    pub asset: String,
    /// The cycle's consensus signal; `None` when the cycle ended in fail-safe.
    pub consensus_signal: Option<Signal>,
    /// False for shadow opinions from excluded models.
    pub included: bool,
    pub recorded_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Bounded, per-model history of recent opinions.
///
/// Implementations keep at most a configured number of records per model,
/// evicting the oldest first.
pub trait OpinionLedger: Send + Sync {
    fn record(&self, records: &[OpinionRecord]) -> Result<(), DomainError>;
    fn get(&self, opinion_id: &str) -> Result<Option<OpinionRecord>, DomainError>;
    /// Claim the opinion for settlement. Check and write are one atomic step:
    /// `InvalidInput` if it was already settled, `NotFound` if unknown.
    fn mark_settled(&self, opinion_id: &str, at: DateTime<Utc>) -> Result<(), DomainError>;
    fn recent(&self, model_id: &str, limit: usize) -> Result<Vec<OpinionRecord>, DomainError>;
}
