use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::application::drift_monitor::DriftMonitor;
use crate::domain::entities::health::ModelHealthRecord;
use crate::domain::error::DomainError;
use crate::domain::ports::opinion_ledger::OpinionLedger;
use crate::domain::values::realized_outcome::RealizedOutcome;

/// Settlement callback: matches a realized outcome to the opinion it grades.
pub struct SettleUseCase {
    ledger: Arc<dyn OpinionLedger>,
    drift: Arc<DriftMonitor>,
}

impl SettleUseCase {
    pub fn new(ledger: Arc<dyn OpinionLedger>, drift: Arc<DriftMonitor>) -> Self {
        Self { ledger, drift }
    }

    pub fn record_outcome(
        &self,
        model_id: &str,
        opinion_id: &str,
        realized: RealizedOutcome,
    ) -> Result<ModelHealthRecord, DomainError> {
        let value = match realized {
            RealizedOutcome::Return(v) | RealizedOutcome::Error(v) => v,
        };
        if !value.is_finite() {
            return Err(DomainError::InvalidInput(format!(
                "realized outcome must be finite, got {value}"
            )));
        }

        let record = self
            .ledger
            .get(opinion_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Opinion not found: {opinion_id}")))?;
        if record.opinion.model_id != model_id {
            return Err(DomainError::InvalidInput(format!(
                "opinion {opinion_id} belongs to '{}', not '{model_id}'",
                record.opinion.model_id
            )));
        }
        // Only the caller that wins the claim feeds the drift monitor.
        self.ledger.mark_settled(opinion_id, Utc::now())?;
        let health = self.drift.record_outcome(
            model_id,
            &record.opinion,
            record.consensus_signal,
            realized,
        );
        info!(
            model_id,
            opinion_id,
            request_id = %record.request_id,
            state = %health.state,
            rolling_error = health.rolling_error,
            "outcome settled"
        );
        Ok(health)
    }
}
