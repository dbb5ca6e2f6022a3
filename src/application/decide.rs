//! One full decision cycle: snapshot, fan-out, consensus, gate, bookkeeping.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::application::consensus::ConsensusEngine;
use crate::application::drift_monitor::DriftMonitor;
use crate::application::fan_out::collect_opinions;
use crate::application::safety_gate::SafetyGate;
use crate::application::snapshot_builder::{DecisionRequest, SnapshotBuilder};
use crate::config::CycleConfig;
use crate::domain::entities::decision::Decision;
use crate::domain::entities::opinion::AdapterOutcome;
use crate::domain::error::DomainError;
use crate::domain::ports::model_adapter::ModelAdapter;
use crate::domain::ports::opinion_ledger::{OpinionLedger, OpinionRecord};

pub struct DecideUseCase {
    builder: SnapshotBuilder,
    adapters: Vec<Arc<dyn ModelAdapter>>,
    cycle: CycleConfig,
    consensus: ConsensusEngine,
    gate: SafetyGate,
    drift: Arc<DriftMonitor>,
    ledger: Arc<dyn OpinionLedger>,
}

impl DecideUseCase {
    pub fn new(
        builder: SnapshotBuilder,
        adapters: Vec<Arc<dyn ModelAdapter>>,
        cycle: CycleConfig,
        consensus: ConsensusEngine,
        gate: SafetyGate,
        drift: Arc<DriftMonitor>,
        ledger: Arc<dyn OpinionLedger>,
    ) -> Self {
        Self {
            builder,
            adapters,
            cycle,
            consensus,
            gate,
            drift,
            ledger,
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn ModelAdapter>] {
        &self.adapters
    }

    /// Only snapshot validation can fail the cycle; everything after it
    /// degrades into the returned decision.
    pub async fn execute(&self, raw: DecisionRequest) -> Result<Decision, DomainError> {
        let snapshot = Arc::new(self.builder.build(raw)?);
        let health = self.drift.get_health_snapshot();

        let outcomes = collect_opinions(&self.adapters, Arc::clone(&snapshot), &self.cycle).await;

        let decision = self.consensus.decide(&snapshot, &outcomes, &health);
        let consensus_signal = decision.fail_safe.is_none().then_some(decision.signal);
        let decision = self.gate.apply(decision, &snapshot, snapshot.risk_profile);

        for outcome in &outcomes {
            match outcome {
                AdapterOutcome::Opinion(o) => self.drift.record_success(&o.model_id),
                AdapterOutcome::Failure(f) => {
                    self.drift.record_failure(&f.model_id, &f.reason);
                }
            }
        }

        let participating: HashSet<&str> = decision
            .participating_models
            .iter()
            .map(String::as_str)
            .collect();
        let recorded_at = Utc::now();
        let records: Vec<OpinionRecord> = outcomes
            .iter()
            .filter_map(AdapterOutcome::opinion)
            .filter(|o| decision.opinion_ids.get(&o.model_id) == Some(&o.opinion_id))
            .map(|o| OpinionRecord {
                opinion: o.clone(),
                request_id: snapshot.request_id.clone(),
                asset: snapshot.asset.clone(),
                consensus_signal,
                included: participating.contains(o.model_id.as_str()),
                recorded_at,
                settled_at: None,
            })
            .collect();
        if let Err(e) = self.ledger.record(&records) {
            warn!(request_id = %snapshot.request_id, error = %e, "failed to record opinions");
        }

        info!(
            request_id = %decision.request_id,
            asset = %decision.asset,
            signal = %decision.signal,
            confidence = decision.confidence_score,
            uncertainty = decision.uncertainty_score,
            volume = decision.recommended_volume,
            risk = %decision.risk_assessment,
            confirm = decision.requires_human_confirmation,
            excluded = ?decision.excluded_models,
            "decision ready"
        );
        Ok(decision)
    }
}
