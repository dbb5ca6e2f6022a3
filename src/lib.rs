pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::adapters::default_adapters;
use crate::application::consensus::ConsensusEngine;
use crate::application::decide::DecideUseCase;
use crate::application::drift_monitor::DriftMonitor;
use crate::application::safety_gate::SafetyGate;
use crate::application::settle::SettleUseCase;
use crate::application::snapshot_builder::{DecisionRequest, SnapshotBuilder};
use crate::config::EngineConfig;
use crate::domain::entities::decision::Decision;
use crate::domain::entities::health::{HealthSnapshot, ModelHealthRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::llm_client::LlmClient;
use crate::domain::ports::model_adapter::ModelAdapter;
use crate::domain::ports::opinion_ledger::OpinionLedger;
use crate::domain::values::realized_outcome::RealizedOutcome;
use crate::infrastructure::ledger::memory::InMemoryOpinionLedger;
use crate::infrastructure::ledger::sqlite::SqliteOpinionLedger;
use crate::infrastructure::llm::openai::OpenAiChatClient;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct WillEngine {
    config: EngineConfig,
    decide_uc: DecideUseCase,
    settle_uc: SettleUseCase,
    drift: Arc<DriftMonitor>,
}

impl WillEngine {
    /// Standard ensemble. The LLM reviewer joins when `WILL_LLM_API_KEY` is set.
    pub fn new(config: EngineConfig) -> Result<Self, DomainError> {
        let llm: Option<Arc<dyn LlmClient>> = match std::env::var("WILL_LLM_API_KEY") {
            Ok(key) if !key.trim().is_empty() => match OpenAiChatClient::new(key, &config.llm) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(error = %e, "LLM reviewer disabled");
                    None
                }
            },
            _ => None,
        };
        let adapters = default_adapters(llm, Duration::from_millis(config.llm.timeout_ms));

        let ledger: Arc<dyn OpinionLedger> = match &config.ledger.path {
            Some(path) => Arc::new(SqliteOpinionLedger::open(path, config.ledger.capacity_per_model)?),
            None => Arc::new(InMemoryOpinionLedger::new(config.ledger.capacity_per_model)),
        };

        Self::with_components(config, adapters, ledger)
    }

    pub fn with_components(
        config: EngineConfig,
        adapters: Vec<Arc<dyn ModelAdapter>>,
        ledger: Arc<dyn OpinionLedger>,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let mut ids = HashSet::new();
        for adapter in &adapters {
            if !ids.insert(adapter.model_id().to_string()) {
                return Err(DomainError::Config(format!(
                    "duplicate model_id '{}'",
                    adapter.model_id()
                )));
            }
            let timeout = adapter.timeout().unwrap_or_else(|| config.cycle.adapter_timeout());
            if timeout >= config.cycle.cycle_deadline() {
                return Err(DomainError::Config(format!(
                    "adapter '{}' timeout {}ms must be below cycle.cycle_deadline_ms ({})",
                    adapter.model_id(),
                    timeout.as_millis(),
                    config.cycle.cycle_deadline_ms
                )));
            }
        }

        let drift = Arc::new(DriftMonitor::new(config.drift.clone()));
        for adapter in &adapters {
            drift.register(adapter.model_id());
        }
        info!(
            models = ?adapters.iter().map(|a| format!("{}:{}", a.model_id(), a.family())).collect::<Vec<_>>(),
            quorum = config.consensus.min_quorum,
            "engine ready"
        );

        let decide_uc = DecideUseCase::new(
            SnapshotBuilder::new(&config.snapshot)?,
            adapters,
            config.cycle.clone(),
            ConsensusEngine::new(config.consensus.clone()),
            SafetyGate::new(config.gate.clone(), &config.consensus),
            Arc::clone(&drift),
            Arc::clone(&ledger),
        );
        let settle_uc = SettleUseCase::new(ledger, Arc::clone(&drift));

        Ok(Self {
            config,
            decide_uc,
            settle_uc,
            drift,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.decide_uc
            .adapters()
            .iter()
            .map(|a| a.model_id().to_string())
            .collect()
    }

    // Delegating methods
    pub async fn decide_request(&self, raw: DecisionRequest) -> Result<Decision, DomainError> {
        self.decide_uc.execute(raw).await
    }

    pub fn record_outcome(
        &self,
        model_id: &str,
        opinion_id: &str,
        realized: RealizedOutcome,
    ) -> Result<ModelHealthRecord, DomainError> {
        self.settle_uc.record_outcome(model_id, opinion_id, realized)
    }

    pub fn get_health_snapshot(&self) -> HealthSnapshot {
        self.drift.get_health_snapshot()
    }

    pub fn retrain_candidates(&self) -> Vec<String> {
        self.drift.retrain_candidates()
    }
}
