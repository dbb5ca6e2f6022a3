//! Shared test helpers: builders and stub adapters.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use will_core::application::snapshot_builder::DecisionRequest;
use will_core::config::EngineConfig;
use will_core::domain::entities::health::{HealthSnapshot, ModelHealthRecord};
use will_core::domain::entities::opinion::{AdapterOutcome, ModelOpinion};
use will_core::domain::entities::snapshot::{MarketConditions, MarketSnapshot};
use will_core::domain::error::AdapterError;
use will_core::domain::ports::model_adapter::{ModelAdapter, ModelFamily};
use will_core::domain::values::risk_profile::RiskProfile;
use will_core::domain::values::signal::Signal;
use will_core::domain::values::timeframe::Timeframe;
use will_core::infrastructure::ledger::memory::InMemoryOpinionLedger;
use will_core::WillEngine;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
}

pub fn snapshot(volume: f64) -> MarketSnapshot {
    MarketSnapshot {
        request_id: "req-1".into(),
        asset: "EURUSD".into(),
        timeframe: Timeframe::H1,
        timestamp: t0(),
        market_conditions: MarketConditions {
            volatility_index: 18.0,
            current_price: 1.0842,
            sentiment_score: 0.2,
            volume_change_pct: 5.0,
        },
        requested_volume: volume,
        risk_profile: RiskProfile::Balanced,
    }
}

pub fn request(request_id: &str) -> DecisionRequest {
    serde_json::from_value(serde_json::json!({
        "request_id": request_id,
        "asset": "EURUSD",
        "timeframe": "H1",
        "market_conditions": {
            "volatility_index": 18.0,
            "current_price": 1.0842,
            "sentiment_score": 0.2,
            "volume_change_pct": 5.0
        },
        "requested_volume": 10.0,
        "risk_profile": "aggressive",
        "timestamp": "2026-03-02T14:00:00Z"
    }))
    .unwrap()
}

pub fn opinion(model_id: &str, signal: Signal, confidence: f64, uncertainty: f64) -> ModelOpinion {
    ModelOpinion::new(
        model_id,
        signal,
        confidence,
        uncertainty,
        vec![format!("{model_id} says {signal}")],
    )
}

pub fn vote(model_id: &str, signal: Signal, confidence: f64, uncertainty: f64) -> AdapterOutcome {
    AdapterOutcome::Opinion(opinion(model_id, signal, confidence, uncertainty))
}

pub fn no_health() -> HealthSnapshot {
    BTreeMap::new()
}

pub fn health_with(records: Vec<ModelHealthRecord>) -> HealthSnapshot {
    records.into_iter().map(|r| (r.model_id.clone(), r)).collect()
}

/// Fast cycle so timeout tests stay quick.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cycle.adapter_timeout_ms = 100;
    config.cycle.cycle_deadline_ms = 300;
    config
}

pub fn engine(config: EngineConfig, adapters: Vec<Arc<dyn ModelAdapter>>) -> WillEngine {
    let ledger = Arc::new(InMemoryOpinionLedger::new(config.ledger.capacity_per_model));
    WillEngine::with_components(config, adapters, ledger).unwrap()
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Answer(Signal, f64, f64),
    Fail,
    Panic,
    /// Sleep, then answer.
    Slow(Duration, Signal),
}

/// Adapter whose behavior can be switched between cycles.
pub struct ScriptedAdapter {
    id: String,
    behavior: Mutex<Behavior>,
    timeout: Option<Duration>,
}

impl ScriptedAdapter {
    pub fn new(id: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior: Mutex::new(behavior),
            timeout: None,
        })
    }

    pub fn with_timeout(id: &str, behavior: Behavior, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior: Mutex::new(behavior),
            timeout: Some(timeout),
        })
    }

    pub fn answering(id: &str, signal: Signal, confidence: f64, uncertainty: f64) -> Arc<Self> {
        Self::new(id, Behavior::Answer(signal, confidence, uncertainty))
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Evolutionary
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn predict(&self, _snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Answer(signal, c, u) => Ok(opinion(&self.id, signal, c, u)),
            Behavior::Fail => Err(AdapterError::Model("scripted failure".into())),
            Behavior::Panic => panic!("scripted panic in {}", self.id),
            Behavior::Slow(delay, signal) => {
                tokio::time::sleep(delay).await;
                Ok(opinion(&self.id, signal, 0.8, 0.1))
            }
        }
    }
}
