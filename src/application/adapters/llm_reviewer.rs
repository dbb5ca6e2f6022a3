//! LLM-assisted qualitative reviewer.
//!
//! Hands the snapshot to a language model and expects a JSON verdict back:
//! `{"signal": "BUY|SELL|HOLD", "confidence": 0..1, "uncertainty": 0..1, "factors": [..]}`.
//! Replies wrapped in prose or code fences are accepted as long as they
//! contain one JSON object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::error::AdapterError;
use crate::domain::ports::llm_client::LlmClient;
use crate::domain::ports::model_adapter::{ModelAdapter, ModelFamily};
use crate::domain::values::signal::Signal;

const SYSTEM_PROMPT: &str = "You review trading setups. Reply with a single JSON object \
with keys signal (BUY, SELL or HOLD), confidence (0-1), uncertainty (0-1) and factors \
(list of short strings). No other text.";

#[derive(Debug, Deserialize)]
struct Verdict {
    signal: String,
    confidence: f64,
    uncertainty: f64,
    #[serde(default)]
    factors: Vec<String>,
}

pub struct LlmReviewerAdapter {
    model_id: String,
    client: Arc<dyn LlmClient>,
    timeout: Option<Duration>,
}

impl LlmReviewerAdapter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            model_id: "llm_reviewer".to_string(),
            client,
            timeout: None,
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn user_prompt(snapshot: &MarketSnapshot) -> String {
    json!({
        "asset": snapshot.asset,
        "timeframe": snapshot.timeframe.to_string(),
        "timestamp": snapshot.timestamp.to_rfc3339(),
        "market_conditions": snapshot.market_conditions,
        "risk_profile": snapshot.risk_profile.to_string(),
    })
    .to_string()
}

fn parse_verdict(reply: &str) -> Result<Verdict, AdapterError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(AdapterError::Parse(format!("no JSON object in reply: {reply}"))),
    };
    let verdict: Verdict =
        serde_json::from_str(body).map_err(|e| AdapterError::Parse(format!("bad verdict: {e}")))?;
    for (name, value) in [("confidence", verdict.confidence), ("uncertainty", verdict.uncertainty)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(AdapterError::Parse(format!("{name} out of range: {value}")));
        }
    }
    Ok(verdict)
}

#[async_trait]
impl ModelAdapter for LlmReviewerAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::LlmReviewer
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn predict(&self, snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
        let reply = self
            .client
            .complete(SYSTEM_PROMPT, &user_prompt(snapshot))
            .await
            .map_err(|e| AdapterError::Unavailable(format!("{}: {e}", self.client.name())))?;

        let verdict = parse_verdict(&reply)?;
        let signal: Signal = verdict.signal.parse().map_err(AdapterError::Parse)?;

        Ok(ModelOpinion::new(
            &self.model_id,
            signal,
            verdict.confidence,
            verdict.uncertainty,
            verdict.factors,
        ))
    }
}
