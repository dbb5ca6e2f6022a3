//! Concrete model adapters, one per model family.

pub mod evolutionary;
pub mod llm_reviewer;
pub mod probabilistic;
pub mod temporal;

use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::llm_client::LlmClient;
use crate::domain::ports::model_adapter::ModelAdapter;

use evolutionary::EvolutionaryAdapter;
use llm_reviewer::LlmReviewerAdapter;
use probabilistic::ProbabilisticAdapter;
use temporal::TemporalAdapter;

/// The standard ensemble. The LLM reviewer joins only when a client is configured.
pub fn default_adapters(
    llm: Option<Arc<dyn LlmClient>>,
    llm_timeout: Duration,
) -> Vec<Arc<dyn ModelAdapter>> {
    let mut adapters: Vec<Arc<dyn ModelAdapter>> = vec![
        Arc::new(TemporalAdapter::default()),
        Arc::new(ProbabilisticAdapter::default()),
        Arc::new(EvolutionaryAdapter::default()),
    ];
    if let Some(client) = llm {
        adapters.push(Arc::new(
            LlmReviewerAdapter::new(client).with_timeout(llm_timeout),
        ));
    }
    adapters
}
