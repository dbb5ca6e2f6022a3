//! Model adapter port.
//!
//! Every predictive model family participates in consensus through
//! [`ModelAdapter`]. Consensus never sees model internals, only the
//! [`ModelOpinion`] an adapter returns, so a new family is added by writing
//! one more implementation and registering it with the engine.
//!
//! Adapters are allowed to be slow or to fail. The fan-out layer wraps every
//! call with a timeout and converts errors and panics into `AdapterFailure`
//! values, so an implementation only has to report its own errors honestly.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::error::AdapterError;

/// Which kind of model sits behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Temporal,
    Probabilistic,
    Evolutionary,
    LlmReviewer,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Temporal => write!(f, "temporal"),
            ModelFamily::Probabilistic => write!(f, "probabilistic"),
            ModelFamily::Evolutionary => write!(f, "evolutionary"),
            ModelFamily::LlmReviewer => write!(f, "llm_reviewer"),
        }
    }
}

/// Trait for predictive models taking part in consensus.
///
/// # Example
///
/// ```ignore
/// struct AlwaysHold;
///
/// #[async_trait]
/// impl ModelAdapter for AlwaysHold {
///     fn model_id(&self) -> &str { "always_hold" }
///     fn family(&self) -> ModelFamily { ModelFamily::Evolutionary }
///
///     async fn predict(&self, _s: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
///         Ok(ModelOpinion::new("always_hold", Signal::Hold, 0.5, 0.5, vec![]))
///     }
/// }
/// ```
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Stable identifier; keys health records and ledger entries.
    fn model_id(&self) -> &str;

    fn family(&self) -> ModelFamily;

    /// Per-model timeout. `None` uses the cycle's default adapter timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Produce an opinion for the snapshot.
    async fn predict(&self, snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError>;
}
