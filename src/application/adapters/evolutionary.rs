//! Evolutionarily tuned heuristic model.
//!
//! Scores the snapshot with a small weight vector (the genome) produced by an
//! offline evolutionary search. Only the tuned genome ships here; the search
//! itself runs elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::error::AdapterError;
use crate::domain::ports::model_adapter::{ModelAdapter, ModelFamily};
use crate::domain::values::signal::Signal;

/// Tuned heuristic weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub w_sentiment: f64,
    pub w_volume: f64,
    /// Damping applied per unit of volatility above the 20% baseline.
    pub w_volatility: f64,
    pub bias: f64,
    pub entry_threshold: f64,
    /// Steepness of the score-to-confidence sigmoid.
    pub sharpness: f64,
}

impl Default for Genome {
    fn default() -> Self {
        Self {
            w_sentiment: 1.6,
            w_volume: 0.8,
            w_volatility: -0.6,
            bias: 0.0,
            entry_threshold: 0.25,
            sharpness: 4.0,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub struct EvolutionaryAdapter {
    model_id: String,
    genome: Genome,
}

impl Default for EvolutionaryAdapter {
    fn default() -> Self {
        Self::new("evolutionary", Genome::default())
    }
}

impl EvolutionaryAdapter {
    pub fn new(model_id: impl Into<String>, genome: Genome) -> Self {
        Self {
            model_id: model_id.into(),
            genome,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }
}

#[async_trait]
impl ModelAdapter for EvolutionaryAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Evolutionary
    }

    async fn predict(&self, snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
        let g = &self.genome;
        let mc = &snapshot.market_conditions;
        let sentiment = mc.sentiment_score.clamp(-1.0, 1.0);
        let vol = (mc.volatility_index / 100.0).max(0.0);

        // Volume confirms whatever direction sentiment points to.
        let direction = if sentiment > 0.0 {
            1.0
        } else if sentiment < 0.0 {
            -1.0
        } else {
            0.0
        };
        let sentiment_term = g.w_sentiment * sentiment;
        let volume_term = g.w_volume * (mc.volume_change_pct / 50.0).tanh() * direction;
        let damping = (1.0 + g.w_volatility * (vol - 0.2)).clamp(0.2, 1.5);
        let score = (sentiment_term + volume_term + g.bias) * damping;
        if !score.is_finite() {
            return Err(AdapterError::Model(format!("non-finite score {score}")));
        }

        let magnitude = score.abs();
        let (signal, confidence) = if magnitude > g.entry_threshold {
            let s = if score > 0.0 { Signal::Buy } else { Signal::Sell };
            (s, sigmoid(g.sharpness * (magnitude - g.entry_threshold)))
        } else {
            (Signal::Hold, sigmoid(g.sharpness * (g.entry_threshold - magnitude)))
        };

        // Share of the sub-rules pulling against the overall score.
        let terms = [sentiment_term, volume_term];
        let active = terms.iter().filter(|t| t.abs() > 1e-9).count();
        let dissent = terms
            .iter()
            .filter(|t| t.abs() > 1e-9 && t.signum() != score.signum())
            .count();
        let dissent_share = if active == 0 { 1.0 } else { dissent as f64 / active as f64 };
        let uncertainty = (0.15 + 0.5 * dissent_share + 0.3 * vol.min(1.0)).clamp(0.05, 0.95);

        Ok(ModelOpinion::new(
            &self.model_id,
            signal,
            confidence,
            uncertainty,
            vec![
                format!("heuristic score {score:.3} vs entry {:.3}", g.entry_threshold),
                format!("sentiment term {sentiment_term:.3}, volume term {volume_term:.3}"),
                format!("volatility damping x{damping:.2}"),
            ],
        ))
    }
}
