//! Probabilistic graphical model.
//!
//! A three-regime (up / down / flat) naive Bayes network: each regime has a
//! Gaussian likelihood for sentiment, volume surge and volatility. The
//! posterior picks the signal, its mass is the confidence, and its
//! normalized entropy is the uncertainty.

use std::f64::consts::PI;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::error::AdapterError;
use crate::domain::ports::model_adapter::{ModelAdapter, ModelFamily};
use crate::domain::values::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub std_dev: f64,
}

impl Gaussian {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.std_dev;
        -0.5 * z * z - (self.std_dev * (2.0 * PI).sqrt()).ln()
    }
}

/// Conditional distributions of the evidence given one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeModel {
    pub prior: f64,
    /// Sentiment score.
    pub sentiment: Gaussian,
    /// Absolute volume change, as a fraction.
    pub volume_surge: Gaussian,
    /// Volatility index, as a fraction.
    pub volatility: Gaussian,
}

impl RegimeModel {
    /// Log of prior times likelihood. Stays finite where the product of raw
    /// densities would underflow to zero.
    fn log_joint(&self, sentiment: f64, volume_surge: f64, volatility: f64) -> f64 {
        self.prior.ln()
            + self.sentiment.log_pdf(sentiment)
            + self.volume_surge.log_pdf(volume_surge)
            + self.volatility.log_pdf(volatility)
    }
}

pub struct ProbabilisticAdapter {
    model_id: String,
    up: RegimeModel,
    down: RegimeModel,
    flat: RegimeModel,
}

impl Default for ProbabilisticAdapter {
    fn default() -> Self {
        let trending_volume = Gaussian::new(0.15, 0.15);
        let trending_vol = Gaussian::new(0.20, 0.10);
        Self::new(
            "probabilistic",
            RegimeModel {
                prior: 1.0 / 3.0,
                sentiment: Gaussian::new(0.3, 0.3),
                volume_surge: trending_volume,
                volatility: trending_vol,
            },
            RegimeModel {
                prior: 1.0 / 3.0,
                sentiment: Gaussian::new(-0.3, 0.3),
                volume_surge: trending_volume,
                volatility: trending_vol,
            },
            RegimeModel {
                prior: 1.0 / 3.0,
                sentiment: Gaussian::new(0.0, 0.2),
                volume_surge: Gaussian::new(0.0, 0.08),
                volatility: Gaussian::new(0.12, 0.06),
            },
        )
    }
}

impl ProbabilisticAdapter {
    pub fn new(model_id: impl Into<String>, up: RegimeModel, down: RegimeModel, flat: RegimeModel) -> Self {
        Self {
            model_id: model_id.into(),
            up,
            down,
            flat,
        }
    }

    /// Posterior over (up, down, flat).
    pub fn posterior(&self, snapshot: &MarketSnapshot) -> Result<[f64; 3], AdapterError> {
        let mc = &snapshot.market_conditions;
        let sentiment = mc.sentiment_score.clamp(-1.0, 1.0);
        let surge = (mc.volume_change_pct / 100.0).abs();
        let volatility = (mc.volatility_index / 100.0).max(0.0);

        let log_joint = [
            self.up.log_joint(sentiment, surge, volatility),
            self.down.log_joint(sentiment, surge, volatility),
            self.flat.log_joint(sentiment, surge, volatility),
        ];
        // log-sum-exp around the largest term
        let max = log_joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(AdapterError::Model(format!(
                "degenerate posterior (max log joint {max}) for sentiment {sentiment}, surge {surge}, volatility {volatility}"
            )));
        }
        let scaled = log_joint.map(|l| (l - max).exp());
        let evidence: f64 = scaled.iter().sum();
        Ok(scaled.map(|p| p / evidence))
    }
}

fn normalized_entropy(p: &[f64; 3]) -> f64 {
    let h: f64 = p.iter().filter(|x| **x > 0.0).map(|x| -x * x.ln()).sum();
    (h / 3.0_f64.ln()).clamp(0.0, 1.0)
}

#[async_trait]
impl ModelAdapter for ProbabilisticAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Probabilistic
    }

    async fn predict(&self, snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
        let post = self.posterior(snapshot)?;
        let [p_up, p_down, p_flat] = post;

        let (signal, confidence) = if p_up > p_down && p_up > p_flat {
            (Signal::Buy, p_up)
        } else if p_down > p_up && p_down > p_flat {
            (Signal::Sell, p_down)
        } else {
            (Signal::Hold, p_flat.max(p_up).max(p_down))
        };

        Ok(ModelOpinion::new(
            &self.model_id,
            signal,
            confidence,
            normalized_entropy(&post),
            vec![format!(
                "regime posterior up {p_up:.2} / down {p_down:.2} / flat {p_flat:.2}"
            )],
        ))
    }
}
