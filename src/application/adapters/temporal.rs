//! Temporal sequence model.
//!
//! Keeps a bounded price history per instrument and timeframe and reads
//! momentum from a fast/slow EMA spread, normalized by the per-bar
//! volatility implied by the volatility index.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::error::AdapterError;
use crate::domain::ports::model_adapter::{ModelAdapter, ModelFamily};
use crate::domain::values::probability::Probability;
use crate::domain::values::signal::Signal;

const MINUTES_PER_YEAR: f64 = 365.0 * 1_440.0;

pub struct TemporalAdapter {
    model_id: String,
    lookback: usize,
    fast_span: usize,
    slow_span: usize,
    /// Normalized momentum needed before leaving HOLD.
    entry_z: f64,
    history: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl Default for TemporalAdapter {
    fn default() -> Self {
        Self::new("temporal", 32, 5, 20, 1.0)
    }
}

impl TemporalAdapter {
    pub fn new(
        model_id: impl Into<String>,
        lookback: usize,
        fast_span: usize,
        slow_span: usize,
        entry_z: f64,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            lookback: lookback.max(3),
            fast_span: fast_span.max(1),
            slow_span: slow_span.max(fast_span + 1),
            entry_z,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Append the snapshot's price and return the series it belongs to.
    fn observe(&self, snapshot: &MarketSnapshot) -> Result<Vec<f64>, AdapterError> {
        let mut history = self
            .history
            .lock()
            .map_err(|e| AdapterError::Model(format!("history lock poisoned: {e}")))?;
        let series = history.entry(snapshot.series_key()).or_default();
        series.push_back(snapshot.market_conditions.current_price);
        while series.len() > self.lookback {
            series.pop_front();
        }
        Ok(series.iter().copied().collect())
    }
}

fn ema(values: &[f64], span: usize) -> f64 {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    iter.fold(*first, |acc, v| alpha * v + (1.0 - alpha) * acc)
}

#[async_trait]
impl ModelAdapter for TemporalAdapter {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Temporal
    }

    async fn predict(&self, snapshot: &MarketSnapshot) -> Result<ModelOpinion, AdapterError> {
        let series = self.observe(snapshot)?;
        let vix = snapshot.market_conditions.volatility_index.max(0.0);

        if series.len() < 3 {
            return Ok(ModelOpinion::new(
                &self.model_id,
                Signal::Hold,
                0.35,
                0.9,
                vec![format!(
                    "warming up: {} of {} bars observed",
                    series.len(),
                    self.lookback
                )],
            ));
        }

        let fast = ema(&series, self.fast_span);
        let slow = ema(&series, self.slow_span);
        if slow <= 0.0 {
            return Err(AdapterError::Model(format!("non-positive slow EMA {slow}")));
        }
        let momentum = (fast - slow) / slow;
        let bar_vol = ((vix / 100.0) * (snapshot.timeframe.minutes() as f64 / MINUTES_PER_YEAR).sqrt())
            .max(1e-6);
        let z = momentum / bar_vol;

        let (signal, confidence) = if z > self.entry_z {
            (Signal::Buy, 0.5 + 0.45 * (z / (2.0 * self.entry_z)).min(1.0))
        } else if z < -self.entry_z {
            (Signal::Sell, 0.5 + 0.45 * (-z / (2.0 * self.entry_z)).min(1.0))
        } else {
            (Signal::Hold, 0.5 + 0.3 * (1.0 - z.abs() / self.entry_z))
        };

        let fill = series.len() as f64 / self.lookback as f64;
        let uncertainty = 0.1 + 0.5 * (1.0 - fill) + 0.4 * (vix / 80.0).min(1.0);

        Ok(ModelOpinion::new(
            &self.model_id,
            signal,
            Probability::saturating(confidence).value(),
            uncertainty.clamp(0.05, 0.95),
            vec![
                format!("EMA{} {:.5} vs EMA{} {:.5}", self.fast_span, fast, self.slow_span, slow),
                format!("volatility-normalized momentum z={z:.2}"),
                format!("{} bars of history", series.len()),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::snapshot::MarketConditions;
    use crate::domain::values::risk_profile::RiskProfile;
    use crate::domain::values::timeframe::Timeframe;
    use chrono::Utc;

    fn snap(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            request_id: "r".into(),
            asset: "EURUSD".into(),
            timeframe: Timeframe::H1,
            timestamp: Utc::now(),
            market_conditions: MarketConditions {
                volatility_index: 10.0,
                current_price: price,
                sentiment_score: 0.0,
                volume_change_pct: 0.0,
            },
            requested_volume: 1.0,
            risk_profile: RiskProfile::Balanced,
        }
    }

    #[tokio::test]
    async fn test_warms_up_with_hold() {
        let adapter = TemporalAdapter::default();
        let op = adapter.predict(&snap(1.10)).await.unwrap();
        assert_eq!(op.signal, Signal::Hold);
        assert!(op.uncertainty >= 0.9);
    }

    #[tokio::test]
    async fn test_rising_series_buys() {
        let adapter = TemporalAdapter::default();
        let mut last = None;
        for i in 0..30 {
            last = Some(adapter.predict(&snap(1.10 * (1.0 + 0.002 * i as f64))).await.unwrap());
        }
        let op = last.unwrap();
        assert_eq!(op.signal, Signal::Buy);
        assert!(op.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_falling_series_sells() {
        let adapter = TemporalAdapter::default();
        let mut last = None;
        for i in 0..30 {
            last = Some(adapter.predict(&snap(1.10 * (1.0 - 0.002 * i as f64))).await.unwrap());
        }
        assert_eq!(last.unwrap().signal, Signal::Sell);
    }

    #[test]
    fn test_ema_of_constant_series() {
        assert!((ema(&[2.0, 2.0, 2.0], 5) - 2.0).abs() < 1e-12);
        assert_eq!(ema(&[], 5), 0.0);
    }
}
