use crate::domain::values::risk_profile::RiskProfile;
use crate::domain::values::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keys every request must carry in `market_conditions`.
pub const REQUIRED_CONDITIONS: [&str; 4] = [
    "volatility_index",
    "current_price",
    "sentiment_score",
    "volume_change_pct",
];

/// Named numeric indicators describing the market at request time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub volatility_index: f64,
    pub current_price: f64,
    /// Aggregated news/social sentiment, nominally in [-1, 1].
    pub sentiment_score: f64,
    pub volume_change_pct: f64,
}

/// Immutable input for one decision cycle. Fields are public, so a
/// hand-built value carries no validation guarantee; `WillEngine` only
/// decides on snapshots produced by `SnapshotBuilder::build`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub request_id: String,
    pub asset: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub market_conditions: MarketConditions,
    pub requested_volume: f64,
    pub risk_profile: RiskProfile,
}

impl MarketSnapshot {
    /// Key identifying the price series this snapshot belongs to.
    pub fn series_key(&self) -> String {
        format!("{}@{}", self.asset, self.timeframe)
    }
}
