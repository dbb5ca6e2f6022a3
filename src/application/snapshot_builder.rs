//! Normalizes a raw decision request into a [`MarketSnapshot`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SnapshotConfig;
use crate::domain::entities::snapshot::{MarketConditions, MarketSnapshot, REQUIRED_CONDITIONS};
use crate::domain::error::{DomainError, ValidationError};
use crate::domain::values::risk_profile::RiskProfile;
use crate::domain::values::timeframe::Timeframe;

/// Inbound payload as handed over by the caller (typically an HTTP layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub request_id: String,
    pub asset: String,
    pub timeframe: String,
    pub market_conditions: HashMap<String, serde_json::Value>,
    pub requested_volume: f64,
    #[serde(default)]
    pub risk_profile: Option<String>,
    /// Defaults to the time the snapshot is built.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

pub struct SnapshotBuilder {
    asset_pattern: Regex,
    allowed_assets: Vec<String>,
}

impl SnapshotBuilder {
    pub fn new(config: &SnapshotConfig) -> Result<Self, DomainError> {
        let asset_pattern = Regex::new(&config.asset_pattern)
            .map_err(|e| DomainError::Config(format!("snapshot.asset_pattern: {e}")))?;
        Ok(Self {
            asset_pattern,
            allowed_assets: config
                .allowed_assets
                .iter()
                .map(|a| a.trim().to_uppercase())
                .collect(),
        })
    }

    /// Validate and normalize. Pure: no I/O, no retries.
    pub fn build(&self, raw: DecisionRequest) -> Result<MarketSnapshot, ValidationError> {
        let request_id = raw.request_id.trim().to_string();
        if request_id.is_empty() {
            return Err(ValidationError::new("request_id", "must not be empty"));
        }

        let asset = raw.asset.trim().to_uppercase();
        if !self.asset_pattern.is_match(&asset) {
            return Err(ValidationError::new(
                "asset",
                format!(
                    "'{}' does not match instrument format {}",
                    raw.asset,
                    self.asset_pattern.as_str()
                ),
            ));
        }
        if !self.allowed_assets.is_empty() && !self.allowed_assets.contains(&asset) {
            return Err(ValidationError::new(
                "asset",
                format!("'{asset}' is not an allow-listed instrument"),
            ));
        }

        let timeframe: Timeframe = raw
            .timeframe
            .parse()
            .map_err(|e: String| ValidationError::new("timeframe", e))?;

        if !raw.requested_volume.is_finite() || raw.requested_volume <= 0.0 {
            return Err(ValidationError::new(
                "requested_volume",
                format!("must be greater than zero, got {}", raw.requested_volume),
            ));
        }

        let risk_profile = match raw.risk_profile.as_deref() {
            None => RiskProfile::default(),
            Some(s) => s
                .parse()
                .map_err(|e: String| ValidationError::new("risk_profile", e))?,
        };

        let market_conditions = parse_conditions(&raw.market_conditions)?;

        Ok(MarketSnapshot {
            request_id,
            asset,
            timeframe,
            timestamp: raw.timestamp.unwrap_or_else(Utc::now),
            market_conditions,
            requested_volume: raw.requested_volume,
            risk_profile,
        })
    }
}

fn parse_conditions(
    raw: &HashMap<String, serde_json::Value>,
) -> Result<MarketConditions, ValidationError> {
    let mut values = [0.0_f64; REQUIRED_CONDITIONS.len()];
    for (slot, key) in values.iter_mut().zip(REQUIRED_CONDITIONS) {
        let field = format!("market_conditions.{key}");
        let value = raw
            .get(key)
            .ok_or_else(|| ValidationError::new(&field, "missing"))?;
        let number = value
            .as_f64()
            .ok_or_else(|| ValidationError::new(&field, format!("not numeric: {value}")))?;
        if !number.is_finite() {
            return Err(ValidationError::new(&field, "not finite"));
        }
        *slot = number;
    }

    let [volatility_index, current_price, sentiment_score, volume_change_pct] = values;
    if current_price <= 0.0 {
        return Err(ValidationError::new(
            "market_conditions.current_price",
            format!("must be positive, got {current_price}"),
        ));
    }

    Ok(MarketConditions {
        volatility_index,
        current_price,
        sentiment_score,
        volume_change_pct,
    })
}
