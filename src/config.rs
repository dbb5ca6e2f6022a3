//! Engine configuration.
//!
//! Every threshold the engine uses lives here so calibration is a config
//! change. Loaded from TOML (every section optional) with defaults for
//! anything left out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::values::risk_profile::RiskProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub snapshot: SnapshotConfig,
    pub cycle: CycleConfig,
    pub consensus: ConsensusConfig,
    pub gate: GateConfig,
    pub drift: DriftConfig,
    pub ledger: LedgerConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Regex every asset identifier must match.
    pub asset_pattern: String,
    /// Optional explicit allow-list; ignored when empty.
    pub allowed_assets: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            asset_pattern: r"^[A-Z]{3}/?[A-Z]{3}$".to_string(),
            allowed_assets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub adapter_timeout_ms: u64,
    pub cycle_deadline_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_ms: 2_000,
            cycle_deadline_ms: 2_500,
        }
    }
}

impl CycleConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_millis(self.cycle_deadline_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub min_quorum: usize,
    /// uncertainty_score at or above this is HIGH risk.
    pub high_uncertainty_threshold: f64,
    /// confidence_score below this is HIGH risk.
    pub low_confidence_threshold: f64,
    /// Distance from either threshold that still counts as a marginal breach.
    pub marginal_band: f64,
    /// uncertainty_score above this always requires human confirmation.
    pub uncertainty_ceiling: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_quorum: 2,
            high_uncertainty_threshold: 0.4,
            low_confidence_threshold: 0.6,
            marginal_band: 0.05,
            uncertainty_ceiling: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub conservative_cap: f64,
    pub balanced_cap: f64,
    pub aggressive_cap: f64,
    /// Gated volumes below this turn the decision into HOLD.
    pub min_volume: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            conservative_cap: 0.4,
            balanced_cap: 0.8,
            aggressive_cap: 1.0,
            min_volume: 0.01,
        }
    }
}

impl GateConfig {
    /// Fraction of the requested volume a profile may trade.
    pub fn cap_for(&self, profile: RiskProfile) -> f64 {
        match profile {
            RiskProfile::Conservative => self.conservative_cap,
            RiskProfile::Balanced => self.balanced_cap,
            RiskProfile::Aggressive => self.aggressive_cap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Span of the rolling EMAs, in realized outcomes.
    pub window: usize,
    /// Outcomes required before error/disagreement can move a model's state.
    pub min_samples: u64,
    pub soft_error: f64,
    pub hard_error: f64,
    pub soft_disagreement: f64,
    pub hard_disagreement: f64,
    pub max_consecutive_failures: u32,
    pub cooldown_secs: i64,
    pub probation_window: u32,
    /// Realized returns within +/- this band count as HOLD being right.
    pub hold_band: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window: 50,
            min_samples: 10,
            soft_error: 0.25,
            hard_error: 0.40,
            soft_disagreement: 0.35,
            hard_disagreement: 0.60,
            max_consecutive_failures: 5,
            cooldown_secs: 1_800,
            probation_window: 20,
            hold_band: 0.0005,
        }
    }
}

impl DriftConfig {
    /// EMA smoothing factor for a span of `window` samples.
    pub fn alpha(&self) -> f64 {
        2.0 / (self.window.max(1) as f64 + 1.0)
    }

    pub fn cooldown(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file; in-memory ledger when absent.
    pub path: Option<PathBuf>,
    pub capacity_per_model: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity_per_model: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 1_500,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, or defaults when no path is given, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, DomainError> {
        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    DomainError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, DomainError> {
        toml::from_str(raw).map_err(|e| DomainError::Config(format!("invalid TOML: {e}")))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let unit = |name: &str, v: f64| -> Result<(), DomainError> {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(DomainError::Config(format!("{name} must be in [0, 1], got {v}")))
            }
        };

        regex::Regex::new(&self.snapshot.asset_pattern)
            .map_err(|e| DomainError::Config(format!("snapshot.asset_pattern: {e}")))?;

        if self.cycle.adapter_timeout_ms == 0 {
            return Err(DomainError::Config("cycle.adapter_timeout_ms must be > 0".into()));
        }
        if self.cycle.cycle_deadline_ms <= self.cycle.adapter_timeout_ms {
            return Err(DomainError::Config(format!(
                "cycle.cycle_deadline_ms ({}) must exceed cycle.adapter_timeout_ms ({})",
                self.cycle.cycle_deadline_ms, self.cycle.adapter_timeout_ms
            )));
        }

        let c = &self.consensus;
        if c.min_quorum == 0 {
            return Err(DomainError::Config("consensus.min_quorum must be >= 1".into()));
        }
        unit("consensus.high_uncertainty_threshold", c.high_uncertainty_threshold)?;
        unit("consensus.low_confidence_threshold", c.low_confidence_threshold)?;
        unit("consensus.marginal_band", c.marginal_band)?;
        unit("consensus.uncertainty_ceiling", c.uncertainty_ceiling)?;

        let g = &self.gate;
        unit("gate.conservative_cap", g.conservative_cap)?;
        unit("gate.balanced_cap", g.balanced_cap)?;
        unit("gate.aggressive_cap", g.aggressive_cap)?;
        if !g.min_volume.is_finite() || g.min_volume < 0.0 {
            return Err(DomainError::Config("gate.min_volume must be >= 0".into()));
        }

        let d = &self.drift;
        if d.window == 0 {
            return Err(DomainError::Config("drift.window must be >= 1".into()));
        }
        unit("drift.soft_error", d.soft_error)?;
        unit("drift.hard_error", d.hard_error)?;
        unit("drift.soft_disagreement", d.soft_disagreement)?;
        unit("drift.hard_disagreement", d.hard_disagreement)?;
        if d.soft_error > d.hard_error || d.soft_disagreement > d.hard_disagreement {
            return Err(DomainError::Config(
                "drift soft thresholds must not exceed hard thresholds".into(),
            ));
        }
        if d.max_consecutive_failures == 0 {
            return Err(DomainError::Config(
                "drift.max_consecutive_failures must be >= 1".into(),
            ));
        }
        if d.probation_window == 0 {
            return Err(DomainError::Config("drift.probation_window must be >= 1".into()));
        }
        if d.cooldown_secs < 0 {
            return Err(DomainError::Config("drift.cooldown_secs must be >= 0".into()));
        }
        if !d.hold_band.is_finite() || d.hold_band < 0.0 {
            return Err(DomainError::Config("drift.hold_band must be >= 0".into()));
        }

        if self.ledger.capacity_per_model == 0 {
            return Err(DomainError::Config("ledger.capacity_per_model must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [consensus]
            min_quorum = 3

            [drift]
            cooldown_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.consensus.min_quorum, 3);
        assert_eq!(cfg.consensus.low_confidence_threshold, 0.6);
        assert_eq!(cfg.drift.cooldown_secs, 60);
        assert_eq!(cfg.drift.window, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_deadline_must_exceed_adapter_timeout() {
        let mut cfg = EngineConfig::default();
        cfg.cycle.cycle_deadline_ms = cfg.cycle.adapter_timeout_ms;
        assert!(matches!(cfg.validate(), Err(DomainError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.consensus.high_uncertainty_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_asset_pattern() {
        let mut cfg = EngineConfig::default();
        cfg.snapshot.asset_pattern = "([A-Z".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_alpha_matches_window_span() {
        let cfg = DriftConfig::default();
        assert!((cfg.alpha() - 2.0 / 51.0).abs() < 1e-12);
    }
}
