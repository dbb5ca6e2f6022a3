use crate::domain::values::risk_assessment::RiskAssessment;
use crate::domain::values::signal::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weighted vote per signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTotals {
    pub buy: f64,
    pub sell: f64,
    pub hold: f64,
}

impl VoteTotals {
    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Buy => self.buy,
            Signal::Sell => self.sell,
            Signal::Hold => self.hold,
        }
    }

    pub fn add(&mut self, signal: Signal, weight: f64) {
        match signal {
            Signal::Buy => self.buy += weight,
            Signal::Sell => self.sell += weight,
            Signal::Hold => self.hold += weight,
        }
    }

    pub fn total(&self) -> f64 {
        self.buy + self.sell + self.hold
    }
}

/// The engine's output for one request; maps directly onto an order ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub request_id: String,
    pub asset: String,
    pub signal: Signal,
    pub confidence_score: f64,
    pub uncertainty_score: f64,
    pub recommended_volume: f64,
    pub risk_assessment: RiskAssessment,
    pub requires_human_confirmation: bool,
    pub supporting_factors: Vec<String>,
    pub excluded_models: BTreeSet<String>,
    pub participating_models: Vec<String>,
    /// model_id -> opinion_id, for settlement callbacks.
    pub opinion_ids: BTreeMap<String, String>,
    pub vote_totals: VoteTotals,
    /// Constraints the safety gate applied, in order.
    pub gate_adjustments: Vec<String>,
    /// Set when consensus fell back to the conservative HOLD.
    pub fail_safe: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    /// Whether the execution collaborator may route this without a human.
    pub fn is_auto_executable(&self) -> bool {
        self.signal != Signal::Hold
            && self.recommended_volume > 0.0
            && !self.requires_human_confirmation
    }
}
