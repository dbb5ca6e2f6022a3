//! Risk & safety gate: the last step before a decision is executable.
//!
//! The gate only ever tightens a decision. Every constraint it applies is
//! appended to `Decision::gate_adjustments`, which is the only way a caller
//! can tell that the gate intervened.

use tracing::info;

use crate::config::{ConsensusConfig, GateConfig};
use crate::domain::entities::decision::Decision;
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::values::risk_assessment::RiskAssessment;
use crate::domain::values::risk_profile::RiskProfile;
use crate::domain::values::signal::Signal;

pub struct SafetyGate {
    gate: GateConfig,
    low_confidence_threshold: f64,
    uncertainty_ceiling: f64,
}

impl SafetyGate {
    pub fn new(gate: GateConfig, consensus: &ConsensusConfig) -> Self {
        Self {
            gate,
            low_confidence_threshold: consensus.low_confidence_threshold,
            uncertainty_ceiling: consensus.uncertainty_ceiling,
        }
    }

    /// Cap volume and enforce the confirmation policy. Never fails.
    pub fn apply(
        &self,
        mut decision: Decision,
        snapshot: &MarketSnapshot,
        risk_profile: RiskProfile,
    ) -> Decision {
        let requested = snapshot.requested_volume;

        if decision.signal != Signal::Hold {
            let mut volume = decision.recommended_volume.min(requested);

            let cap = self.gate.cap_for(risk_profile) * requested;
            if volume > cap {
                volume = cap;
                decision.gate_adjustments.push(format!("risk_profile_cap:{risk_profile}"));
            }

            if decision.confidence_score < self.low_confidence_threshold {
                let scale = if self.low_confidence_threshold > 0.0 {
                    (decision.confidence_score / self.low_confidence_threshold).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                volume *= scale;
                decision
                    .gate_adjustments
                    .push(format!("low_confidence_scale:{scale:.3}"));
            }

            if !volume.is_finite() || volume <= 0.0 || volume < self.gate.min_volume {
                decision.gate_adjustments.push("below_min_volume".to_string());
                decision
                    .supporting_factors
                    .push(format!("gate: {} forced to HOLD, volume {volume:.4} not tradable", decision.signal));
                decision.signal = Signal::Hold;
                volume = 0.0;
            }
            decision.recommended_volume = volume;
        }

        // HOLD never carries volume.
        if decision.signal == Signal::Hold {
            decision.recommended_volume = 0.0;
        }

        if decision.risk_assessment == RiskAssessment::High && !decision.requires_human_confirmation {
            decision.requires_human_confirmation = true;
            decision.gate_adjustments.push("high_risk_confirmation".to_string());
        }
        if decision.uncertainty_score > self.uncertainty_ceiling
            && !decision.requires_human_confirmation
        {
            decision.requires_human_confirmation = true;
            decision
                .gate_adjustments
                .push("uncertainty_ceiling_confirmation".to_string());
        }

        if !decision.gate_adjustments.is_empty() {
            info!(
                request_id = %decision.request_id,
                adjustments = ?decision.gate_adjustments,
                volume = decision.recommended_volume,
                "safety gate tightened decision"
            );
        }
        decision
    }
}
