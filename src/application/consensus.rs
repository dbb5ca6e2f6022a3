//! Consensus engine.
//!
//! Combines the opinions of one cycle into a single [`Decision`]:
//!
//! 1. Drop failures, opinions from excluded models and unusable opinions.
//! 2. Below quorum, return the fail-safe HOLD.
//! 3. Weight each survivor by `confidence * (1 - uncertainty) * (1 - rolling_disagreement)`.
//! 4. Weighted vote over BUY / SELL / HOLD. Ties go to HOLD; a BUY/SELL tie
//!    goes to the side whose voters report lower mean uncertainty.
//! 5. `confidence_score` is the agreeing side's weighted confidence over the
//!    total weight of all survivors, so split votes score low.
//! 6. `uncertainty_score` is the weighted mean uncertainty of all survivors.
//! 7. Risk is graded against the configured thresholds.
//!
//! `decide` is a pure function of its inputs (the snapshot timestamp stands in
//! for "now") and never fails: anomalies produce the fail-safe HOLD.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::config::ConsensusConfig;
use crate::domain::entities::decision::{Decision, VoteTotals};
use crate::domain::entities::health::HealthSnapshot;
use crate::domain::entities::opinion::{AdapterOutcome, ModelOpinion};
use crate::domain::entities::snapshot::MarketSnapshot;
use crate::domain::values::probability::Probability;
use crate::domain::values::risk_assessment::RiskAssessment;
use crate::domain::values::signal::Signal;

const TIE_EPSILON: f64 = 1e-9;

pub const FAIL_SAFE_QUORUM: &str = "insufficient_quorum";
pub const FAIL_SAFE_ZERO_WEIGHT: &str = "zero_total_weight";
pub const FAIL_SAFE_NON_FINITE: &str = "non_finite_score";

struct Weighted<'a> {
    opinion: &'a ModelOpinion,
    weight: f64,
}

/// Everything the filter step learned, shared by the normal and fail-safe paths.
struct Survivors<'a> {
    weighted: Vec<Weighted<'a>>,
    excluded: BTreeSet<String>,
    opinion_ids: BTreeMap<String, String>,
}

impl Survivors<'_> {
    fn participating(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .weighted
            .iter()
            .map(|w| w.opinion.model_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn decide(
        &self,
        snapshot: &MarketSnapshot,
        outcomes: &[AdapterOutcome],
        health: &HealthSnapshot,
    ) -> Decision {
        let survivors = self.filter(snapshot, outcomes, health);

        if survivors.weighted.len() < self.config.min_quorum {
            return self.fail_safe(snapshot, survivors, VoteTotals::default(), FAIL_SAFE_QUORUM);
        }

        let mut totals = VoteTotals::default();
        for w in &survivors.weighted {
            totals.add(w.opinion.signal, w.weight);
        }
        let total_weight = totals.total();
        if !total_weight.is_finite() || total_weight <= 0.0 {
            return self.fail_safe(snapshot, survivors, totals, FAIL_SAFE_ZERO_WEIGHT);
        }

        let winner = select_winner(&totals, &survivors.weighted);

        let agreeing_mass: f64 = survivors
            .weighted
            .iter()
            .filter(|w| w.opinion.signal == winner)
            .map(|w| w.weight * w.opinion.confidence)
            .sum();
        let uncertainty_mass: f64 = survivors
            .weighted
            .iter()
            .map(|w| w.weight * w.opinion.uncertainty)
            .sum();
        let confidence_score = agreeing_mass / total_weight;
        let uncertainty_score = uncertainty_mass / total_weight;
        if !confidence_score.is_finite() || !uncertainty_score.is_finite() {
            return self.fail_safe(snapshot, survivors, totals, FAIL_SAFE_NON_FINITE);
        }
        let confidence_score = Probability::saturating(confidence_score).value();
        let uncertainty_score = Probability::saturating(uncertainty_score).value();

        let risk_assessment = self.assess_risk(confidence_score, uncertainty_score);
        let requires_human_confirmation = risk_assessment == RiskAssessment::High
            || uncertainty_score > self.config.uncertainty_ceiling;

        let decision = Decision {
            request_id: snapshot.request_id.clone(),
            asset: snapshot.asset.clone(),
            signal: winner,
            confidence_score,
            uncertainty_score,
            recommended_volume: if winner == Signal::Hold {
                0.0
            } else {
                snapshot.requested_volume
            },
            risk_assessment,
            requires_human_confirmation,
            supporting_factors: merge_rationale(&survivors.weighted, winner),
            participating_models: survivors.participating(),
            excluded_models: survivors.excluded,
            opinion_ids: survivors.opinion_ids,
            vote_totals: totals,
            gate_adjustments: Vec::new(),
            fail_safe: None,
            decided_at: snapshot.timestamp,
        };

        debug!(
            request_id = %decision.request_id,
            signal = %decision.signal,
            confidence = decision.confidence_score,
            uncertainty = decision.uncertainty_score,
            risk = %decision.risk_assessment,
            "consensus reached"
        );
        decision
    }

    /// HIGH when either threshold is breached, MODERATE within the marginal
    /// band of either, LOW otherwise.
    pub fn assess_risk(&self, confidence_score: f64, uncertainty_score: f64) -> RiskAssessment {
        let c = &self.config;
        if uncertainty_score >= c.high_uncertainty_threshold
            || confidence_score < c.low_confidence_threshold
        {
            RiskAssessment::High
        } else if uncertainty_score >= c.high_uncertainty_threshold - c.marginal_band
            || confidence_score < c.low_confidence_threshold + c.marginal_band
        {
            RiskAssessment::Moderate
        } else {
            RiskAssessment::Low
        }
    }

    fn filter<'a>(
        &self,
        snapshot: &MarketSnapshot,
        outcomes: &'a [AdapterOutcome],
        health: &HealthSnapshot,
    ) -> Survivors<'a> {
        let now = snapshot.timestamp;
        let mut weighted = Vec::new();
        let mut excluded = BTreeSet::new();
        let mut opinion_ids = BTreeMap::new();
        let mut seen = HashSet::new();

        for outcome in outcomes {
            if !seen.insert(outcome.model_id()) {
                warn!(model_id = %outcome.model_id(), "duplicate outcome for model, keeping the first");
                continue;
            }
            let opinion = match outcome {
                AdapterOutcome::Failure(f) => {
                    excluded.insert(f.model_id.clone());
                    continue;
                }
                AdapterOutcome::Opinion(o) => o,
            };
            opinion_ids.insert(opinion.model_id.clone(), opinion.opinion_id.clone());

            let record = health.get(&opinion.model_id);
            if record.is_some_and(|r| r.is_excluded_at(now)) || opinion.validate().is_err() {
                excluded.insert(opinion.model_id.clone());
                continue;
            }

            let disagreement = record
                .map(|r| Probability::saturating(r.rolling_disagreement).value())
                .unwrap_or(0.0);
            let weight = (opinion.confidence * (1.0 - opinion.uncertainty) * (1.0 - disagreement))
                .max(0.0);
            weighted.push(Weighted { opinion, weight });
        }

        Survivors {
            weighted,
            excluded,
            opinion_ids,
        }
    }

    fn fail_safe(
        &self,
        snapshot: &MarketSnapshot,
        survivors: Survivors<'_>,
        totals: VoteTotals,
        reason: &str,
    ) -> Decision {
        warn!(
            request_id = %snapshot.request_id,
            reason,
            surviving = survivors.weighted.len(),
            quorum = self.config.min_quorum,
            "consensus fell back to fail-safe HOLD"
        );
        Decision {
            request_id: snapshot.request_id.clone(),
            asset: snapshot.asset.clone(),
            signal: Signal::Hold,
            confidence_score: 0.0,
            uncertainty_score: 1.0,
            recommended_volume: 0.0,
            risk_assessment: RiskAssessment::High,
            requires_human_confirmation: true,
            supporting_factors: vec![format!(
                "fail-safe: {reason} ({} of {} required opinions usable)",
                survivors.weighted.len(),
                self.config.min_quorum
            )],
            participating_models: survivors.participating(),
            excluded_models: survivors.excluded,
            opinion_ids: survivors.opinion_ids,
            vote_totals: totals,
            gate_adjustments: Vec::new(),
            fail_safe: Some(reason.to_string()),
            decided_at: snapshot.timestamp,
        }
    }
}

fn select_winner(totals: &VoteTotals, weighted: &[Weighted<'_>]) -> Signal {
    let max = totals.buy.max(totals.sell).max(totals.hold);
    let tied: Vec<Signal> = Signal::ALL
        .into_iter()
        .filter(|s| (max - totals.get(*s)).abs() <= TIE_EPSILON)
        .collect();

    if tied.contains(&Signal::Hold) {
        return Signal::Hold;
    }
    if let [only] = tied.as_slice() {
        return *only;
    }

    // BUY and SELL tied with HOLD behind: trust the less uncertain camp.
    let buy_u = mean_uncertainty(weighted, Signal::Buy);
    let sell_u = mean_uncertainty(weighted, Signal::Sell);
    if (buy_u - sell_u).abs() <= TIE_EPSILON {
        Signal::Hold
    } else if buy_u < sell_u {
        Signal::Buy
    } else {
        Signal::Sell
    }
}

fn mean_uncertainty(weighted: &[Weighted<'_>], signal: Signal) -> f64 {
    let voters: Vec<f64> = weighted
        .iter()
        .filter(|w| w.opinion.signal == signal)
        .map(|w| w.opinion.uncertainty)
        .collect();
    if voters.is_empty() {
        return 1.0;
    }
    voters.iter().sum::<f64>() / voters.len() as f64
}

/// Agreeing models first, then dissenters, each block ordered by model_id.
fn merge_rationale(weighted: &[Weighted<'_>], winner: Signal) -> Vec<String> {
    let mut ordered: Vec<&Weighted<'_>> = weighted.iter().collect();
    ordered.sort_by(|a, b| {
        (a.opinion.signal != winner)
            .cmp(&(b.opinion.signal != winner))
            .then_with(|| a.opinion.model_id.cmp(&b.opinion.model_id))
    });

    let mut seen = HashSet::new();
    let mut factors = Vec::new();
    for w in ordered {
        let tag = if w.opinion.signal == winner {
            w.opinion.model_id.clone()
        } else {
            format!("{} (dissent: {})", w.opinion.model_id, w.opinion.signal)
        };
        for reason in &w.opinion.rationale {
            let line = format!("{tag}: {reason}");
            if seen.insert(line.clone()) {
                factors.push(line);
            }
        }
    }
    factors
}
