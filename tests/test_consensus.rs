mod common;

use chrono::Duration;
use common::{health_with, no_health, snapshot, vote};
use will_core::application::consensus::{ConsensusEngine, FAIL_SAFE_QUORUM, FAIL_SAFE_ZERO_WEIGHT};
use will_core::config::ConsensusConfig;
use will_core::domain::entities::health::ModelHealthRecord;
use will_core::domain::entities::opinion::{AdapterFailure, AdapterOutcome, FailureReason};
use will_core::domain::values::health_state::HealthState;
use will_core::domain::values::risk_assessment::RiskAssessment;
use will_core::domain::values::signal::Signal;

fn engine() -> ConsensusEngine {
    ConsensusEngine::new(ConsensusConfig::default())
}

#[test]
fn test_confident_buy_beats_uncertain_sell() {
    let outcomes = vec![
        vote("temporal", Signal::Buy, 0.9, 0.1),
        vote("probabilistic", Signal::Sell, 0.5, 0.5),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());

    assert_eq!(d.signal, Signal::Buy);
    assert!(d.confidence_score > 0.6, "confidence {}", d.confidence_score);
    assert!(matches!(d.risk_assessment, RiskAssessment::Low | RiskAssessment::Moderate));
    // 0.81 * 0.9 / (0.81 + 0.25)
    assert!((d.confidence_score - 0.729 / 1.06).abs() < 1e-9);
    assert!((d.uncertainty_score - 0.206 / 1.06).abs() < 1e-9);
    assert!((d.vote_totals.buy - 0.81).abs() < 1e-9);
    assert!((d.vote_totals.sell - 0.25).abs() < 1e-9);
    assert!(d.fail_safe.is_none());
    assert_eq!(d.participating_models, vec!["probabilistic".to_string(), "temporal".to_string()]);
}

#[test]
fn test_uniformly_uncertain_models_are_high_risk() {
    let outcomes = vec![
        vote("a", Signal::Buy, 0.95, 0.8),
        vote("b", Signal::Buy, 0.9, 0.85),
        vote("c", Signal::Sell, 0.7, 0.9),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.risk_assessment, RiskAssessment::High);
    assert!(d.requires_human_confirmation);
    assert!(d.uncertainty_score >= 0.8);
}

#[test]
fn test_below_quorum_fails_safe() {
    let outcomes = vec![
        vote("a", Signal::Buy, 0.99, 0.01),
        AdapterOutcome::Failure(AdapterFailure::new("b", FailureReason::Timeout, 2000)),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.signal, Signal::Hold);
    assert!(d.requires_human_confirmation);
    assert_eq!(d.risk_assessment, RiskAssessment::High);
    assert_eq!(d.recommended_volume, 0.0);
    assert_eq!(d.fail_safe.as_deref(), Some(FAIL_SAFE_QUORUM));
    assert!(d.excluded_models.contains("b"));
}

#[test]
fn test_no_opinions_fails_safe() {
    let d = engine().decide(&snapshot(10.0), &[], &no_health());
    assert_eq!(d.signal, Signal::Hold);
    assert_eq!(d.fail_safe.as_deref(), Some(FAIL_SAFE_QUORUM));
}

#[test]
fn test_all_zero_weights_fail_safe() {
    let outcomes = vec![
        vote("a", Signal::Buy, 0.0, 0.1),
        vote("b", Signal::Sell, 0.7, 1.0),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.signal, Signal::Hold);
    assert_eq!(d.fail_safe.as_deref(), Some(FAIL_SAFE_ZERO_WEIGHT));
    assert!(d.requires_human_confirmation);
}

#[test]
fn test_excluded_model_is_filtered_but_traceable() {
    let snap = snapshot(10.0);
    let mut excluded = ModelHealthRecord::new("evolutionary");
    excluded.state = HealthState::Excluded;
    excluded.excluded_until = Some(snap.timestamp + Duration::minutes(30));

    let outcomes = vec![
        vote("temporal", Signal::Sell, 0.7, 0.2),
        vote("probabilistic", Signal::Sell, 0.8, 0.2),
        vote("evolutionary", Signal::Buy, 1.0, 0.0),
    ];
    let d = engine().decide(&snap, &outcomes, &health_with(vec![excluded]));

    assert_eq!(d.signal, Signal::Sell);
    assert_eq!(d.vote_totals.buy, 0.0);
    assert!(d.excluded_models.contains("evolutionary"));
    assert!(!d.participating_models.contains(&"evolutionary".to_string()));
    assert!(d.opinion_ids.contains_key("evolutionary"));
}

#[test]
fn test_cooldown_elapsed_but_still_excluded_state() {
    let snap = snapshot(10.0);
    let mut rec = ModelHealthRecord::new("c");
    rec.state = HealthState::Excluded;
    rec.excluded_until = Some(snap.timestamp - Duration::minutes(1));

    let outcomes = vec![
        vote("a", Signal::Buy, 0.8, 0.1),
        vote("b", Signal::Buy, 0.8, 0.1),
        vote("c", Signal::Sell, 0.9, 0.0),
    ];
    let d = engine().decide(&snap, &outcomes, &health_with(vec![rec]));
    assert!(d.excluded_models.contains("c"));
    assert_eq!(d.signal, Signal::Buy);
}

#[test]
fn test_disagreement_history_discounts_weight() {
    let mut contrarian = ModelHealthRecord::new("a");
    contrarian.rolling_disagreement = 1.0;
    let outcomes = vec![
        vote("a", Signal::Buy, 0.9, 0.1),
        vote("b", Signal::Sell, 0.6, 0.2),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &health_with(vec![contrarian]));
    assert_eq!(d.signal, Signal::Sell);
    assert_eq!(d.vote_totals.buy, 0.0);
    assert_eq!(d.participating_models.len(), 2);
}

#[test]
fn test_invalid_opinion_is_excluded() {
    let outcomes = vec![
        vote("a", Signal::Buy, f64::NAN, 0.1),
        vote("b", Signal::Buy, 0.8, 0.1),
        vote("c", Signal::Buy, 0.8, 1.7),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.signal, Signal::Hold);
    assert_eq!(d.fail_safe.as_deref(), Some(FAIL_SAFE_QUORUM));
    assert!(d.excluded_models.contains("a"));
    assert!(d.excluded_models.contains("c"));
}

#[test]
fn test_duplicate_model_keeps_first_outcome() {
    let outcomes = vec![
        vote("a", Signal::Sell, 0.8, 0.1),
        vote("a", Signal::Buy, 1.0, 0.0),
        vote("b", Signal::Sell, 0.8, 0.1),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.signal, Signal::Sell);
    assert_eq!(d.vote_totals.buy, 0.0);
    assert_eq!(d.opinion_ids["a"], outcomes[0].opinion().unwrap().opinion_id);
}

#[test]
fn test_decide_is_deterministic() {
    let snap = snapshot(10.0);
    let outcomes = vec![
        vote("a", Signal::Buy, 0.7, 0.3),
        vote("b", Signal::Sell, 0.6, 0.2),
        vote("c", Signal::Hold, 0.5, 0.4),
        AdapterOutcome::Failure(AdapterFailure::new("d", FailureReason::Panicked("boom".into()), 3)),
    ];
    let e = engine();
    let first = e.decide(&snap, &outcomes, &no_health());
    let second = e.decide(&snap, &outcomes, &no_health());
    assert_eq!(first, second);
    assert_eq!(first.decided_at, snap.timestamp);
}

#[test]
fn test_hold_winner_carries_no_volume() {
    let outcomes = vec![
        vote("a", Signal::Hold, 0.9, 0.1),
        vote("b", Signal::Hold, 0.8, 0.1),
        vote("c", Signal::Buy, 0.6, 0.3),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.signal, Signal::Hold);
    assert_eq!(d.recommended_volume, 0.0);
}

#[test]
fn test_dissent_is_tagged_in_supporting_factors() {
    let outcomes = vec![
        vote("a", Signal::Buy, 0.9, 0.1),
        vote("b", Signal::Sell, 0.5, 0.5),
    ];
    let d = engine().decide(&snapshot(10.0), &outcomes, &no_health());
    assert_eq!(d.supporting_factors[0], "a: a says BUY");
    assert_eq!(d.supporting_factors[1], "b (dissent: SELL): b says SELL");
}

#[test]
fn test_quorum_is_configurable() {
    let engine = ConsensusEngine::new(ConsensusConfig {
        min_quorum: 1,
        ..Default::default()
    });
    let d = engine.decide(&snapshot(10.0), &[vote("a", Signal::Sell, 0.9, 0.05)], &no_health());
    assert_eq!(d.signal, Signal::Sell);
    assert!(d.fail_safe.is_none());
}
