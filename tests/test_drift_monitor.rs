mod common;

use chrono::Duration;
use common::{opinion, t0};
use std::sync::Arc;
use will_core::application::drift_monitor::DriftMonitor;
use will_core::config::DriftConfig;
use will_core::domain::entities::opinion::FailureReason;
use will_core::domain::values::health_state::HealthState;
use will_core::domain::values::realized_outcome::RealizedOutcome;
use will_core::domain::values::signal::Signal;

/// Every outcome fully replaces the rolling statistics.
fn instant_config() -> DriftConfig {
    DriftConfig {
        window: 1,
        min_samples: 1,
        ..Default::default()
    }
}

const UP: RealizedOutcome = RealizedOutcome::Return(0.01);
const DOWN: RealizedOutcome = RealizedOutcome::Return(-0.01);

#[test]
fn test_consecutive_failures_exclude_model() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    for i in 0..4 {
        let rec = monitor.record_failure_at("m", &FailureReason::Timeout, t0());
        assert_eq!(rec.state, HealthState::Healthy, "after {} failures", i + 1);
    }
    let rec = monitor.record_failure_at("m", &FailureReason::Error("boom".into()), t0());
    assert_eq!(rec.state, HealthState::Excluded);
    assert_eq!(rec.excluded_until, Some(t0() + Duration::seconds(1800)));
    assert!(!rec.retrain_recommended);
    assert!(monitor.retrain_candidates().is_empty());
}

#[test]
fn test_success_resets_failure_count() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    for _ in 0..4 {
        monitor.record_failure_at("m", &FailureReason::Timeout, t0());
    }
    monitor.record_success_at("m", t0());
    for _ in 0..4 {
        monitor.record_failure_at("m", &FailureReason::Timeout, t0());
    }
    let rec = monitor.health_of("m").unwrap();
    assert_eq!(rec.state, HealthState::Healthy);
    assert_eq!(rec.consecutive_failures, 4);
}

#[test]
fn test_excluded_model_needs_cooldown_and_full_probation() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    for _ in 0..5 {
        monitor.record_failure_at("m", &FailureReason::Timeout, t0());
    }
    let good = opinion("m", Signal::Buy, 0.9, 0.1);

    // A great result during the cooldown changes nothing.
    let rec = monitor.record_outcome_at("m", &good, Some(Signal::Buy), UP, t0() + Duration::minutes(1));
    assert_eq!(rec.state, HealthState::Excluded);
    assert_eq!(rec.probation_streak, 0);

    let after = t0() + Duration::minutes(31);
    for i in 1..20 {
        let rec = monitor.record_outcome_at("m", &good, Some(Signal::Buy), UP, after);
        assert_eq!(rec.state, HealthState::Excluded);
        assert_eq!(rec.probation_streak, i);
    }
    let rec = monitor.record_outcome_at("m", &good, Some(Signal::Buy), UP, after);
    assert_eq!(rec.state, HealthState::Healthy);
    assert_eq!(rec.excluded_until, None);
    assert_eq!(rec.probation_streak, 0);
}

#[test]
fn test_bad_outcome_resets_probation() {
    let monitor = DriftMonitor::new(instant_config());
    for _ in 0..5 {
        monitor.record_failure_at("m", &FailureReason::Timeout, t0());
    }
    let good = opinion("m", Signal::Buy, 0.9, 0.1);
    let after = t0() + Duration::hours(1);

    for _ in 0..10 {
        monitor.record_outcome_at("m", &good, Some(Signal::Buy), UP, after);
    }
    let rec = monitor.record_outcome_at("m", &good, Some(Signal::Buy), DOWN, after);
    assert_eq!(rec.probation_streak, 0);
    assert_eq!(rec.state, HealthState::Excluded);
}

#[test]
fn test_sustained_error_moves_through_watch_to_exclusion() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    let wrong = opinion("m", Signal::Buy, 0.9, 0.1);

    for i in 1..10 {
        let rec = monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), DOWN, t0());
        assert_eq!(rec.state, HealthState::Healthy, "moved before min_samples at {i}");
    }
    let rec = monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), DOWN, t0());
    assert_eq!(rec.state, HealthState::Watch);
    assert!((rec.rolling_error - 0.81).abs() < 1e-9);

    let rec = monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), DOWN, t0());
    assert_eq!(rec.state, HealthState::Excluded);
    assert!(rec.retrain_recommended);
    assert_eq!(monitor.retrain_candidates(), vec!["m".to_string()]);
}

#[test]
fn test_watch_recovers_to_healthy() {
    let monitor = DriftMonitor::new(instant_config());
    let hedged = opinion("m", Signal::Buy, 0.5, 0.4);
    let rec = monitor.record_outcome_at("m", &hedged, Some(Signal::Buy), DOWN, t0());
    // (0.5 - 0)^2 = 0.25: soft, not hard
    assert_eq!(rec.state, HealthState::Watch);

    let sharp = opinion("m", Signal::Buy, 0.9, 0.1);
    let rec = monitor.record_outcome_at("m", &sharp, Some(Signal::Buy), UP, t0());
    assert_eq!(rec.state, HealthState::Healthy);
}

#[test]
fn test_chronic_dissent_excludes_accurate_model() {
    let monitor = DriftMonitor::new(instant_config());
    let contrarian = opinion("m", Signal::Sell, 0.9, 0.1);

    let rec = monitor.record_outcome_at("m", &contrarian, Some(Signal::Buy), DOWN, t0());
    assert!(rec.rolling_error < 0.25);
    assert_eq!(rec.rolling_disagreement, 1.0);
    assert_eq!(rec.state, HealthState::Watch);

    let rec = monitor.record_outcome_at("m", &contrarian, Some(Signal::Buy), DOWN, t0());
    assert_eq!(rec.state, HealthState::Excluded);
    assert!(rec.retrain_recommended);
}

#[test]
fn test_fail_safe_cycles_leave_disagreement_alone() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    let op = opinion("m", Signal::Sell, 0.9, 0.1);
    monitor.record_outcome_at("m", &op, Some(Signal::Buy), DOWN, t0());
    let before = monitor.health_of("m").unwrap().rolling_disagreement;
    let rec = monitor.record_outcome_at("m", &op, None, DOWN, t0());
    assert_eq!(rec.rolling_disagreement, before);
    assert_eq!(rec.outcomes_observed, 2);
}

#[test]
fn test_failing_while_excluded_extends_cooldown() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    for _ in 0..5 {
        monitor.record_failure_at("m", &FailureReason::Timeout, t0());
    }
    let later = t0() + Duration::minutes(10);
    for _ in 0..5 {
        monitor.record_failure_at("m", &FailureReason::DeadlineExceeded, later);
    }
    let rec = monitor.health_of("m").unwrap();
    assert_eq!(rec.state, HealthState::Excluded);
    assert_eq!(rec.excluded_until, Some(later + Duration::seconds(1800)));
}

#[test]
fn test_restore_clears_retrain_flag() {
    let monitor = DriftMonitor::new(DriftConfig {
        probation_window: 2,
        ..instant_config()
    });
    let wrong = opinion("m", Signal::Buy, 0.9, 0.1);
    monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), DOWN, t0());
    let rec = monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), DOWN, t0());
    assert!(rec.retrain_recommended);

    let after = t0() + Duration::hours(1);
    monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), UP, after);
    let rec = monitor.record_outcome_at("m", &wrong, Some(Signal::Buy), UP, after);
    assert_eq!(rec.state, HealthState::Healthy);
    assert!(!rec.retrain_recommended);
    assert!(monitor.retrain_candidates().is_empty());
}

#[test]
fn test_registered_models_appear_in_snapshot() {
    let monitor = DriftMonitor::new(DriftConfig::default());
    monitor.register("a");
    monitor.register("b");
    let snap = monitor.get_health_snapshot();
    assert_eq!(snap.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(snap.values().all(|r| r.state == HealthState::Healthy));
}

#[test]
fn test_concurrent_updates_are_serialized_per_model() {
    let monitor = Arc::new(DriftMonitor::new(DriftConfig::default()));
    let op_a = opinion("a", Signal::Buy, 0.6, 0.2);
    let op_b = opinion("b", Signal::Sell, 0.6, 0.2);

    std::thread::scope(|s| {
        for i in 0..8 {
            let monitor = Arc::clone(&monitor);
            let (id, op) = if i % 2 == 0 { ("a", &op_a) } else { ("b", &op_b) };
            s.spawn(move || {
                for _ in 0..100 {
                    monitor.record_outcome_at(id, op, Some(op.signal), UP, t0());
                    monitor.record_success_at(id, t0());
                }
            });
        }
    });

    let snap = monitor.get_health_snapshot();
    assert_eq!(snap["a"].outcomes_observed, 400);
    assert_eq!(snap["b"].outcomes_observed, 400);
}
