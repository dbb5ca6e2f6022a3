mod common;

use will_core::application::snapshot_builder::SnapshotBuilder;
use will_core::config::SnapshotConfig;
use will_core::domain::error::DomainError;
use will_core::domain::values::risk_profile::RiskProfile;

fn builder() -> SnapshotBuilder {
    SnapshotBuilder::new(&SnapshotConfig::default()).unwrap()
}

#[test]
fn test_valid_request_builds_snapshot() {
    let snap = builder().build(common::request("req-42")).unwrap();
    assert_eq!(snap.request_id, "req-42");
    assert_eq!(snap.asset, "EURUSD");
    assert_eq!(snap.risk_profile, RiskProfile::Aggressive);
    assert_eq!(snap.timestamp, common::t0());
    assert_eq!(snap.requested_volume, 10.0);
}

#[test]
fn test_negative_volume_is_rejected() {
    let mut req = common::request("req-neg");
    req.requested_volume = -5.0;
    let err = builder().build(req).unwrap_err();
    assert_eq!(err.field, "requested_volume");
}

#[test]
fn test_zero_and_nan_volume_are_rejected() {
    for v in [0.0, f64::NAN, f64::INFINITY] {
        let mut req = common::request("req");
        req.requested_volume = v;
        assert_eq!(builder().build(req).unwrap_err().field, "requested_volume");
    }
}

#[test]
fn test_missing_condition_names_key() {
    let mut req = common::request("req");
    req.market_conditions.remove("volatility_index");
    let err = builder().build(req).unwrap_err();
    assert_eq!(err.field, "market_conditions.volatility_index");
    assert!(err.to_string().contains("market_conditions.volatility_index"));
}

#[test]
fn test_bad_asset_and_timeframe() {
    let mut req = common::request("req");
    req.asset = "EUR-USD; DROP".into();
    assert_eq!(builder().build(req).unwrap_err().field, "asset");

    let mut req = common::request("req");
    req.timeframe = "H7".into();
    assert_eq!(builder().build(req).unwrap_err().field, "timeframe");
}

#[test]
fn test_empty_request_id_is_rejected() {
    let req = common::request("   ");
    assert_eq!(builder().build(req).unwrap_err().field, "request_id");
}

#[test]
fn test_unknown_risk_profile_is_rejected() {
    let mut req = common::request("req");
    req.risk_profile = Some("yolo".into());
    assert_eq!(builder().build(req).unwrap_err().field, "risk_profile");
}

#[tokio::test]
async fn test_invalid_request_produces_no_decision() {
    let engine = common::engine(common::fast_config(), vec![]);
    let mut req = common::request("req-neg");
    req.requested_volume = -5.0;
    let err = engine.decide_request(req).await.unwrap_err();
    match err {
        DomainError::Validation(v) => assert_eq!(v.field, "requested_volume"),
        other => panic!("expected validation error, got {other:?}"),
    }
}
