pub mod health_state;
pub mod probability;
pub mod realized_outcome;
pub mod risk_assessment;
pub mod risk_profile;
pub mod signal;
pub mod timeframe;
