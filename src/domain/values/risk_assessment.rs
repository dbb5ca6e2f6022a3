use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskAssessment {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskAssessment::Low => write!(f, "LOW"),
            RiskAssessment::Moderate => write!(f, "MODERATE"),
            RiskAssessment::High => write!(f, "HIGH"),
        }
    }
}
