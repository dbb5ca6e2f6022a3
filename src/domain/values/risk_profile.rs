use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Balanced => write!(f, "balanced"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "low" => Ok(Self::Conservative),
            "balanced" | "moderate" | "medium" => Ok(Self::Balanced),
            "aggressive" | "high" => Ok(Self::Aggressive),
            _ => Err(format!(
                "Invalid risk profile: '{}'. Use 'conservative', 'balanced' or 'aggressive'",
                s
            )),
        }
    }
}
