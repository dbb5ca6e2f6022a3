use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    MN1,
}

impl Timeframe {
    /// Nominal bar length in minutes (a month counts as 30 days).
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
            Timeframe::MN1 => 43_200,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
            Timeframe::MN1 => "MN1",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            "MN1" | "MN" => Ok(Timeframe::MN1),
            _ => Err(format!("Unknown timeframe: {s}")),
        }
    }
}
