use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading action proposed by a model or decided by consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Buy, Signal::Sell, Signal::Hold];

    /// +1 for BUY, -1 for SELL, 0 for HOLD.
    pub fn direction(&self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }

    /// Map a realized relative return onto the signal that would have been right.
    /// Returns inside `[-hold_band, hold_band]` count as HOLD.
    pub fn from_return(realized_return: f64, hold_band: f64) -> Self {
        if realized_return > hold_band {
            Signal::Buy
        } else if realized_return < -hold_band {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    /// Order-ticket side for the execution collaborator.
    pub fn side(&self) -> Option<&'static str> {
        match self {
            Signal::Buy => Some("buy"),
            Signal::Sell => Some("sell"),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(Signal::Buy),
            "sell" | "short" => Ok(Signal::Sell),
            "hold" | "neutral" | "flat" => Ok(Signal::Hold),
            _ => Err(format!("Unknown signal: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("BUY".parse::<Signal>().unwrap(), Signal::Buy);
        assert_eq!(" short ".parse::<Signal>().unwrap(), Signal::Sell);
        assert_eq!("neutral".parse::<Signal>().unwrap(), Signal::Hold);
        assert!("moon".parse::<Signal>().is_err());
    }

    #[test]
    fn test_from_return_respects_hold_band() {
        assert_eq!(Signal::from_return(0.002, 0.001), Signal::Buy);
        assert_eq!(Signal::from_return(-0.002, 0.001), Signal::Sell);
        assert_eq!(Signal::from_return(0.0005, 0.001), Signal::Hold);
        assert_eq!(Signal::from_return(-0.001, 0.001), Signal::Hold);
    }

    #[test]
    fn test_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Sell).unwrap(), "\"SELL\"");
    }
}
