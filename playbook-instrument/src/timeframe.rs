use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// Candle timeframe supported by the engine.
///
/// Serialises to/from the standard exchange notation ("1m", "5m", "15m", "1h", "4h", "1d").
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Duration of one bar in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1440,
        }
    }

    /// Duration of one bar in UTC milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.minutes() * 60_000
    }

    /// Duration of one bar as a [`TimeDelta`].
    pub fn duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.duration_ms())
    }

    /// Number of 1-minute sub-bars contained in one bar of this [`Timeframe`].
    pub fn minute_bars(&self) -> usize {
        self.minutes() as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unknown timeframe: {0} (expected one of: 1m, 5m, 15m, 1h, 4h, 1d)")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "1h" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            "1d" => Ok(Self::D1),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

/// Role a [`Timeframe`] plays in a multi-timeframe run.
///
/// `Exec` is the loop's native cadence; `Med` and `High` are slower timeframes whose
/// last-closed values are forward-filled between their own closes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum TimeframeRole {
    #[serde(rename = "exec")]
    Exec,
    #[serde(rename = "med")]
    Med,
    #[serde(rename = "high")]
    High,
}

impl TimeframeRole {
    /// All roles in the deterministic per-step update order: when multiple timeframes close
    /// on the same execution close, the highest updates first, then medium, then exec.
    pub const UPDATE_ORDER: [TimeframeRole; 3] = [Self::High, Self::Med, Self::Exec];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Med => "med",
            Self::High => "high",
        }
    }
}

impl Display for TimeframeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeframeRole {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exec" => Ok(Self::Exec),
            "med" => Ok(Self::Med),
            "high" => Ok(Self::High),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}
