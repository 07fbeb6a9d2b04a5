use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Candle interval from the closed set shared across providers. Each provider
/// supports a subset; the adapters own the per-venue translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CandleInterval {
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours8,
    Hours12,
    Days1,
    Days3,
    Weeks1,
    Months1,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 15] = [
        CandleInterval::Minutes1,
        CandleInterval::Minutes3,
        CandleInterval::Minutes5,
        CandleInterval::Minutes15,
        CandleInterval::Minutes30,
        CandleInterval::Hours1,
        CandleInterval::Hours2,
        CandleInterval::Hours4,
        CandleInterval::Hours6,
        CandleInterval::Hours8,
        CandleInterval::Hours12,
        CandleInterval::Days1,
        CandleInterval::Days3,
        CandleInterval::Weeks1,
        CandleInterval::Months1,
    ];

    /// Interval length in whole seconds. Months are nominal 30 days; callers
    /// that need calendar-exact month boundaries go through
    /// [`crate::normalize::normalize_timestamp`] instead.
    pub fn secs(&self) -> i64 {
        match self {
            CandleInterval::Minutes1 => 60,
            CandleInterval::Minutes3 => 3 * 60,
            CandleInterval::Minutes5 => 5 * 60,
            CandleInterval::Minutes15 => 15 * 60,
            CandleInterval::Minutes30 => 30 * 60,
            CandleInterval::Hours1 => 3600,
            CandleInterval::Hours2 => 2 * 3600,
            CandleInterval::Hours4 => 4 * 3600,
            CandleInterval::Hours6 => 6 * 3600,
            CandleInterval::Hours8 => 8 * 3600,
            CandleInterval::Hours12 => 12 * 3600,
            CandleInterval::Days1 => 86_400,
            CandleInterval::Days3 => 3 * 86_400,
            CandleInterval::Weeks1 => 7 * 86_400,
            CandleInterval::Months1 => 30 * 86_400,
        }
    }

    /// Month lengths vary, so gap patching and seconds arithmetic skip `1M`.
    pub fn is_monthly(&self) -> bool {
        matches!(self, CandleInterval::Months1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Minutes1 => "1m",
            CandleInterval::Minutes3 => "3m",
            CandleInterval::Minutes5 => "5m",
            CandleInterval::Minutes15 => "15m",
            CandleInterval::Minutes30 => "30m",
            CandleInterval::Hours1 => "1h",
            CandleInterval::Hours2 => "2h",
            CandleInterval::Hours4 => "4h",
            CandleInterval::Hours6 => "6h",
            CandleInterval::Hours8 => "8h",
            CandleInterval::Hours12 => "12h",
            CandleInterval::Days1 => "1d",
            CandleInterval::Days3 => "3d",
            CandleInterval::Weeks1 => "1w",
            CandleInterval::Months1 => "1M",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CandleInterval::ALL
            .iter()
            .find(|interval| interval.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnsupportedCandlestickInterval {
                provider: None,
                interval: s.to_string(),
            })
    }
}

impl TryFrom<String> for CandleInterval {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CandleInterval> for String {
    fn from(interval: CandleInterval) -> Self {
        interval.as_str().to_string()
    }
}
