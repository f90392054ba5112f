use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;

/// How long an issued credential stays valid. Only these values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessDuration {
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl AccessDuration {
    pub const ALL: [AccessDuration; 6] = [
        AccessDuration::ThirtyMinutes,
        AccessDuration::OneHour,
        AccessDuration::TwoHours,
        AccessDuration::FourHours,
        AccessDuration::EightHours,
        AccessDuration::TwentyFourHours,
    ];

    pub fn seconds(&self) -> u64 {
        match self {
            AccessDuration::ThirtyMinutes => 30 * 60,
            AccessDuration::OneHour => 3600,
            AccessDuration::TwoHours => 2 * 3600,
            AccessDuration::FourHours => 4 * 3600,
            AccessDuration::EightHours => 8 * 3600,
            AccessDuration::TwentyFourHours => 24 * 3600,
        }
    }

    /// Short tag, e.g. `"1h"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDuration::ThirtyMinutes => "30m",
            AccessDuration::OneHour => "1h",
            AccessDuration::TwoHours => "2h",
            AccessDuration::FourHours => "4h",
            AccessDuration::EightHours => "8h",
            AccessDuration::TwentyFourHours => "24h",
        }
    }

    /// Long form emitted by the access configuration form, e.g. `"2hours"`.
    fn long_form(&self) -> &'static str {
        match self {
            AccessDuration::ThirtyMinutes => "30min",
            AccessDuration::OneHour => "1hour",
            AccessDuration::TwoHours => "2hours",
            AccessDuration::FourHours => "4hours",
            AccessDuration::EightHours => "8hours",
            AccessDuration::TwentyFourHours => "24hours",
        }
    }

    /// The duration whose lifetime is exactly `seconds`, if any.
    pub fn from_seconds(seconds: u64) -> Option<Self> {
        AccessDuration::ALL
            .iter()
            .copied()
            .find(|d| d.seconds() == seconds)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccessDuration::ThirtyMinutes => "30 Minutes",
            AccessDuration::OneHour => "1 Hour",
            AccessDuration::TwoHours => "2 Hours",
            AccessDuration::FourHours => "4 Hours",
            AccessDuration::EightHours => "8 Hours",
            AccessDuration::TwentyFourHours => "24 Hours",
        }
    }
}

impl fmt::Display for AccessDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessDuration {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessDuration::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s || d.long_form() == s)
            .ok_or_else(|| AccessError::InvalidDuration(s.to_string()))
    }
}
