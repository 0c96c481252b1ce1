//! Market filters that gate scoring before any indicator is read.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC hour at which the forex week closes on Friday and reopens on Sunday.
pub const FOREX_ROLLOVER_HOUR: u32 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    ClosedSaturday,
    ClosedFridayNight,
    ClosedSundayMorning,
}

impl MarketStatus {
    pub fn is_open(self) -> bool {
        self == MarketStatus::Open
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MarketStatus::Open => "open",
            MarketStatus::ClosedSaturday => "closed (Saturday)",
            MarketStatus::ClosedFridayNight => "closed (Friday night)",
            MarketStatus::ClosedSundayMorning => "closed (Sunday before open)",
        };
        f.write_str(text)
    }
}

/// Trading-calendar gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketHours {
    /// Closed from Friday 22:00 UTC to Sunday 22:00 UTC.
    #[default]
    ForexWeek,
    AlwaysOpen,
}

impl MarketHours {
    pub fn status(self, now: DateTime<Utc>) -> MarketStatus {
        if self == MarketHours::AlwaysOpen {
            return MarketStatus::Open;
        }
        match (now.weekday(), now.hour()) {
            (Weekday::Sat, _) => MarketStatus::ClosedSaturday,
            (Weekday::Fri, h) if h >= FOREX_ROLLOVER_HOUR => MarketStatus::ClosedFridayNight,
            (Weekday::Sun, h) if h < FOREX_ROLLOVER_HOUR => MarketStatus::ClosedSundayMorning,
            _ => MarketStatus::Open,
        }
    }

    pub fn is_open(self, now: DateTime<Utc>) -> bool {
        self.status(now).is_open()
    }
}
