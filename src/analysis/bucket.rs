//! Time-of-day buckets.
//!
//! Five clock ranges shared by every day of the week. Weekdays and weekends
//! use different labels for the same range, because weekend service shows no
//! commute peak.
//!
//! | Range    | Weekday               | Weekend                    |
//! |----------|-----------------------|----------------------------|
//! | [0, 6)   | Early AM (12–6 AM)    | Early AM (12–6 AM)         |
//! | [6, 9)   | Morning Rush (6–9 AM) | Morning (6–9 AM)           |
//! | [9, 16)  | Midday (9 AM–4 PM)    | Midday (9 AM–4 PM)         |
//! | [16, 19) | Evening Rush (4–7 PM) | Afternoon/Evening (4–7 PM) |
//! | [19, 24) | Night (7 PM–midnight) | Night (7 PM–midnight)      |

use crate::analysis::types::DayType;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeBucket {
    EarlyAm,
    Morning,
    Midday,
    Evening,
    Night,
}

/// How much of a bucket the weekday service change (6 AM–9:30 PM) covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    None,
    Partial,
    Full,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 5] = [
        TimeBucket::EarlyAm,
        TimeBucket::Morning,
        TimeBucket::Midday,
        TimeBucket::Evening,
        TimeBucket::Night,
    ];

    /// Returns `None` for hours outside `0..24`.
    pub fn from_hour(hour: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.hours().contains(&hour))
    }

    pub fn hours(self) -> Range<u32> {
        match self {
            TimeBucket::EarlyAm => 0..6,
            TimeBucket::Morning => 6..9,
            TimeBucket::Midday => 9..16,
            TimeBucket::Evening => 16..19,
            TimeBucket::Night => 19..24,
        }
    }

    pub fn label(self, day_type: DayType) -> &'static str {
        match day_type {
            DayType::Weekday => self.weekday_label(),
            DayType::Weekend => self.weekend_label(),
        }
    }

    pub fn weekday_label(self) -> &'static str {
        match self {
            TimeBucket::EarlyAm => "Early AM (12–6 AM)",
            TimeBucket::Morning => "Morning Rush (6–9 AM)",
            TimeBucket::Midday => "Midday (9 AM–4 PM)",
            TimeBucket::Evening => "Evening Rush (4–7 PM)",
            TimeBucket::Night => "Night (7 PM–midnight)",
        }
    }

    pub fn weekend_label(self) -> &'static str {
        match self {
            TimeBucket::Morning => "Morning (6–9 AM)",
            TimeBucket::Evening => "Afternoon/Evening (4–7 PM)",
            other => other.weekday_label(),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            TimeBucket::EarlyAm => "early-am",
            TimeBucket::Morning => "morning",
            TimeBucket::Midday => "midday",
            TimeBucket::Evening => "evening",
            TimeBucket::Night => "night",
        }
    }

    /// 1-based position in clock order, used for report numbering.
    pub fn ordinal(self) -> usize {
        self as usize + 1
    }

    /// Buckets that lie entirely inside the weekday service-change window.
    pub fn is_active(self) -> bool {
        self.change_coverage() == Coverage::Full
    }

    /// Night is only covered from 7 PM to 9:30 PM, so it is reported as
    /// partial rather than folded into the active set.
    pub fn change_coverage(self) -> Coverage {
        match self {
            TimeBucket::EarlyAm => Coverage::None,
            TimeBucket::Morning | TimeBucket::Midday | TimeBucket::Evening => Coverage::Full,
            TimeBucket::Night => Coverage::Partial,
        }
    }

    /// Longest plausible gap; anything above it is missing data.
    pub fn max_headway_minutes(self) -> f64 {
        match self {
            TimeBucket::EarlyAm => 90.0,
            _ => 60.0,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.weekday_label())
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| {
                b.slug().eq_ignore_ascii_case(s) || b.weekday_label() == s || b.weekend_label() == s
            })
            .ok_or_else(|| format!("unknown time bucket: {s:?}"))
    }
}

/// Label of the bucket containing `hour` for the given day type.
pub fn assign_bucket(hour: u32, is_weekday: bool) -> Option<&'static str> {
    TimeBucket::from_hour(hour).map(|b| b.label(DayType::from_is_weekday(is_weekday)))
}
