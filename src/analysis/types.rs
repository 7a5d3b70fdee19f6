//! Data types shared by the headway pipeline.

use crate::analysis::bucket::TimeBucket;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One observed train stop event at a target platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRecord {
    pub stop_id: String,
    pub trip_id: String,
    /// Arrival instant, or the departure instant when no arrival was recorded.
    pub timestamp: DateTime<Utc>,
    pub route_id: Option<String>,
    pub direction_id: Option<String>,
    /// Nominal service date of the archive the record came from.
    pub calendar_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_is_weekday(is_weekday: bool) -> Self {
        if is_weekday {
            DayType::Weekday
        } else {
            DayType::Weekend
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayType::Weekday => "Weekday",
            DayType::Weekend => "Weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekday" => Ok(DayType::Weekday),
            "weekend" => Ok(DayType::Weekend),
            other => Err(format!("unknown day type: {other:?}")),
        }
    }
}

/// Side of the cutover date an arrival falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Period {
    #[serde(rename = "Before swap")]
    Before,
    #[serde(rename = "After swap")]
    After,
}

impl Period {
    /// The cutover date itself belongs to the After period.
    pub fn for_date(date: NaiveDate, cutover: NaiveDate) -> Self {
        if date >= cutover {
            Period::After
        } else {
            Period::Before
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Before => "Before swap",
            Period::After => "After swap",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "before swap" => Ok(Period::Before),
            "after" | "after swap" => Ok(Period::After),
            other => Err(format!("unknown period: {other:?}")),
        }
    }
}

/// An [`ArrivalRecord`] with its calendar attributes derived in the station's
/// local time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub arrival: ArrivalRecord,
    pub direction: char,
    pub local_date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    /// Monday is 0.
    pub weekday_index: u32,
    pub is_weekday: bool,
    pub day_type: DayType,
    pub period: Period,
    pub time_bucket: TimeBucket,
}

impl EnrichedRecord {
    pub fn bucket_label(&self) -> &'static str {
        self.time_bucket.label(self.day_type)
    }

    /// Derived on demand from the bucket set, never stored.
    pub fn within_active_window(&self) -> bool {
        self.is_weekday && self.time_bucket.is_active()
    }
}

/// Gap between an arrival and its predecessor in the same group.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadwayObservation {
    /// The later arrival of the pair.
    pub record: EnrichedRecord,
    pub headway_minutes: f64,
}
