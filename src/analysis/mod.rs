//! Headway computation and bucketing.
//!
//! Raw arrivals are enriched with calendar attributes, paired into headways
//! within (date, direction, time bucket) groups, filtered for outliers and
//! summarized per (day type, bucket, period, direction) category.

pub mod aggregate;
pub mod bucket;
pub mod enrich;
pub mod headway;
pub mod query;
pub mod types;
pub mod utility;

pub use aggregate::{DailyMedian, HourlyMean, SummaryRow, daily_medians, hourly_profile, summarize};
pub use bucket::{Coverage, TimeBucket, assign_bucket};
pub use enrich::{enrich, enrich_all};
pub use headway::{BoundaryPolicy, compute_headways};
pub use query::{Change, HeadwayQuery, median_for, percent_over};
pub use types::{ArrivalRecord, DayType, EnrichedRecord, HeadwayObservation, Period};
