//! Successive-arrival gaps within (date, direction, bucket) groups.

use crate::analysis::bucket::TimeBucket;
use crate::analysis::types::{EnrichedRecord, HeadwayObservation};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Gaps shorter than this are duplicate reports of the same train.
pub const MIN_HEADWAY_MINUTES: f64 = 1.0;

/// What happens to a gap whose two arrivals fall in different time buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Pair only within a bucket; the first arrival of each bucket has no
    /// predecessor, so gaps straddling a boundary are never observed.
    #[default]
    DropStraddling,
    /// Pair across buckets within a day and direction; a straddling gap is
    /// attributed to the bucket of the later arrival.
    AssignToLater,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::DropStraddling => f.write_str("drop-straddling"),
            BoundaryPolicy::AssignToLater => f.write_str("assign-to-later"),
        }
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" | "drop-straddling" => Ok(BoundaryPolicy::DropStraddling),
            "assign-to-later" | "later" => Ok(BoundaryPolicy::AssignToLater),
            other => Err(format!("unknown boundary policy: {other:?}")),
        }
    }
}

type GroupKey = (NaiveDate, char, Option<TimeBucket>);

fn group_key(record: &EnrichedRecord, policy: BoundaryPolicy) -> GroupKey {
    let bucket = match policy {
        BoundaryPolicy::DropStraddling => Some(record.time_bucket),
        BoundaryPolicy::AssignToLater => None,
    };
    (record.local_date, record.direction, bucket)
}

/// True if a gap is kept for `bucket`: at least one minute and no longer
/// than the bucket's ceiling.
pub fn within_bounds(headway_minutes: f64, bucket: TimeBucket) -> bool {
    (MIN_HEADWAY_MINUTES..=bucket.max_headway_minutes()).contains(&headway_minutes)
}

fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 60_000.0
}

/// Pairs every record with its predecessor in the same group and returns the
/// gaps that pass the floor and the bucket ceiling.
///
/// Records are stable-sorted by (local date, direction, bucket, timestamp),
/// or by (local date, direction, timestamp) under
/// [`BoundaryPolicy::AssignToLater`].
#[tracing::instrument(skip_all, fields(records = records.len(), %policy))]
pub fn compute_headways(
    mut records: Vec<EnrichedRecord>,
    policy: BoundaryPolicy,
) -> Vec<HeadwayObservation> {
    match policy {
        BoundaryPolicy::DropStraddling => records.sort_by_key(|r| {
            (r.local_date, r.direction, r.time_bucket, r.arrival.timestamp)
        }),
        BoundaryPolicy::AssignToLater => {
            records.sort_by_key(|r| (r.local_date, r.direction, r.arrival.timestamp))
        }
    }

    let mut observations = Vec::new();
    let mut previous: Option<(GroupKey, DateTime<Utc>)> = None;
    let mut out_of_bounds = 0usize;

    for record in records {
        let key = group_key(&record, policy);
        let timestamp = record.arrival.timestamp;

        let gap = match &previous {
            Some((prev_key, prev_ts)) if *prev_key == key => {
                Some(minutes_between(*prev_ts, timestamp))
            }
            _ => None,
        };
        previous = Some((key, timestamp));

        if let Some(headway_minutes) = gap {
            if within_bounds(headway_minutes, record.time_bucket) {
                observations.push(HeadwayObservation {
                    record,
                    headway_minutes,
                });
            } else {
                out_of_bounds += 1;
            }
        }
    }

    debug!(out_of_bounds, "Dropped gaps outside headway bounds");
    info!(observations = observations.len(), "Computed headway observations");
    observations
}
