use crate::analysis::bucket::TimeBucket;
use crate::analysis::types::{DayType, HeadwayObservation, Period};
use crate::analysis::utility::{Distribution, mean, median, round1};
use crate::config::StationConfig;
use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headway statistics for one (day type, bucket, period, direction) group.
/// Values are minutes rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub day_type: DayType,
    pub time_bucket: String,
    pub swap_period: Period,
    pub direction: String,
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Mean headway per clock hour for one direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyMean {
    pub day_type: DayType,
    pub swap_period: Period,
    pub hour: u32,
    pub mean_headway: f64,
    pub count: usize,
}

/// Median headway of a single service day, with a trailing 7-day rolling
/// mean of those medians.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMedian {
    pub date: NaiveDate,
    pub swap_period: Period,
    pub median_headway: f64,
    pub rolling_7d: Option<f64>,
}

/// Minimum number of daily medians inside the window before a rolling value is emitted.
const ROLLING_MIN_PERIODS: usize = 3;
const ROLLING_WINDOW_DAYS: i64 = 7;

/// Groups observations by (day type, bucket, period, direction) and returns
/// one [`SummaryRow`] per group, ordered by day type, bucket, direction and
/// period. Periods follow the calendar, so each Before row is directly
/// followed by its After row rather than sorted by label text. Direction
/// codes become labels only here.
pub fn summarize(observations: &[HeadwayObservation], station: &StationConfig) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(DayType, TimeBucket, char, Period), Vec<f64>> = BTreeMap::new();

    for o in observations {
        let r = &o.record;
        groups
            .entry((r.day_type, r.time_bucket, r.direction, r.period))
            .or_default()
            .push(o.headway_minutes);
    }

    groups
        .into_iter()
        .filter_map(|((day_type, bucket, direction, period), values)| {
            let stats = Distribution::from_values(&values)?.rounded();
            Some(SummaryRow {
                day_type,
                time_bucket: bucket.label(day_type).to_string(),
                swap_period: period,
                direction: station.direction_label(direction),
                count: stats.count,
                median: stats.median,
                mean: stats.mean,
                p25: stats.p25,
                p75: stats.p75,
                p90: stats.p90,
            })
        })
        .collect()
}

/// Mean headway by (day type, period, hour) for one direction.
pub fn hourly_profile(observations: &[HeadwayObservation], direction: char) -> Vec<HourlyMean> {
    let mut groups: BTreeMap<(DayType, Period, u32), Vec<f64>> = BTreeMap::new();

    for o in observations.iter().filter(|o| o.record.direction == direction) {
        groups
            .entry((o.record.day_type, o.record.period, o.record.hour))
            .or_default()
            .push(o.headway_minutes);
    }

    groups
        .into_iter()
        .filter_map(|((day_type, swap_period, hour), values)| {
            Some(HourlyMean {
                day_type,
                swap_period,
                hour,
                mean_headway: round1(mean(&values)?),
                count: values.len(),
            })
        })
        .collect()
}

/// Daily median series for one (day type, bucket, direction) category.
pub fn daily_medians(
    observations: &[HeadwayObservation],
    day_type: DayType,
    bucket: TimeBucket,
    direction: char,
) -> Vec<DailyMedian> {
    let mut days: BTreeMap<NaiveDate, (Period, Vec<f64>)> = BTreeMap::new();

    for o in observations {
        let r = &o.record;
        if r.day_type == day_type && r.time_bucket == bucket && r.direction == direction {
            days.entry(r.local_date)
                .or_insert_with(|| (r.period, Vec::new()))
                .1
                .push(o.headway_minutes);
        }
    }

    let medians: Vec<(NaiveDate, Period, f64)> = days
        .into_iter()
        .filter_map(|(date, (period, values))| Some((date, period, median(&values)?)))
        .collect();

    medians
        .iter()
        .map(|(date, period, value)| {
            let window_start = *date - TimeDelta::days(ROLLING_WINDOW_DAYS - 1);
            let window: Vec<f64> = medians
                .iter()
                .filter(|(d, _, _)| *d >= window_start && d <= date)
                .map(|(_, _, v)| *v)
                .collect();
            let rolling_7d = if window.len() >= ROLLING_MIN_PERIODS {
                mean(&window).map(round1)
            } else {
                None
            };
            DailyMedian {
                date: *date,
                swap_period: *period,
                median_headway: round1(*value),
                rolling_7d,
            }
        })
        .collect()
}
