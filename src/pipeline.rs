//! End-to-end runs: archives to observations, observations to result files.

use crate::analysis::aggregate::{DailyMedian, HourlyMean, SummaryRow, daily_medians, hourly_profile, summarize};
use crate::analysis::bucket::TimeBucket;
use crate::analysis::enrich::enrich_all;
use crate::analysis::headway::{BoundaryPolicy, compute_headways};
use crate::analysis::types::{DayType, HeadwayObservation, Period};
use crate::archive::load_all;
use crate::config::StationConfig;
use crate::output::{write_csv, write_headways};
use crate::report::render;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SUMMARY_FILE: &str = "headway_summary.csv";
pub const HOURLY_FILE: &str = "hourly_profile.csv";
pub const DAILY_FILE: &str = "daily_medians.csv";
pub const REPORT_FILE: &str = "results_report.txt";

/// Path of the persisted observation dataset for `station`.
pub fn dataset_path(results_dir: &Path, station: &StationConfig) -> PathBuf {
    results_dir.join(format!("{}_headways.csv", station.slug()))
}

/// Observations and their summary table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub observations: Vec<HeadwayObservation>,
    pub summary: Vec<SummaryRow>,
}

impl Analysis {
    pub fn from_observations(observations: Vec<HeadwayObservation>, station: &StationConfig) -> Self {
        let summary = summarize(&observations, station);
        Self {
            observations,
            summary,
        }
    }

    pub fn count(&self, period: Period) -> usize {
        self.observations
            .iter()
            .filter(|o| o.record.period == period)
            .count()
    }
}

/// Loads every archive in `archive_dir` and builds the headway dataset.
#[tracing::instrument(skip_all, fields(station = %station.name, dir = %archive_dir.display()))]
pub fn analyze_archives(
    archive_dir: &Path,
    station: &StationConfig,
    policy: BoundaryPolicy,
) -> Result<Analysis> {
    info!(%policy, cutover = %station.cutover_date, "Building headway dataset");
    let arrivals = load_all(archive_dir, station)?;
    let enriched = enrich_all(arrivals, station);
    let analysis = Analysis::from_observations(compute_headways(enriched, policy), station);
    info!(
        before = analysis.count(Period::Before),
        after = analysis.count(Period::After),
        groups = analysis.summary.len(),
        "Headway dataset ready"
    );
    Ok(analysis)
}

/// Daily median series for one direction, every (day type, bucket) pair.
#[derive(Debug, Clone, Serialize)]
struct DailyRow {
    day_type: DayType,
    time_bucket: &'static str,
    date: chrono::NaiveDate,
    swap_period: Period,
    median_headway: f64,
    rolling_7d: Option<f64>,
}

impl DailyRow {
    fn new(day_type: DayType, bucket: TimeBucket, median: DailyMedian) -> Self {
        Self {
            day_type,
            time_bucket: bucket.label(day_type),
            date: median.date,
            swap_period: median.swap_period,
            median_headway: median.median_headway,
            rolling_7d: median.rolling_7d,
        }
    }
}

fn daily_series(observations: &[HeadwayObservation], direction: char) -> Vec<DailyRow> {
    let mut rows = Vec::new();
    for day_type in [DayType::Weekday, DayType::Weekend] {
        for bucket in TimeBucket::ALL {
            rows.extend(
                daily_medians(observations, day_type, bucket, direction)
                    .into_iter()
                    .map(|median| DailyRow::new(day_type, bucket, median)),
            );
        }
    }
    rows
}

/// Writes the dataset, summary table, chart series and report for
/// `direction` into `results_dir`.
#[tracing::instrument(skip_all, fields(dir = %results_dir.display(), %direction))]
pub fn write_results(
    results_dir: &Path,
    analysis: &Analysis,
    station: &StationConfig,
    direction: char,
) -> Result<()> {
    std::fs::create_dir_all(results_dir)?;

    write_headways(&dataset_path(results_dir, station), &analysis.observations)?;
    write_csv(&results_dir.join(SUMMARY_FILE), &analysis.summary)?;

    let hourly: Vec<HourlyMean> = hourly_profile(&analysis.observations, direction);
    write_csv(&results_dir.join(HOURLY_FILE), &hourly)?;
    write_csv(&results_dir.join(DAILY_FILE), &daily_series(&analysis.observations, direction))?;

    let text = render(
        &analysis.observations,
        &analysis.summary,
        station,
        direction,
        Utc::now(),
    )?;
    let report_path = results_dir.join(REPORT_FILE);
    std::fs::write(&report_path, text)?;
    info!(path = %report_path.display(), "Saved report");
    Ok(())
}
