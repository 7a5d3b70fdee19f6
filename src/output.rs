//! CSV persistence for the headway dataset and the derived tables.
//!
//! The dataset file is the only artifact that is read back; summary tables
//! and chart series are write-only and always re-derivable.

use crate::analysis::enrich::enrich;
use crate::analysis::headway::within_bounds;
use crate::analysis::types::{ArrivalRecord, HeadwayObservation};
use crate::config::StationConfig;
use crate::error::LoadError;
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// One persisted headway observation.
///
/// Calendar columns are written for external tools; on reload they are
/// recomputed from `arrival_time` with the current station configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadwayRow {
    pub arrival_date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    pub direction: String,
    pub is_weekday: bool,
    pub headway_min: f64,
    pub swap_period: String,
    pub day_type: String,
    pub time_bucket: String,
    pub stop_id: String,
    pub trip_id: String,
    pub route_id: Option<String>,
    pub calendar_date: NaiveDate,
    pub arrival_time: DateTime<Utc>,
}

impl From<&HeadwayObservation> for HeadwayRow {
    fn from(o: &HeadwayObservation) -> Self {
        let r = &o.record;
        Self {
            arrival_date: r.local_date,
            hour: r.hour,
            minute: r.minute,
            direction: r.direction.to_string(),
            is_weekday: r.is_weekday,
            headway_min: o.headway_minutes,
            swap_period: r.period.to_string(),
            day_type: r.day_type.to_string(),
            time_bucket: r.bucket_label().to_string(),
            stop_id: r.arrival.stop_id.clone(),
            trip_id: r.arrival.trip_id.clone(),
            route_id: r.arrival.route_id.clone(),
            calendar_date: r.arrival.calendar_date,
            arrival_time: r.arrival.timestamp,
        }
    }
}

impl HeadwayRow {
    fn into_observation(self, station: &StationConfig) -> HeadwayObservation {
        let arrival = ArrivalRecord {
            stop_id: self.stop_id,
            trip_id: self.trip_id,
            timestamp: self.arrival_time,
            route_id: self.route_id,
            direction_id: None,
            calendar_date: self.calendar_date,
        };
        HeadwayObservation {
            record: enrich(arrival, station),
            headway_minutes: self.headway_min,
        }
    }
}

/// Writes `rows` to `path` with a header line, replacing any existing file.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), LoadError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote CSV");
    Ok(())
}

/// Persists the observation dataset, one row per observation.
pub fn write_headways(path: &Path, observations: &[HeadwayObservation]) -> Result<(), LoadError> {
    let rows: Vec<HeadwayRow> = observations.iter().map(HeadwayRow::from).collect();
    write_csv(path, &rows)?;
    info!(path = %path.display(), rows = rows.len(), "Saved headway dataset");
    Ok(())
}

/// Reloads a persisted dataset.
///
/// Enrichment is re-derived with `station` and rows outside the headway
/// bounds are filtered again, so an edited or stale file cannot smuggle
/// outliers into the queries.
pub fn read_headways(
    path: &Path,
    station: &StationConfig,
) -> Result<Vec<HeadwayObservation>, LoadError> {
    if !path.exists() {
        return Err(LoadError::DatasetMissing(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_reader(File::open(path)?);

    let mut observations = Vec::new();
    let mut rejected = 0usize;
    for row in reader.deserialize::<HeadwayRow>() {
        let observation = row?.into_observation(station);
        if within_bounds(observation.headway_minutes, observation.record.time_bucket) {
            observations.push(observation);
        } else {
            rejected += 1;
        }
    }

    if rejected > 0 {
        warn!(rejected, "Dropped persisted rows outside headway bounds");
    }
    info!(
        path = %path.display(),
        observations = observations.len(),
        "Loaded headway dataset"
    );
    Ok(observations)
}
