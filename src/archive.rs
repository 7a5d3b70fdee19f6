//! Loader for daily GTFS-realtime archives.
//!
//! Each archive is a tarball (xz, gzip or uncompressed) holding a
//! `*stop_times.csv` and a `*trips.csv` resource. Stop times are filtered to
//! the station's platforms while streaming, then left-joined with trip
//! metadata.

use crate::analysis::types::ArrivalRecord;
use crate::config::StationConfig;
use crate::error::LoadError;
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use flate2::read::GzDecoder;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};
use xz2::read::XzDecoder;

const STOP_TIMES_SUFFIX: &str = "stop_times.csv";
const TRIPS_SUFFIX: &str = "trips.csv";

/// Numeric times at or above this are Unix epoch seconds; smaller values are
/// seconds after the start of the service day.
const EPOCH_THRESHOLD_SECONDS: f64 = 1_000_000_000.0;

static DATE_IN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Xz,
    Gzip,
    Plain,
}

impl Compression {
    fn for_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Compression::Xz)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Compression::Gzip)
        } else if name.ends_with(".tar") {
            Some(Compression::Plain)
        } else {
            None
        }
    }
}

fn open_archive(path: &Path) -> Result<tar::Archive<Box<dyn Read>>, LoadError> {
    let compression = Compression::for_path(path)
        .ok_or_else(|| LoadError::UnsupportedArchive(path.to_path_buf()))?;
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = match compression {
        Compression::Xz => Box::new(XzDecoder::new(file)),
        Compression::Gzip => Box::new(GzDecoder::new(file)),
        Compression::Plain => Box::new(file),
    };
    Ok(tar::Archive::new(reader))
}

fn column(headers: &csv::StringRecord, resource: &str, name: &'static str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| LoadError::MissingColumn {
            resource: resource.to_string(),
            column: name,
        })
}

/// The realtime archives key trips by `trip_uid`; static GTFS uses `trip_id`.
fn join_key_column(headers: &csv::StringRecord, resource: &str) -> Result<usize, LoadError> {
    column(headers, resource, "trip_uid").or_else(|_| column(headers, resource, "trip_id"))
}

struct StopTimesSchema {
    stop_id: usize,
    trip_key: usize,
    arrival_time: usize,
    departure_time: usize,
}

impl StopTimesSchema {
    fn from_headers(headers: &csv::StringRecord, resource: &str) -> Result<Self, LoadError> {
        Ok(Self {
            stop_id: column(headers, resource, "stop_id")?,
            trip_key: join_key_column(headers, resource)?,
            arrival_time: column(headers, resource, "arrival_time")?,
            departure_time: column(headers, resource, "departure_time")?,
        })
    }
}

struct TripsSchema {
    trip_key: usize,
    route_id: usize,
    direction_id: usize,
}

impl TripsSchema {
    fn from_headers(headers: &csv::StringRecord, resource: &str) -> Result<Self, LoadError> {
        Ok(Self {
            trip_key: join_key_column(headers, resource)?,
            route_id: column(headers, resource, "route_id")?,
            direction_id: column(headers, resource, "direction_id")?,
        })
    }
}

struct StopTimeRow {
    stop_id: String,
    trip_key: String,
    arrival: Option<f64>,
    departure: Option<f64>,
}

#[derive(Debug, Default)]
struct TripMeta {
    route_id: Option<String>,
    direction_id: Option<String>,
}

fn parse_seconds(field: Option<&str>) -> Option<f64> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_stop_times<R: Read>(
    reader: R,
    resource: &str,
    station: &StationConfig,
) -> Result<Vec<StopTimeRow>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let schema = StopTimesSchema::from_headers(rdr.headers()?, resource)?;

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        let stop_id = record.get(schema.stop_id).unwrap_or_default().trim();
        if !station.contains_stop(stop_id) {
            continue;
        }
        rows.push(StopTimeRow {
            stop_id: stop_id.to_string(),
            trip_key: record.get(schema.trip_key).unwrap_or_default().trim().to_string(),
            arrival: parse_seconds(record.get(schema.arrival_time)),
            departure: parse_seconds(record.get(schema.departure_time)),
        });
    }
    Ok(rows)
}

fn read_trips<R: Read>(reader: R, resource: &str) -> Result<HashMap<String, TripMeta>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let schema = TripsSchema::from_headers(rdr.headers()?, resource)?;

    let mut trips = HashMap::new();
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        let key = record.get(schema.trip_key).unwrap_or_default().trim().to_string();
        trips.entry(key).or_insert_with(|| TripMeta {
            route_id: non_empty(record.get(schema.route_id)),
            direction_id: non_empty(record.get(schema.direction_id)),
        });
    }
    Ok(trips)
}

/// Converts a numeric stop time into an instant.
///
/// Epoch values are taken as-is. Smaller values count seconds from
/// "noon minus 12h" of the service date in the station time zone, and may
/// exceed 86400 for trips running past midnight. Negative or non-finite
/// values yield `None`.
pub fn resolve_instant(seconds: f64, service_date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let millis = (seconds * 1000.0).round() as i64;
    if seconds >= EPOCH_THRESHOLD_SECONDS {
        return DateTime::from_timestamp_millis(millis);
    }
    let noon = tz
        .from_local_datetime(&service_date.and_hms_opt(12, 0, 0)?)
        .earliest()?;
    Some(noon.with_timezone(&Utc) - TimeDelta::hours(12) + TimeDelta::milliseconds(millis))
}

/// Loads the arrivals at the station's platforms from one daily archive.
///
/// A missing resource or a day without rows for the target stops is logged
/// and yields an empty result. IO, CSV and schema problems are returned as
/// [`LoadError`].
#[tracing::instrument(skip_all, fields(archive = %path.display(), %calendar_date))]
pub fn load_day(
    path: &Path,
    calendar_date: NaiveDate,
    station: &StationConfig,
) -> Result<Vec<ArrivalRecord>, LoadError> {
    let mut archive = open_archive(path)?;
    let mut stop_times = None;
    let mut trips = None;

    for entry in archive.entries()? {
        let entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        if stop_times.is_none() && name.ends_with(STOP_TIMES_SUFFIX) {
            debug!(member = %name, "Reading stop times");
            stop_times = Some(read_stop_times(entry, &name, station)?);
        } else if trips.is_none() && name.ends_with(TRIPS_SUFFIX) {
            debug!(member = %name, "Reading trips");
            trips = Some(read_trips(entry, &name)?);
        }
    }

    let (Some(stop_times), Some(trips)) = (stop_times, trips) else {
        warn!("Archive is missing the stop_times or trips resource");
        return Ok(Vec::new());
    };

    if stop_times.is_empty() {
        warn!(stops = ?station.stop_ids, "No stop times for the target stops");
        return Ok(Vec::new());
    }

    let matched = stop_times.len();
    let records: Vec<ArrivalRecord> = stop_times
        .into_iter()
        .filter_map(|row| {
            let seconds = row.arrival.or(row.departure)?;
            let timestamp = resolve_instant(seconds, calendar_date, station.timezone)?;
            let meta = trips.get(&row.trip_key);
            Some(ArrivalRecord {
                stop_id: row.stop_id,
                timestamp,
                route_id: meta.and_then(|m| m.route_id.clone()),
                direction_id: meta.and_then(|m| m.direction_id.clone()),
                trip_id: row.trip_key,
                calendar_date,
            })
        })
        .collect();

    debug!(
        matched,
        without_time = matched - records.len(),
        "Joined stop times with trips"
    );
    Ok(records)
}

/// A daily archive and the service date parsed from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub calendar_date: NaiveDate,
}

/// First valid `YYYY-MM-DD` in the file name.
pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    DATE_IN_NAME
        .find_iter(name)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

/// Archive files in `dir`, sorted by file name.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && Compression::for_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Loads every daily archive in `dir` and concatenates the arrivals in file
/// name order.
///
/// Files without a date in their name and files that fail to load are
/// logged and skipped. An empty directory is an error.
#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_all(dir: &Path, station: &StationConfig) -> Result<Vec<ArrivalRecord>, LoadError> {
    let files = list_archives(dir)?;
    if files.is_empty() {
        return Err(LoadError::NoArchives(dir.to_path_buf()));
    }
    info!(files = files.len(), "Found daily archives");

    let dated: Vec<ArchiveFile> = files
        .into_iter()
        .filter_map(|path| match date_from_filename(&path) {
            Some(calendar_date) => Some(ArchiveFile {
                path,
                calendar_date,
            }),
            None => {
                warn!(file = %path.display(), "Skipping archive without a date in its name");
                None
            }
        })
        .collect();

    let per_day: Vec<Vec<ArrivalRecord>> = dated
        .par_iter()
        .map(|file| match load_day(&file.path, file.calendar_date, station) {
            Ok(records) => {
                if !records.is_empty() {
                    info!(
                        file = %file.path.display(),
                        arrivals = records.len(),
                        "Loaded archive"
                    );
                }
                records
            }
            Err(e) => {
                error!(file = %file.path.display(), error = %e, "Failed to load archive");
                Vec::new()
            }
        })
        .collect();

    let combined: Vec<ArrivalRecord> = per_day.into_iter().flatten().collect();
    info!(arrivals = combined.len(), "Loaded station arrivals");
    Ok(combined)
}

/// One member of an archive, with a table summary for CSV members.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub name: String,
    pub size: u64,
    pub table: Option<TableSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub headers: Vec<String>,
    pub rows: usize,
    /// For each stop-like column, distinct values containing the probe.
    pub stop_candidates: Vec<(String, Vec<String>)>,
}

const MAX_CANDIDATES: usize = 10;

/// Lists an archive's members and summarizes its CSV tables, looking for
/// stop ids that contain `probe` (case-insensitive).
pub fn inspect(path: &Path, probe: &str) -> Result<Vec<MemberSummary>, LoadError> {
    let mut archive = open_archive(path)?;
    let probe = probe.to_ascii_lowercase();
    let mut members = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let size = entry.header().size()?;
        let table = if name.ends_with(".csv") {
            Some(summarize_table(entry, &probe)?)
        } else {
            None
        };
        members.push(MemberSummary { name, size, table });
    }
    Ok(members)
}

fn summarize_table<R: Read>(reader: R, probe: &str) -> Result<TableSummary, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let stop_columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.to_ascii_lowercase().contains("stop"))
        .map(|(i, _)| i)
        .collect();

    let mut candidates: Vec<BTreeSet<String>> = vec![BTreeSet::new(); stop_columns.len()];
    let mut rows = 0;
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        rows += 1;
        for (slot, col) in candidates.iter_mut().zip(&stop_columns) {
            if slot.len() >= MAX_CANDIDATES {
                continue;
            }
            if let Some(value) = record.get(*col) {
                if value.to_ascii_lowercase().contains(probe) {
                    slot.insert(value.to_string());
                }
            }
        }
    }

    let stop_candidates = stop_columns
        .iter()
        .zip(candidates)
        .map(|(col, values)| (headers[*col].clone(), values.into_iter().collect()))
        .collect();

    Ok(TableSummary {
        headers,
        rows,
        stop_candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::env;
    use std::fs;

    const STOP_TIMES: &str = "trip_uid,stop_id,arrival_time,departure_time
t1,B06N,1762174800,1762174830
t2,B06N,,1762175190
t3,B06S,bad,
t4,A01N,1762174800,1762174800
t5,B06S,1762175000,
";

    const TRIPS: &str = "trip_uid,trip_id,route_id,direction_id
t1,x1,F,1
t2,x2,M,1
";

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("station_headways_archive_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn tar_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_xz(path: &Path, members: &[(&str, &str)]) {
        use std::io::Write;
        let mut encoder = xz2::write::XzEncoder::new(File::create(path).unwrap(), 6);
        encoder.write_all(&tar_bytes(members)).unwrap();
        encoder.finish().unwrap();
    }

    fn write_gz(path: &Path, members: &[(&str, &str)]) {
        use std::io::Write;
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
        encoder.write_all(&tar_bytes(members)).unwrap();
        encoder.finish().unwrap();
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    #[test]
    fn test_load_day_filters_joins_and_falls_back() {
        let dir = temp_dir("load_day");
        let path = dir.join("subwaydatanyc_2025-11-03_csv.tar.xz");
        // Trips come first: member order must not matter.
        write_xz(
            &path,
            &[
                ("2025-11-03/subwaydatanyc_2025-11-03_trips.csv", TRIPS),
                ("2025-11-03/subwaydatanyc_2025-11-03_stop_times.csv", STOP_TIMES),
            ],
        );

        let station = StationConfig::roosevelt_island();
        let records = load_day(&path, day(), &station).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].trip_id, "t1");
        assert_eq!(records[0].route_id.as_deref(), Some("F"));
        assert_eq!(records[0].direction_id.as_deref(), Some("1"));
        assert_eq!(records[0].timestamp.timestamp(), 1762174800);
        assert_eq!(records[0].calendar_date, day());

        // Departure time stands in for a missing arrival time.
        assert_eq!(records[1].timestamp.timestamp(), 1762175190);

        // Left join: unknown trip keeps the record without a route.
        assert_eq!(records[2].trip_id, "t5");
        assert_eq!(records[2].route_id, None);

        assert!(records.iter().all(|r| station.contains_stop(&r.stop_id)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_day_gzip_archive() {
        let dir = temp_dir("load_day_gz");
        let path = dir.join("feed_2025-11-03.tar.gz");
        write_gz(&path, &[("stop_times.csv", STOP_TIMES), ("trips.csv", TRIPS)]);

        let records = load_day(&path, day(), &StationConfig::roosevelt_island()).unwrap();
        assert_eq!(records.len(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_day_without_matching_stops_is_empty() {
        let dir = temp_dir("no_match");
        let path = dir.join("subwaydatanyc_2025-11-03_csv.tar.xz");
        let other_station = "trip_uid,stop_id,arrival_time,departure_time\nt1,A01N,1762174800,\n";
        write_xz(&path, &[("stop_times.csv", other_station), ("trips.csv", TRIPS)]);

        let records = load_day(&path, day(), &StationConfig::roosevelt_island()).unwrap();
        assert!(records.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_day_missing_resource_is_empty() {
        let dir = temp_dir("missing_resource");
        let path = dir.join("subwaydatanyc_2025-11-03_csv.tar.xz");
        write_xz(&path, &[("stop_times.csv", STOP_TIMES)]);

        let records = load_day(&path, day(), &StationConfig::roosevelt_island()).unwrap();
        assert!(records.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_day_missing_column_is_an_error() {
        let dir = temp_dir("missing_column");
        let path = dir.join("subwaydatanyc_2025-11-03_csv.tar.xz");
        let no_departure = "trip_uid,stop_id,arrival_time\nt1,B06N,1762174800\n";
        write_xz(&path, &[("stop_times.csv", no_departure), ("trips.csv", TRIPS)]);

        let err = load_day(&path, day(), &StationConfig::roosevelt_island()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn {
                column: "departure_time",
                ..
            }
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_trip_id_join_key_fallback() {
        let dir = temp_dir("trip_id_key");
        let path = dir.join("static_2025-11-03.tar");
        let stop_times = "trip_id,stop_id,arrival_time,departure_time\nx9,B06S,28800,28800\n";
        let trips = "route_id,trip_id,direction_id\nF,x9,0\n";
        fs::write(&path, tar_bytes(&[("stop_times.csv", stop_times), ("trips.csv", trips)])).unwrap();

        let station = StationConfig::roosevelt_island();
        let records = load_day(&path, day(), &station).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].route_id.as_deref(), Some("F"));
        let local = records[0].timestamp.with_timezone(&station.timezone);
        assert_eq!(local.date_naive(), day());
        assert_eq!(local.hour(), 8);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resolve_instant_service_day_rollover() {
        let tz = chrono_tz::America::New_York;
        // 25:00:00 on 2025-11-03 is 01:00 EST on the 4th.
        let instant = resolve_instant(90_000.0, day(), tz).unwrap();
        let local = instant.with_timezone(&tz);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
        assert_eq!(local.hour(), 1);

        assert_eq!(resolve_instant(-5.0, day(), tz), None);
        assert_eq!(resolve_instant(f64::NAN, day(), tz), None);
    }

    #[test]
    fn test_date_from_filename() {
        assert_eq!(
            date_from_filename(Path::new("raw/subwaydatanyc_2025-10-01_csv.tar.xz")),
            NaiveDate::from_ymd_opt(2025, 10, 1)
        );
        assert_eq!(date_from_filename(Path::new("notes.tar.xz")), None);
        assert_eq!(date_from_filename(Path::new("feed_2025-13-45_csv.tar.xz")), None);
    }

    #[test]
    fn test_compression_for_path() {
        assert_eq!(Compression::for_path(Path::new("a.tar.xz")), Some(Compression::Xz));
        assert_eq!(Compression::for_path(Path::new("a.TGZ")), Some(Compression::Gzip));
        assert_eq!(Compression::for_path(Path::new("a.tar")), Some(Compression::Plain));
        assert_eq!(Compression::for_path(Path::new("a.zip")), None);
    }

    #[test]
    fn test_load_all_skips_bad_files() {
        let dir = temp_dir("load_all");
        write_xz(
            &dir.join("subwaydatanyc_2025-11-04_csv.tar.xz"),
            &[("stop_times.csv", STOP_TIMES), ("trips.csv", TRIPS)],
        );
        write_xz(
            &dir.join("subwaydatanyc_2025-11-03_csv.tar.xz"),
            &[("stop_times.csv", STOP_TIMES), ("trips.csv", TRIPS)],
        );
        write_xz(
            &dir.join("undated_csv.tar.xz"),
            &[("stop_times.csv", STOP_TIMES), ("trips.csv", TRIPS)],
        );
        fs::write(dir.join("subwaydatanyc_2025-11-05_csv.tar.xz"), b"not an archive").unwrap();
        fs::write(dir.join("README.txt"), b"ignored").unwrap();

        let records = load_all(&dir, &StationConfig::roosevelt_island()).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].calendar_date, day());
        assert_eq!(records[5].calendar_date, NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_all_empty_directory_is_fatal() {
        let dir = temp_dir("load_all_empty");
        let err = load_all(&dir, &StationConfig::roosevelt_island()).unwrap_err();
        assert!(matches!(err, LoadError::NoArchives(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_inspect_lists_members_and_candidates() {
        let dir = temp_dir("inspect");
        let path = dir.join("subwaydatanyc_2025-11-03_csv.tar.xz");
        write_xz(
            &path,
            &[("stop_times.csv", STOP_TIMES), ("trips.csv", TRIPS), ("README", "hi")],
        );

        let members = inspect(&path, "b06").unwrap();
        assert_eq!(members.len(), 3);

        let stop_times = members[0].table.as_ref().unwrap();
        assert_eq!(stop_times.rows, 5);
        assert_eq!(stop_times.headers[1], "stop_id");
        assert_eq!(
            stop_times.stop_candidates,
            vec![("stop_id".to_string(), vec!["B06N".to_string(), "B06S".to_string()])]
        );

        assert!(members[2].table.is_none());
        assert_eq!(members[2].size, 2);
        fs::remove_dir_all(&dir).unwrap();
    }
}
