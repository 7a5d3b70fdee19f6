use chrono::{NaiveDate, TimeZone};
use station_headways::analysis::{
    BoundaryPolicy, DayType, HeadwayQuery, Period, TimeBucket, median_for, percent_over, summarize,
};
use station_headways::config::StationConfig;
use station_headways::error::LoadError;
use station_headways::output::read_headways;
use station_headways::pipeline::{
    DAILY_FILE, HOURLY_FILE, REPORT_FILE, SUMMARY_FILE, analyze_archives, dataset_path,
    write_results,
};
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn temp_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("station_headways_it_{name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn station() -> StationConfig {
    StationConfig {
        name: "Test Island".to_string(),
        stop_ids: ["X01N", "X01S"].iter().map(|s| s.to_string()).collect(),
        cutover_date: NaiveDate::from_ymd_opt(2025, 12, 8).unwrap(),
        timezone: chrono_tz::America::New_York,
        direction_labels: [("N", "Uptown"), ("S", "Downtown")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        change_description: None,
    }
}

/// Epoch seconds of a New York wall-clock time.
fn epoch(date: (i32, u32, u32), hms: (u32, u32, u32)) -> i64 {
    chrono_tz::America::New_York
        .with_ymd_and_hms(date.0, date.1, date.2, hms.0, hms.1, hms.2)
        .single()
        .unwrap()
        .timestamp()
}

fn write_archive(path: &Path, stop_times: &str, trips: &str) {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in [("day/stop_times.csv", stop_times), ("day/trips.csv", trips)] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = xz2::write::XzEncoder::new(File::create(path).unwrap(), 6);
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap();
}

fn stop_times(rows: &[(&str, &str, i64)]) -> String {
    let mut csv = String::from("trip_uid,stop_id,arrival_time,departure_time\n");
    for (trip, stop, t) in rows {
        csv.push_str(&format!("{trip},{stop},{t},{t}\n"));
    }
    csv
}

const TRIPS: &str = "trip_uid,route_id,direction_id\na,F,0\nb,F,0\nc,F,0\nd,M,1\ne,M,1\nf,M,1\n";

fn build_archives(dir: &Path) {
    let before = (2025, 12, 1);
    write_archive(
        &dir.join("subwaydatanyc_2025-12-01_csv.tar.xz"),
        &stop_times(&[
            ("a", "X01N", epoch(before, (8, 0, 0))),
            ("b", "X01N", epoch(before, (8, 6, 30))),
            ("c", "X01N", epoch(before, (8, 12, 30))),
            ("d", "X01S", epoch(before, (17, 0, 0))),
            ("e", "X01S", epoch(before, (17, 0, 30))),
            ("f", "X01S", epoch(before, (17, 10, 30))),
            ("a", "Z99N", epoch(before, (8, 3, 0))),
        ]),
        TRIPS,
    );

    let after = (2025, 12, 8);
    write_archive(
        &dir.join("subwaydatanyc_2025-12-08_csv.tar.xz"),
        &stop_times(&[
            ("a", "X01N", epoch(after, (8, 0, 0))),
            ("b", "X01N", epoch(after, (8, 10, 0))),
            ("c", "X01N", epoch(after, (8, 59, 0))),
            ("d", "X01N", epoch(after, (9, 1, 0))),
        ]),
        TRIPS,
    );

    // No rows for the target stops.
    write_archive(
        &dir.join("subwaydatanyc_2025-12-09_csv.tar.xz"),
        &stop_times(&[("a", "Z99N", epoch((2025, 12, 9), (8, 0, 0)))]),
        TRIPS,
    );

    fs::write(dir.join("notes_csv.tar.xz"), b"no date in this name").unwrap();
}

#[test]
fn test_end_to_end_pipeline() {
    let archives = temp_dir("archives");
    let results = temp_dir("results");
    build_archives(&archives);
    let station = station();

    let analysis = analyze_archives(&archives, &station, BoundaryPolicy::DropStraddling).unwrap();
    let gaps: Vec<f64> = analysis.observations.iter().map(|o| o.headway_minutes).collect();
    // Before: 6.5, 6.0 northbound, 10.0 southbound. After: 10.0 and 49.0
    // northbound; 8:59 -> 9:01 spans two buckets and is not paired.
    assert_eq!(gaps.len(), 5);
    assert_eq!(analysis.count(Period::Before), 3);
    assert_eq!(analysis.count(Period::After), 2);

    let obs = &analysis.observations;
    assert_eq!(
        median_for(obs, DayType::Weekday, TimeBucket::Morning, 'N', Period::Before),
        Some(6.25)
    );
    assert_eq!(
        median_for(obs, DayType::Weekday, TimeBucket::Morning, 'N', Period::After),
        Some(29.5)
    );
    assert_eq!(
        median_for(obs, DayType::Weekday, TimeBucket::Evening, 'S', Period::Before),
        Some(10.0)
    );
    // No post-cutover weekday evening rows in either direction.
    assert_eq!(
        median_for(obs, DayType::Weekday, TimeBucket::Evening, 'N', Period::After),
        None
    );
    assert_eq!(
        percent_over(obs, 10.0, 'N', Period::After, DayType::Weekday, true),
        Some(50.0)
    );

    let change = HeadwayQuery::new(obs)
        .median_change(DayType::Weekday, TimeBucket::Morning, 'N')
        .unwrap();
    assert_eq!(change.minutes, 23.25);

    assert_eq!(analysis.summary.len(), 3);
    assert_eq!(analysis.summary[0].direction, "Uptown");
    assert_eq!(analysis.summary[0].swap_period, Period::Before);
    assert_eq!(analysis.summary[1].swap_period, Period::After);
    assert_eq!(analysis.summary[2].direction, "Downtown");

    write_results(&results, &analysis, &station, 'N').unwrap();
    for file in [SUMMARY_FILE, HOURLY_FILE, DAILY_FILE, REPORT_FILE] {
        assert!(results.join(file).exists(), "{file} was not written");
    }
    let dataset = dataset_path(&results, &station);
    assert!(dataset.ends_with("test_island_headways.csv"));

    let report = fs::read_to_string(results.join(REPORT_FILE)).unwrap();
    assert!(report.starts_with("TEST ISLAND — HEADWAY ANALYSIS"));
    assert!(report.contains("WEEKDAYS — Uptown"));
    assert!(report.contains("N/A"));

    let reloaded = read_headways(&dataset, &station).unwrap();
    assert_eq!(reloaded.len(), analysis.observations.len());
    assert_eq!(summarize(&reloaded, &station), analysis.summary);

    fs::remove_dir_all(&archives).unwrap();
    fs::remove_dir_all(&results).unwrap();
}

#[test]
fn test_assign_to_later_pairs_across_buckets() {
    let archives = temp_dir("archives_later");
    build_archives(&archives);
    let station = station();

    let analysis = analyze_archives(&archives, &station, BoundaryPolicy::AssignToLater).unwrap();
    let midday: Vec<f64> = analysis
        .observations
        .iter()
        .filter(|o| o.record.time_bucket == TimeBucket::Midday)
        .map(|o| o.headway_minutes)
        .collect();
    assert_eq!(midday, vec![2.0]);

    fs::remove_dir_all(&archives).unwrap();
}

#[test]
fn test_cutover_override_moves_observations() {
    let archives = temp_dir("archives_cutover");
    build_archives(&archives);
    let station = station().with_cutover(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap());

    let analysis = analyze_archives(&archives, &station, BoundaryPolicy::default()).unwrap();
    assert_eq!(analysis.count(Period::Before), 0);
    assert_eq!(analysis.count(Period::After), 5);

    fs::remove_dir_all(&archives).unwrap();
}

#[test]
fn test_empty_archive_directory_is_fatal() {
    let archives = temp_dir("archives_empty");
    let err = analyze_archives(&archives, &station(), BoundaryPolicy::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::NoArchives(_))
    ));
    fs::remove_dir_all(&archives).unwrap();
}

#[test]
fn test_missing_dataset_is_reported() {
    let results = temp_dir("results_missing");
    let err = read_headways(&dataset_path(&results, &station()), &station()).unwrap_err();
    assert!(matches!(err, LoadError::DatasetMissing(_)));
    fs::remove_dir_all(&results).unwrap();
}
