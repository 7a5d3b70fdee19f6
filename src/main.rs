//! CLI entry point for the station headway analysis.
//!
//! Subcommands build the headway dataset from daily archives, re-render the
//! report from a saved dataset, answer single queries, inspect an archive
//! and download archives.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use station_headways::analysis::{
    BoundaryPolicy, DayType, HeadwayObservation, HeadwayQuery, Period, TimeBucket,
};
use station_headways::archive::inspect;
use station_headways::config::StationConfig;
use station_headways::fetch::{BasicClient, DEFAULT_BASE_URL, download_range};
use station_headways::output::read_headways;
use station_headways::pipeline::{Analysis, analyze_archives, dataset_path, write_results};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "station_headways")]
#[command(about = "Compare subway headways at one station before and after a service change", long_about = None)]
struct Cli {
    #[command(flatten)]
    station: StationArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StationArgs {
    /// Station configuration JSON (defaults to the Roosevelt Island preset)
    #[arg(long, global = true, value_name = "FILE")]
    station_config: Option<PathBuf>,

    /// Override the cutover date (YYYY-MM-DD)
    #[arg(long, global = true)]
    cutover: Option<NaiveDate>,

    /// Directory for the dataset, tables and report
    #[arg(long, global = true, env = "RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,
}

impl StationArgs {
    fn load(&self) -> Result<StationConfig> {
        let station = match &self.station_config {
            Some(path) => StationConfig::load(path)
                .with_context(|| format!("loading station config {}", path.display()))?,
            None => StationConfig::roosevelt_island(),
        };
        Ok(match self.cutover {
            Some(cutover) => station.with_cutover(cutover),
            None => station,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the headway dataset from daily archives and write all results
    Analyze {
        /// Directory holding the daily archives
        #[arg(long, env = "ARCHIVE_DIR", default_value = "raw_data")]
        archive_dir: PathBuf,

        /// How gaps spanning two time buckets are handled (drop-straddling, assign-to-later)
        #[arg(long, default_value_t = BoundaryPolicy::default())]
        boundary_policy: BoundaryPolicy,

        /// Direction code the report focuses on
        #[arg(short, long, default_value_t = 'S')]
        direction: char,
    },
    /// Re-render tables and report from the saved dataset
    Report {
        #[arg(short, long, default_value_t = 'S')]
        direction: char,
    },
    /// Answer a single question from the saved dataset
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// List the members of one archive and look for stop ids
    Inspect {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Substring to look for in stop columns
        #[arg(short, long, default_value = "B06")]
        probe: String,
    },
    /// Download daily archives for a date range
    Download {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long, env = "ARCHIVE_DIR", default_value = "raw_data")]
        archive_dir: PathBuf,

        #[arg(long, env = "ARCHIVE_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Maximum number of concurrent downloads
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Retries per file after a timeout
        #[arg(long, default_value_t = 2)]
        retries: u32,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Median headway of one category
    Median {
        #[arg(long)]
        day_type: DayType,
        /// Bucket slug or label (early-am, morning, midday, evening, night)
        #[arg(long)]
        bucket: TimeBucket,
        #[arg(long)]
        direction: char,
        #[arg(long)]
        period: Period,
    },
    /// Percentage of headways above a threshold
    PctOver {
        /// Threshold in minutes
        #[arg(long)]
        threshold: f64,
        #[arg(long)]
        direction: char,
        #[arg(long)]
        period: Period,
        #[arg(long, default_value = "weekday")]
        day_type: DayType,
        /// Count every hour instead of only the active window
        #[arg(long, default_value_t = false)]
        all_hours: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/station_headways.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("station_headways.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            archive_dir,
            boundary_policy,
            direction,
        } => {
            let station = cli.station.load()?;
            let analysis = analyze_archives(&archive_dir, &station, boundary_policy)?;
            write_results(&cli.station.results_dir, &analysis, &station, direction)?;
            info!(results_dir = %cli.station.results_dir.display(), "Analysis complete");
        }
        Commands::Report { direction } => {
            let station = cli.station.load()?;
            let observations = load_dataset(&cli.station.results_dir, &station)?;
            let analysis = Analysis::from_observations(observations, &station);
            write_results(&cli.station.results_dir, &analysis, &station, direction)?;
        }
        Commands::Query { query } => {
            let station = cli.station.load()?;
            let observations = load_dataset(&cli.station.results_dir, &station)?;
            run_query(&observations, query);
        }
        Commands::Inspect { archive, probe } => {
            for member in inspect(&archive, &probe)? {
                println!("{} ({} bytes)", member.name, member.size);
                if let Some(table) = member.table {
                    println!("  rows: {}", table.rows);
                    println!("  columns: {}", table.headers.join(", "));
                    for (column, values) in table.stop_candidates {
                        if !values.is_empty() {
                            println!("  {column} matching {probe:?}: {}", values.join(", "));
                        }
                    }
                }
            }
        }
        Commands::Download {
            start,
            end,
            archive_dir,
            base_url,
            concurrency,
            retries,
            timeout,
        } => {
            let client = BasicClient::new(Duration::from_secs(10), Duration::from_secs(timeout))?;
            let report = download_range(
                Arc::new(client),
                &base_url,
                &archive_dir,
                start,
                end,
                concurrency,
                retries,
            )
            .await?;
            if !report.failed.is_empty() {
                warn!(failed = ?report.failed, "Some archives could not be downloaded");
            }
        }
    }

    Ok(())
}

fn load_dataset(
    results_dir: &Path,
    station: &StationConfig,
) -> Result<Vec<HeadwayObservation>> {
    let path = dataset_path(results_dir, station);
    read_headways(&path, station).context("run `analyze` first to build the dataset")
}

fn run_query(observations: &[HeadwayObservation], query: QueryCommand) {
    let q = HeadwayQuery::new(observations);
    let answer = match query {
        QueryCommand::Median {
            day_type,
            bucket,
            direction,
            period,
        } => q
            .median_for(day_type, bucket, direction, period)
            .map(|v| format!("{v:.1} min")),
        QueryCommand::PctOver {
            threshold,
            direction,
            period,
            day_type,
            all_hours,
        } => q
            .percent_over_in(threshold, direction, period, day_type, !all_hours)
            .map(|v| format!("{v:.1}%")),
    };
    println!("{}", answer.unwrap_or_else(|| "N/A".to_string()));
}
