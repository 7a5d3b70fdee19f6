//! Downloader for the daily archives.
//!
//! Only writes files into the archive directory; the analysis never talks to
//! the network.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://subwaydata.nyc/data";

/// `subwaydatanyc_YYYY-MM-DD_csv.tar.xz`
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("subwaydatanyc_{}_csv.tar.xz", date.format("%Y-%m-%d"))
}

pub fn archive_url(base_url: &str, date: NaiveDate) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), archive_file_name(date))
}

/// Inclusive range of calendar dates.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Fetches `url`. A 404 is `Ok(None)`; other error statuses are errors.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Option<Vec<u8>>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let resp = resp.error_for_status()?;
    Ok(Some(resp.bytes().await?.to_vec()))
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: usize },
    AlreadyPresent,
    NotFound,
}

/// Downloads one day's archive into `dir` unless it is already there.
///
/// Timeouts are retried up to `retries` more times; any other failure is
/// returned at once. The file is written under a temporary name and renamed
/// so a partial download never looks like an archive.
pub async fn download_day<C: HttpClient + ?Sized>(
    client: &C,
    base_url: &str,
    dir: &Path,
    date: NaiveDate,
    retries: u32,
) -> Result<DownloadOutcome> {
    let target = dir.join(archive_file_name(date));
    if target.exists() {
        debug!(file = %target.display(), "Archive already present");
        return Ok(DownloadOutcome::AlreadyPresent);
    }

    let url = archive_url(base_url, date);
    let mut attempt = 0;
    let bytes = loop {
        match fetch_bytes(client, &url).await {
            Ok(Some(bytes)) => break bytes,
            Ok(None) => return Ok(DownloadOutcome::NotFound),
            Err(e) if is_timeout(&e) && attempt < retries => {
                attempt += 1;
                warn!(attempt, retries, "Download timed out, retrying");
            }
            Err(e) => return Err(e).with_context(|| format!("downloading {url}")),
        }
    };

    let partial: PathBuf = target.with_extension("xz.part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, &target).await?;
    Ok(DownloadOutcome::Downloaded { bytes: bytes.len() })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub not_found: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

impl DownloadReport {
    fn record(&mut self, date: NaiveDate, outcome: Result<DownloadOutcome>) {
        match outcome {
            Ok(DownloadOutcome::Downloaded { .. }) => self.downloaded += 1,
            Ok(DownloadOutcome::AlreadyPresent) => self.already_present += 1,
            Ok(DownloadOutcome::NotFound) => self.not_found.push(date),
            Err(_) => self.failed.push(date),
        }
    }
}

/// Downloads every date in `[start, end]` with at most `concurrency`
/// requests in flight.
#[tracing::instrument(skip_all, fields(dir = %dir.display(), %start, %end))]
pub async fn download_range<C: HttpClient + 'static>(
    client: Arc<C>,
    base_url: &str,
    dir: &Path,
    start: NaiveDate,
    end: NaiveDate,
    concurrency: usize,
    retries: u32,
) -> Result<DownloadReport> {
    tokio::fs::create_dir_all(dir).await?;
    let dates = dates_between(start, end);
    info!(days = dates.len(), concurrency, "Starting archive download");

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(dates.len());

    for date in dates {
        let sem = semaphore.clone();
        let client = client.clone();
        let base_url = base_url.to_string();
        let dir = dir.to_path_buf();
        let span = tracing::info_span!("download_day", %date);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await?;
                let outcome = download_day(client.as_ref(), &base_url, &dir, date, retries).await;
                match &outcome {
                    Ok(DownloadOutcome::Downloaded { bytes }) => info!(bytes, "Downloaded archive"),
                    Ok(DownloadOutcome::AlreadyPresent) => {}
                    Ok(DownloadOutcome::NotFound) => info!("No archive published for this date"),
                    Err(e) => error!(error = %e, "Archive download failed"),
                }
                anyhow::Ok((date, outcome))
            }
            .instrument(span),
        );
        tasks.push(task);
    }

    let mut report = DownloadReport::default();
    for task in tasks {
        let (date, outcome) = task.await??;
        report.record(date, outcome);
    }

    info!(
        downloaded = report.downloaded,
        already_present = report.already_present,
        not_found = report.not_found.len(),
        failed = report.failed.len(),
        "Archive download finished"
    );
    Ok(report)
}
