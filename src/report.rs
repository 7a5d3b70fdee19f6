//! Plain-text narrative report.
//!
//! Missing categories render as `N/A` so an empty bucket is never read as a
//! zero-minute headway.

use crate::analysis::aggregate::SummaryRow;
use crate::analysis::bucket::{Coverage, TimeBucket};
use crate::analysis::query::{Change, HeadwayQuery};
use crate::analysis::types::{DayType, HeadwayObservation, Period};
use crate::config::StationConfig;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::{self, Write};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Thresholds, in minutes, for the long-wait section.
pub const LONG_WAIT_THRESHOLDS: [f64; 2] = [10.0, 15.0];

/// Weekday blocks lead with the buckets the service change touches.
const WEEKDAY_ORDER: [TimeBucket; 5] = [
    TimeBucket::Morning,
    TimeBucket::Midday,
    TimeBucket::Evening,
    TimeBucket::Night,
    TimeBucket::EarlyAm,
];

fn minutes(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => "N/A".to_string(),
    }
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => "N/A".to_string(),
    }
}

fn change(value: Option<Change>) -> String {
    match value {
        Some(c) => {
            let word = if c.minutes > 0.0 {
                "LONGER ▲"
            } else {
                "SHORTER ▼"
            };
            format!("{:.1} min {word} ({:.0}%)", c.minutes.abs(), c.percent.abs())
        }
        None => "N/A".to_string(),
    }
}

fn date_range(observations: &[HeadwayObservation], period: Period) -> Option<(NaiveDate, NaiveDate)> {
    let dates = observations
        .iter()
        .filter(|o| o.record.period == period)
        .map(|o| o.record.local_date);
    let first = dates.clone().min()?;
    let last = dates.max()?;
    Some((first, last))
}

fn write_range(out: &mut impl Write, label: &str, range: Option<(NaiveDate, NaiveDate)>) -> fmt::Result {
    match range {
        Some((first, last)) => writeln!(out, "  {label} {first} – {last}"),
        None => writeln!(out, "  {label} no data"),
    }
}

fn coverage_note(bucket: TimeBucket) -> &'static str {
    match bucket.change_coverage() {
        Coverage::Full => " ★ CHANGE AFFECTS THIS PERIOD",
        Coverage::Partial => " ★ PARTIALLY AFFECTED",
        Coverage::None => " (outside the change window)",
    }
}

fn write_study_design(
    out: &mut impl Write,
    observations: &[HeadwayObservation],
    station: &StationConfig,
) -> fmt::Result {
    writeln!(out, "STUDY DESIGN")?;
    write_range(out, "Before:", date_range(observations, Period::Before))?;
    write_range(out, "After: ", date_range(observations, Period::After))?;
    writeln!(out, "  Cutover date: {}", station.cutover_date)?;
    if let Some(description) = &station.change_description {
        writeln!(out, "  Change: {description}")?;
    }
    writeln!(out, "  Time buckets (identical clock boundaries on all days):")?;
    for bucket in TimeBucket::ALL {
        let hours = bucket.hours();
        let weekend = if bucket.weekend_label() != bucket.weekday_label() {
            format!(" / {}", bucket.weekend_label())
        } else {
            String::new()
        };
        writeln!(
            out,
            "    {}. {:02}:00–{:02}:00  {}{weekend}",
            bucket.ordinal(),
            hours.start,
            hours.end,
            bucket.weekday_label(),
        )?;
    }
    writeln!(out, "  Active window: weekdays, Morning Rush through Evening Rush")?;
    writeln!(out, "  Night is partially covered; Early AM is not covered")?;
    writeln!(out)
}

fn write_weekday_blocks(out: &mut impl Write, query: &HeadwayQuery, direction: char) -> fmt::Result {
    for bucket in WEEKDAY_ORDER {
        let day_type = DayType::Weekday;
        writeln!(
            out,
            "[{}] {}{}",
            bucket.ordinal(),
            bucket.label(day_type),
            coverage_note(bucket)
        )?;
        for period in [Period::Before, Period::After] {
            let tag = match period {
                Period::Before => "Before:",
                Period::After => "After: ",
            };
            writeln!(
                out,
                "  {tag} median {} min | 90th pct {} min | n={}",
                minutes(query.median_for(day_type, bucket, direction, period)),
                minutes(query.quantile_for(day_type, bucket, direction, period, 0.9)),
                query.count_for(day_type, bucket, direction, period),
            )?;
        }
        writeln!(
            out,
            "  Change: {}",
            change(query.median_change(day_type, bucket, direction))
        )?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_weekend_blocks(out: &mut impl Write, query: &HeadwayQuery, direction: char) -> fmt::Result {
    let day_type = DayType::Weekend;
    for bucket in TimeBucket::ALL {
        writeln!(out, "[{}] {}", bucket.ordinal(), bucket.label(day_type))?;
        writeln!(
            out,
            "  Before: median {} min | After: {} min | Change: {}",
            minutes(query.median_for(day_type, bucket, direction, Period::Before)),
            minutes(query.median_for(day_type, bucket, direction, Period::After)),
            change(query.median_change(day_type, bucket, direction)),
        )?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_long_waits(out: &mut impl Write, query: &HeadwayQuery, direction: char) -> fmt::Result {
    writeln!(out, "Share of waits, weekday active window:")?;
    for threshold in LONG_WAIT_THRESHOLDS {
        writeln!(
            out,
            "  Over {threshold:.0} min: before {} | after {}",
            percent(query.percent_over(threshold, direction, Period::Before)),
            percent(query.percent_over(threshold, direction, Period::After)),
        )?;
    }
    writeln!(out)
}

/// Both directions together, weekday active window only.
fn write_active_window_totals(out: &mut impl Write, query: &HeadwayQuery) -> fmt::Result {
    writeln!(out, "All change-active hours, both directions:")?;
    writeln!(
        out,
        "  Median: {} min → {} min ({})",
        minutes(query.active_window_median(Period::Before)),
        minutes(query.active_window_median(Period::After)),
        change(query.active_window_change()),
    )?;
    writeln!(
        out,
        "  90th pct: {} min → {} min",
        minutes(query.active_window_quantile(Period::Before, 0.9)),
        minutes(query.active_window_quantile(Period::After, 0.9)),
    )?;
    for threshold in LONG_WAIT_THRESHOLDS {
        writeln!(
            out,
            "  Waits over {threshold:.0} min: {} → {}",
            percent(query.active_window_percent_over(threshold, Period::Before)),
            percent(query.active_window_percent_over(threshold, Period::After)),
        )?;
    }
    writeln!(out)
}

fn write_summary_table(out: &mut impl Write, summary: &[SummaryRow]) -> fmt::Result {
    writeln!(
        out,
        "{:<8} {:<28} {:<12} {:<28} {:>6} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "day_type", "time_bucket", "swap_period", "direction", "count", "median", "mean", "p25", "p75", "p90"
    )?;
    for row in summary {
        writeln!(
            out,
            "{:<8} {:<28} {:<12} {:<28} {:>6} {:>7.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1}",
            row.day_type.as_str(),
            row.time_bucket,
            row.swap_period.as_str(),
            row.direction,
            row.count,
            row.median,
            row.mean,
            row.p25,
            row.p75,
            row.p90,
        )?;
    }
    Ok(())
}

/// Writes the report for one direction to `out`.
pub fn write_report(
    out: &mut impl Write,
    observations: &[HeadwayObservation],
    summary: &[SummaryRow],
    station: &StationConfig,
    direction: char,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    let query = HeadwayQuery::new(observations);
    let label = station.direction_label(direction);
    let stops: Vec<&str> = station.stop_ids.iter().map(String::as_str).collect();

    writeln!(out, "{} — HEADWAY ANALYSIS", station.name.to_uppercase())?;
    writeln!(out, "Before vs. after {}", station.cutover_date.format("%B %-d, %Y"))?;
    writeln!(
        out,
        "Generated: {}",
        generated_at
            .with_timezone(&station.timezone)
            .format("%Y-%m-%d %H:%M")
    )?;
    writeln!(out, "Station: {} (stops {})", station.name, stops.join(", "))?;
    writeln!(out, "Observations: {}", observations.len())?;
    writeln!(out)?;

    write_study_design(out, observations, station)?;

    writeln!(out, "{RULE}")?;
    writeln!(out, "WEEKDAYS — {label}")?;
    writeln!(out, "{RULE}")?;
    write_weekday_blocks(out, &query, direction)?;
    write_long_waits(out, &query, direction)?;
    write_active_window_totals(out, &query)?;

    writeln!(out, "{RULE}")?;
    writeln!(out, "WEEKENDS — {label}")?;
    writeln!(out, "{RULE}")?;
    write_weekend_blocks(out, &query, direction)?;

    writeln!(out, "{RULE}")?;
    writeln!(out, "FULL STATISTICS TABLE")?;
    writeln!(out, "{RULE}")?;
    write_summary_table(out, summary)
}

/// Renders the report into a `String`.
pub fn render(
    observations: &[HeadwayObservation],
    summary: &[SummaryRow],
    station: &StationConfig,
    direction: char,
    generated_at: DateTime<Utc>,
) -> Result<String, fmt::Error> {
    let mut text = String::new();
    write_report(&mut text, observations, summary, station, direction, generated_at)?;
    Ok(text)
}
