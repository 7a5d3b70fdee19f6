//! Category lookups over the headway dataset.
//!
//! Every query returns `None` when no observation matches, so an empty
//! category is never confused with a zero-minute median or a 0% share.

use crate::analysis::bucket::TimeBucket;
use crate::analysis::types::{DayType, HeadwayObservation, Period};
use crate::analysis::utility::{median, percent_above, quantile};

/// Before/After comparison of a category's median headway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Change {
    pub before: f64,
    pub after: f64,
    /// `after - before`, in minutes.
    pub minutes: f64,
    /// Change relative to the Before median, in percent.
    pub percent: f64,
}

/// Read-only view used by the report and the CLI.
#[derive(Debug, Clone, Copy)]
pub struct HeadwayQuery<'a> {
    observations: &'a [HeadwayObservation],
}

impl<'a> HeadwayQuery<'a> {
    pub fn new(observations: &'a [HeadwayObservation]) -> Self {
        Self { observations }
    }

    fn category(
        &self,
        day_type: DayType,
        bucket: TimeBucket,
        direction: char,
        period: Period,
    ) -> Vec<f64> {
        self.observations
            .iter()
            .filter(|o| {
                let r = &o.record;
                r.day_type == day_type
                    && r.time_bucket == bucket
                    && r.direction == direction
                    && r.period == period
            })
            .map(|o| o.headway_minutes)
            .collect()
    }

    pub fn median_for(
        &self,
        day_type: DayType,
        bucket: TimeBucket,
        direction: char,
        period: Period,
    ) -> Option<f64> {
        median(&self.category(day_type, bucket, direction, period))
    }

    pub fn quantile_for(
        &self,
        day_type: DayType,
        bucket: TimeBucket,
        direction: char,
        period: Period,
        q: f64,
    ) -> Option<f64> {
        quantile(&self.category(day_type, bucket, direction, period), q)
    }

    pub fn count_for(
        &self,
        day_type: DayType,
        bucket: TimeBucket,
        direction: char,
        period: Period,
    ) -> usize {
        self.category(day_type, bucket, direction, period).len()
    }

    /// Share of weekday observations inside the active window that exceed
    /// `threshold` minutes.
    pub fn percent_over(&self, threshold: f64, direction: char, period: Period) -> Option<f64> {
        self.percent_over_in(threshold, direction, period, DayType::Weekday, true)
    }

    /// Share of observations exceeding `threshold` minutes for a day type,
    /// optionally limited to the active window (weekday and active bucket).
    pub fn percent_over_in(
        &self,
        threshold: f64,
        direction: char,
        period: Period,
        day_type: DayType,
        restricted_to_active_window: bool,
    ) -> Option<f64> {
        let values: Vec<f64> = self
            .observations
            .iter()
            .filter(|o| {
                let r = &o.record;
                r.day_type == day_type
                    && r.direction == direction
                    && r.period == period
                    && (!restricted_to_active_window || r.within_active_window())
            })
            .map(|o| o.headway_minutes)
            .collect();
        percent_above(&values, threshold)
    }

    /// `None` unless both periods have data and the Before median is non-zero.
    pub fn median_change(
        &self,
        day_type: DayType,
        bucket: TimeBucket,
        direction: char,
    ) -> Option<Change> {
        let before = self.median_for(day_type, bucket, direction, Period::Before)?;
        let after = self.median_for(day_type, bucket, direction, Period::After)?;
        Change::between(before, after)
    }

    /// Headways inside the active window for `period`, all directions.
    fn active_window(&self, period: Period) -> Vec<f64> {
        self.observations
            .iter()
            .filter(|o| o.record.period == period && o.record.within_active_window())
            .map(|o| o.headway_minutes)
            .collect()
    }

    pub fn active_window_median(&self, period: Period) -> Option<f64> {
        median(&self.active_window(period))
    }

    pub fn active_window_quantile(&self, period: Period, q: f64) -> Option<f64> {
        quantile(&self.active_window(period), q)
    }

    pub fn active_window_percent_over(&self, threshold: f64, period: Period) -> Option<f64> {
        percent_above(&self.active_window(period), threshold)
    }

    pub fn active_window_change(&self) -> Option<Change> {
        Change::between(
            self.active_window_median(Period::Before)?,
            self.active_window_median(Period::After)?,
        )
    }
}

impl Change {
    fn between(before: f64, after: f64) -> Option<Self> {
        if before == 0.0 {
            return None;
        }
        let minutes = after - before;
        Some(Self {
            before,
            after,
            minutes,
            percent: minutes / before * 100.0,
        })
    }
}

pub fn median_for(
    observations: &[HeadwayObservation],
    day_type: DayType,
    bucket: TimeBucket,
    direction: char,
    period: Period,
) -> Option<f64> {
    HeadwayQuery::new(observations).median_for(day_type, bucket, direction, period)
}

pub fn percent_over(
    observations: &[HeadwayObservation],
    threshold: f64,
    direction: char,
    period: Period,
    day_type: DayType,
    restricted_to_active_window: bool,
) -> Option<f64> {
    HeadwayQuery::new(observations).percent_over_in(
        threshold,
        direction,
        period,
        day_type,
        restricted_to_active_window,
    )
}
