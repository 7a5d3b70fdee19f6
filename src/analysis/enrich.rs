//! Derives calendar attributes for raw arrivals.

use crate::analysis::bucket::TimeBucket;
use crate::analysis::types::{ArrivalRecord, DayType, EnrichedRecord, Period};
use crate::config::StationConfig;
use chrono::{Datelike, Timelike};

/// Localizes the arrival instant to the station time zone and derives
/// direction, date, hour, day type, period and time bucket from it.
pub fn enrich(arrival: ArrivalRecord, station: &StationConfig) -> EnrichedRecord {
    let local = arrival.timestamp.with_timezone(&station.timezone);
    let local_date = local.date_naive();
    let hour = local.hour();
    let weekday_index = local.weekday().num_days_from_monday();
    let is_weekday = weekday_index < 5;

    let time_bucket = match TimeBucket::from_hour(hour) {
        Some(bucket) => bucket,
        None => unreachable!("chrono hours are always below 24"),
    };

    EnrichedRecord {
        direction: arrival.stop_id.chars().last().unwrap_or('?'),
        local_date,
        hour,
        minute: local.minute(),
        weekday_index,
        is_weekday,
        day_type: DayType::from_is_weekday(is_weekday),
        period: Period::for_date(local_date, station.cutover_date),
        time_bucket,
        arrival,
    }
}

pub fn enrich_all(arrivals: Vec<ArrivalRecord>, station: &StationConfig) -> Vec<EnrichedRecord> {
    arrivals
        .into_iter()
        .map(|arrival| enrich(arrival, station))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn arrival(stop_id: &str, ts: chrono::DateTime<Utc>) -> ArrivalRecord {
        ArrivalRecord {
            stop_id: stop_id.to_string(),
            trip_id: "t1".to_string(),
            timestamp: ts,
            route_id: Some("F".to_string()),
            direction_id: None,
            calendar_date: ts.date_naive(),
        }
    }

    #[test]
    fn test_enrich_localizes_to_station_time_zone() {
        let station = StationConfig::roosevelt_island();
        // 2025-12-08 13:30 UTC is 08:30 in New York (EST), a Monday.
        let ts = Utc.with_ymd_and_hms(2025, 12, 8, 13, 30, 0).unwrap();
        let record = enrich(arrival("B06S", ts), &station);

        assert_eq!(record.direction, 'S');
        assert_eq!(record.local_date, NaiveDate::from_ymd_opt(2025, 12, 8).unwrap());
        assert_eq!(record.hour, 8);
        assert_eq!(record.minute, 30);
        assert_eq!(record.weekday_index, 0);
        assert!(record.is_weekday);
        assert_eq!(record.day_type, DayType::Weekday);
        assert_eq!(record.period, Period::After);
        assert_eq!(record.time_bucket, TimeBucket::Morning);
        assert_eq!(record.bucket_label(), "Morning Rush (6–9 AM)");
        assert!(record.within_active_window());
    }

    #[test]
    fn test_enrich_local_date_differs_from_utc_date() {
        let station = StationConfig::roosevelt_island();
        // 2025-12-07 03:00 UTC is still Saturday evening 22:00 in New York.
        let ts = Utc.with_ymd_and_hms(2025, 12, 7, 3, 0, 0).unwrap();
        let record = enrich(arrival("B06N", ts), &station);

        assert_eq!(record.local_date, NaiveDate::from_ymd_opt(2025, 12, 6).unwrap());
        assert_eq!(record.weekday_index, 5);
        assert_eq!(record.day_type, DayType::Weekend);
        assert_eq!(record.period, Period::Before);
        assert_eq!(record.time_bucket, TimeBucket::Night);
        assert!(!record.within_active_window());
    }

    #[test]
    fn test_enrich_all_is_total() {
        let station = StationConfig::roosevelt_island();
        let arrivals: Vec<_> = (0..48)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()
                    + chrono::TimeDelta::minutes(30 * i);
                arrival("B06N", ts)
            })
            .collect();
        let enriched = enrich_all(arrivals.clone(), &station);
        assert_eq!(enriched.len(), arrivals.len());
        assert_eq!(enrich_all(arrivals, &station), enriched);
    }
}
