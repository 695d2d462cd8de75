use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

/// Errors raised while reading calendar dates from record sources.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WeekError {
    #[error("invalid date format: {input:?} (expected YYYY-MM-DD)")]
    InvalidDateFormat { input: String },
}

/// A record that sits on a calendar day.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for NaiveDate {
    fn date(&self) -> NaiveDate {
        *self
    }
}

impl<T: Dated> Dated for &T {
    fn date(&self) -> NaiveDate {
        (**self).date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekInfo {
    pub week_number: u32,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

/// One anchored week together with the records that fall in it.
#[derive(Debug, Clone, Serialize)]
pub struct WeekBucket<R> {
    pub info: WeekInfo,
    pub records: Vec<R>,
}

/// Parses `YYYY-MM-DD`, or the date part of an ISO-8601 timestamp.
///
/// Year, month and day are read straight from the string, so the result is
/// the same calendar day whatever the host timezone is. A timestamp may use
/// `T` or a space before the time and must continue with `HH:MM`; seconds,
/// fractions and any offset after that are ignored.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, WeekError> {
    let invalid = || WeekError::InvalidDateFormat {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let (date_part, time_part) = match trimmed.find(['T', ' ']) {
        Some(split) => (&trimmed[..split], Some(&trimmed[split + 1..])),
        None => (trimmed, None),
    };
    if let Some(time) = time_part {
        if !looks_like_clock_time(time) {
            return Err(invalid());
        }
    }
    let mut parts = date_part.split('-');

    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return Err(invalid());
    }
    if !(year.bytes().chain(month.bytes()).chain(day.bytes())).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn looks_like_clock_time(time: &str) -> bool {
    let &[h1, h2, b':', m1, m2, ..] = time.as_bytes() else {
        return false;
    };
    if ![h1, h2, m1, m2].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (h1 - b'0') * 10 + (h2 - b'0');
    let minute = (m1 - b'0') * 10 + (m2 - b'0');
    hour < 24 && minute < 60
}

/// Earliest calendar day across `records`, or `None` when there are none.
pub fn first_date<R: Dated>(records: &[R]) -> Option<NaiveDate> {
    records.iter().map(Dated::date).min()
}

fn days_since(date: NaiveDate, reference: NaiveDate) -> i64 {
    (date - reference).num_days()
}

pub fn week_number(date: NaiveDate, reference: Option<NaiveDate>) -> u32 {
    let Some(reference) = reference else {
        return 1;
    };

    let days = days_since(date, reference);
    if days < 0 {
        return 1;
    }
    (days / 7 + 1) as u32
}

/// 1-based position of `date` inside its week, where week 1 starts exactly
/// on `reference`.
pub fn day_in_week(date: NaiveDate, reference: Option<NaiveDate>) -> u32 {
    let Some(reference) = reference else {
        return 1;
    };

    let days = days_since(date, reference);
    if days < 0 {
        return 1;
    }
    (days % 7 + 1) as u32
}

/// Week number and range for `date`.
///
/// Without a reference the week falls back to the Monday-start week that
/// contains `date`, numbered 1. With a reference, week N covers
/// `reference + 7 * (N - 1)` through six days later.
pub fn week_info(date: NaiveDate, reference: Option<NaiveDate>) -> WeekInfo {
    let week_start = match reference {
        None => {
            let offset = date.weekday().num_days_from_monday() as i64;
            return WeekInfo {
                week_number: 1,
                week_start: date - Duration::days(offset),
                week_end: date - Duration::days(offset) + Duration::days(6),
            };
        }
        Some(reference) => {
            let week = week_number(date, Some(reference));
            reference + Duration::days(7 * (week as i64 - 1))
        }
    };

    WeekInfo {
        week_number: week_number(date, reference),
        week_start,
        week_end: week_start + Duration::days(6),
    }
}

/// Partitions records by anchored week number. Every record lands in
/// exactly one bucket; order inside a bucket follows input order.
pub fn group_by_week<R, I>(records: I, reference: Option<NaiveDate>) -> BTreeMap<u32, Vec<R>>
where
    R: Dated,
    I: IntoIterator<Item = R>,
{
    let mut grouped: BTreeMap<u32, Vec<R>> = BTreeMap::new();

    for record in records {
        let week = week_number(record.date(), reference);
        grouped.entry(week).or_default().push(record);
    }

    grouped
}

/// Weeks newest first, each with its records sorted newest first.
pub fn weekly_buckets<R, I>(records: I, reference: Option<NaiveDate>) -> Vec<WeekBucket<R>>
where
    R: Dated,
    I: IntoIterator<Item = R>,
{
    group_by_week(records, reference)
        .into_iter()
        .rev()
        .filter_map(|(_, mut records)| {
            records.sort_by(|a, b| b.date().cmp(&a.date()));
            let newest = records.first()?.date();
            Some(WeekBucket {
                info: week_info(newest, reference),
                records,
            })
        })
        .collect()
}

/// Calendar day of `instant` in the fixed reference timezone.
pub fn calendar_date_at(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

pub fn calendar_today(offset: FixedOffset) -> NaiveDate {
    calendar_date_at(Utc::now(), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(value: &str) -> NaiveDate {
        parse_calendar_date(value).expect("valid date")
    }

    #[test]
    fn reference_date_is_week_one_day_one() {
        let reference = day("2024-01-01");
        assert_eq!(week_number(reference, Some(reference)), 1);
        assert_eq!(day_in_week(reference, Some(reference)), 1);
    }

    #[test]
    fn week_boundaries_follow_reference() {
        let reference = Some(day("2024-01-01"));
        assert_eq!(week_number(day("2024-01-07"), reference), 1);
        assert_eq!(week_number(day("2024-01-08"), reference), 2);
        assert_eq!(day_in_week(day("2024-01-08"), reference), 1);
        assert_eq!(day_in_week(day("2024-01-14"), reference), 7);
        assert_eq!(week_number(day("2024-03-15"), reference), 11);
    }

    #[test]
    fn dates_before_reference_clamp_to_first_day() {
        let reference = Some(day("2024-01-10"));
        let early = day("2024-01-02");
        assert_eq!(week_number(early, reference), 1);
        assert_eq!(day_in_week(early, reference), 1);

        let info = week_info(early, reference);
        assert_eq!(info.week_number, 1);
        assert_eq!(info.week_start, day("2024-01-10"));
    }

    #[test]
    fn missing_reference_defaults_to_first_week() {
        assert_eq!(week_number(day("2024-05-20"), None), 1);
        assert_eq!(day_in_week(day("2024-05-20"), None), 1);
    }

    #[test]
    fn week_info_spans_seven_days() {
        let reference = Some(day("2024-01-03"));
        let mut date = day("2023-12-25");
        for _ in 0..60 {
            let info = week_info(date, reference);
            assert_eq!(info.week_end, info.week_start + Duration::days(6));
            assert!(info.week_start >= day("2024-01-03"));
            date += Duration::days(1);
        }

        let info = week_info(day("2024-01-20"), reference);
        assert_eq!(info.week_number, 3);
        assert_eq!(info.week_start, day("2024-01-17"));
        assert_eq!(info.week_end, day("2024-01-23"));
    }

    #[test]
    fn week_info_without_reference_uses_monday_week() {
        // 2024-03-17 is a Sunday.
        let info = week_info(day("2024-03-17"), None);
        assert_eq!(info.week_number, 1);
        assert_eq!(info.week_start, day("2024-03-11"));
        assert_eq!(info.week_end, day("2024-03-17"));

        let monday = week_info(day("2024-03-11"), None);
        assert_eq!(monday.week_start, day("2024-03-11"));
    }

    #[test]
    fn parses_timestamps_by_calendar_part() {
        assert_eq!(day("2024-01-05T23:59:59-05:00"), day("2024-01-05"));
        assert_eq!(day("2024-01-05T00:00:00Z"), day("2024-01-05"));
        assert_eq!(day(" 2024-03-15 "), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(day("2024-01-05 08:00"), day("2024-01-05"));
        assert_eq!(day("2024-01-05T08:30:15.250"), day("2024-01-05"));
    }

    #[test]
    fn rejects_timestamps_without_a_clock_time() {
        for input in ["2024-01-05Tgarbage", "2024-01-05T", "2024-01-05 8:00", "2024-01-05T25:00", "2024-01-05T12-30"] {
            assert!(parse_calendar_date(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn parsing_ignores_timezone_offsets() {
        let reference = Some(day("2024-01-01"));
        let plain = day("2024-03-15");
        for stamped in [
            "2024-03-15T23:59:59+14:00",
            "2024-03-15T00:00:00-12:00",
            "2024-03-15T12:00:00Z",
        ] {
            let parsed = day(stamped);
            assert_eq!(parsed, plain);
            assert_eq!(week_number(parsed, reference), week_number(plain, reference));
            assert_eq!(day_in_week(parsed, reference), day_in_week(plain, reference));
        }
    }

    #[test]
    fn rejects_malformed_dates() {
        for input in ["", "2024-1-05", "05/01/2024", "2024-02-30", "2024-01-05-01", "abcd-ef-gh"] {
            assert_eq!(
                parse_calendar_date(input),
                Err(WeekError::InvalidDateFormat {
                    input: input.to_string()
                })
            );
        }
    }

    #[test]
    fn first_date_is_order_independent() {
        let empty: Vec<NaiveDate> = Vec::new();
        assert_eq!(first_date(&empty), None);

        let mut dates = vec![day("2024-02-10"), day("2024-01-31"), day("2024-03-01")];
        assert_eq!(first_date(&dates), Some(day("2024-01-31")));
        dates.reverse();
        assert_eq!(first_date(&dates), Some(day("2024-01-31")));
        dates.rotate_left(1);
        assert_eq!(first_date(&dates), Some(day("2024-01-31")));
    }

    #[test]
    fn grouping_keeps_every_record_once() {
        let dates: Vec<NaiveDate> = (0..40)
            .map(|offset| day("2024-01-01") + Duration::days((offset * 3) % 50))
            .collect();
        let reference = first_date(&dates);

        let grouped = group_by_week(dates.clone(), reference);
        let total: usize = grouped.values().map(Vec::len).sum();
        assert_eq!(total, dates.len());

        for (week, members) in &grouped {
            for member in members {
                assert_eq!(week_number(*member, reference), *week);
            }
        }
    }

    #[test]
    fn grouping_empty_set_is_empty() {
        let grouped = group_by_week(Vec::<NaiveDate>::new(), None);
        assert!(grouped.is_empty());
    }

    #[test]
    fn buckets_are_newest_first() {
        let dates = vec![
            day("2024-01-02"),
            day("2024-01-09"),
            day("2024-01-01"),
            day("2024-01-12"),
        ];
        let reference = first_date(&dates);

        let buckets = weekly_buckets(&dates, reference);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].info.week_number, 2);
        assert_eq!(buckets[0].info.week_start, day("2024-01-08"));
        assert_eq!(
            buckets[0].records.iter().map(|d| d.date()).collect::<Vec<_>>(),
            vec![day("2024-01-12"), day("2024-01-09")]
        );
        assert_eq!(buckets[1].info.week_number, 1);
        assert_eq!(buckets[1].records[0].date(), day("2024-01-02"));
    }

    #[test]
    fn calendar_date_uses_fixed_offset() {
        let lima = FixedOffset::west_opt(5 * 3600).unwrap();
        let late_utc = Utc.with_ymd_and_hms(2024, 3, 16, 3, 30, 0).unwrap();
        assert_eq!(calendar_date_at(late_utc, lima), day("2024-03-15"));

        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(calendar_date_at(late_utc, utc), day("2024-03-16"));
    }
}
