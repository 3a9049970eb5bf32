//! Datetime search-option parsing.
//!
//! A datetime option is either a single instant/period or a closed
//! `start/end` range. Simple date strings expand to the whole period they
//! name: `2017` covers the year, `2017-06` the month, `2017-06-10` the day.
//! In a range, the start expands to the beginning of its period and the end
//! to the end of its period, so `2017/2018` covers both years.
//!
//! Open-ended intervals (`..` or a missing bound) are deliberately not
//! supported and fail with a clear error rather than being misapplied.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use stacq_result::{Error, Result};

use crate::options::DatetimeInput;

/// Resolve a datetime option into a closed `[start, end]` range of UTC
/// microseconds.
pub(crate) fn resolve(input: &DatetimeInput) -> Result<(i64, i64)> {
    match input {
        DatetimeInput::Instant(at) => {
            let micros = at.timestamp_micros();
            Ok((micros, micros))
        }
        DatetimeInput::Range(start, end) => {
            let range = (start.timestamp_micros(), end.timestamp_micros());
            check_order(range)
        }
        DatetimeInput::Text(text) => resolve_text(text),
    }
}

fn resolve_text(text: &str) -> Result<(i64, i64)> {
    let components: Vec<&str> = text.split('/').collect();
    match components.as_slice() {
        [single] => period_bounds(single),
        [start, end] => {
            if is_open(start) || is_open(end) {
                return Err(Error::UnsupportedOption(format!(
                    "open-ended datetime interval {text:?}; only single instants and \
                     closed ranges are supported"
                )));
            }
            let (start, _) = period_bounds(start)?;
            let (_, end) = period_bounds(end)?;
            check_order((start, end))
        }
        parts => Err(Error::InvalidArgumentError(format!(
            "too many datetime components (max=2, actual={}): {text:?}",
            parts.len()
        ))),
    }
}

fn is_open(component: &str) -> bool {
    component.is_empty() || component == ".."
}

fn check_order((start, end): (i64, i64)) -> Result<(i64, i64)> {
    if start > end {
        return Err(Error::InvalidArgumentError(
            "datetime range start is after its end".into(),
        ));
    }
    Ok((start, end))
}

/// The inclusive `[start, end]` bounds of one datetime component.
fn period_bounds(component: &str) -> Result<(i64, i64)> {
    // Full timestamps denote a single instant.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(component) {
        let micros = parsed.with_timezone(&Utc).timestamp_micros();
        return Ok((micros, micros));
    }
    // Timezone-unaware timestamps are assumed to be UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(component, "%Y-%m-%dT%H:%M:%S%.f") {
        let micros = naive.and_utc().timestamp_micros();
        return Ok((micros, micros));
    }

    if let Ok(date) = NaiveDate::parse_from_str(component, "%Y-%m-%d") {
        return Ok(day_bounds(date));
    }
    if let Some((year, month)) = parse_year_month(component) {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| invalid(component))?;
        let last = last_day_of_month(year, month).ok_or_else(|| invalid(component))?;
        return Ok((day_bounds(first).0, day_bounds(last).1));
    }
    if let Ok(year) = component.parse::<i32>() {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| invalid(component))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| invalid(component))?;
        return Ok((day_bounds(first).0, day_bounds(last).1));
    }

    Err(invalid(component))
}

fn invalid(component: &str) -> Error {
    Error::InvalidArgumentError(format!("invalid datetime component: {component:?}"))
}

fn parse_year_month(component: &str) -> Option<(i32, u32)> {
    let (year, month) = component.split_once('-')?;
    if month.contains('-') {
        return None;
    }
    Some((year.parse().ok()?, month.parse().ok()?))
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_micros())
        .unwrap_or(i64::MIN);
    let end = date
        .and_hms_micro_opt(23, 59, 59, 999_999)
        .map(|dt| dt.and_utc().timestamp_micros())
        .unwrap_or(i64::MAX);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micros(text: &str) -> i64 {
        DateTime::parse_from_rfc3339(text)
            .unwrap()
            .with_timezone(&Utc)
            .timestamp_micros()
    }

    #[test]
    fn year_expands_to_full_year() {
        let (start, end) = resolve_text("2022").unwrap();
        assert_eq!(start, micros("2022-01-01T00:00:00Z"));
        assert_eq!(end, micros("2022-12-31T23:59:59.999999Z"));
    }

    #[test]
    fn month_expands_to_full_month() {
        let (start, end) = resolve_text("2017-06").unwrap();
        assert_eq!(start, micros("2017-06-01T00:00:00Z"));
        assert_eq!(end, micros("2017-06-30T23:59:59.999999Z"));
    }

    #[test]
    fn range_takes_start_of_first_and_end_of_second() {
        let (start, end) = resolve_text("2017-06/2017-07").unwrap();
        assert_eq!(start, micros("2017-06-01T00:00:00Z"));
        assert_eq!(end, micros("2017-07-31T23:59:59.999999Z"));
    }

    #[test]
    fn full_timestamp_is_a_single_instant() {
        let (start, end) = resolve_text("2017-06-10T12:30:00Z").unwrap();
        assert_eq!(start, end);
        assert_eq!(start, micros("2017-06-10T12:30:00Z"));
    }

    #[test]
    fn open_intervals_are_rejected() {
        for text in ["../2022-03", "2022-03/..", "2022/"] {
            assert!(matches!(
                resolve_text(text),
                Err(Error::UnsupportedOption(_))
            ));
        }
    }

    #[test]
    fn too_many_components_is_invalid() {
        assert!(matches!(
            resolve_text("2020/2021/2022"),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn inverted_range_is_invalid() {
        assert!(matches!(
            resolve_text("2022/2020"),
            Err(Error::InvalidArgumentError(_))
        ));
    }
}
