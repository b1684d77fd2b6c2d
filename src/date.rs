use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Earliest year a transaction may be dated in.
const MIN_YEAR: i64 = 1901;

/// Day offsets beyond this can't come from a real date and would overflow
/// `chrono::Duration`.
const MAX_ROLL_OVER_DAYS: i64 = 1_000_000;

/// How out-of-range date components are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum DatePolicy {
    /// Any range violation rejects the record.
    #[default]
    Strict,
    /// Range violations are reported as warnings and the date is built by
    /// rolling the raw numbers over the calendar (31/4 becomes 1/5).
    Lenient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RangeViolation {
    Day,
    Month,
    Year,
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DateError {
    #[error("the date is incorrectly formed (not of the form #/#/#)")]
    Malformed,
    #[error("not all values are numbers")]
    NonNumeric,
    #[error("{} number is not in the correct range", describe(.0))]
    OutOfRange(Vec<RangeViolation>),
}

fn describe(violations: &[RangeViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// A successfully validated date. `warnings` is only ever non-empty under
/// [`DatePolicy::Lenient`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ValidatedDate {
    pub date: NaiveDate,
    pub warnings: Vec<RangeViolation>,
}

/// Validates a `d/m/yyyy` token against the reference date `today`.
pub(crate) fn validate(
    token: &str,
    today: NaiveDate,
    policy: DatePolicy,
) -> Result<ValidatedDate, DateError> {
    let parts: Vec<&str> = token.trim().split('/').collect();
    if parts.len() != 3 {
        return Err(DateError::Malformed);
    }

    let mut numbers = [0i64; 3];
    for (number, part) in numbers.iter_mut().zip(&parts) {
        *number = part.trim().parse().map_err(|_| DateError::NonNumeric)?;
    }
    let [day, month, year] = numbers;

    let violations = range_violations(day, month, year, today);
    if violations.is_empty() {
        return ymd(day, month, year)
            .map(|date| ValidatedDate {
                date,
                warnings: Vec::new(),
            })
            .ok_or(DateError::OutOfRange(vec![RangeViolation::Day]));
    }

    match policy {
        DatePolicy::Strict => Err(DateError::OutOfRange(violations)),
        DatePolicy::Lenient => match roll_over(day, month, year) {
            Some(date) => Ok(ValidatedDate {
                date,
                warnings: violations,
            }),
            None => Err(DateError::OutOfRange(violations)),
        },
    }
}

/// Validates a date from a structured record. Accepts RFC 3339 timestamps,
/// ISO dates with or without a time part, and the `d/m/yyyy` form. The time of
/// day is discarded.
pub(crate) fn validate_calendar(
    token: &str,
    today: NaiveDate,
    policy: DatePolicy,
) -> Result<ValidatedDate, DateError> {
    let token = token.trim();
    if token.contains('/') {
        return validate(token, today, policy);
    }

    let date = DateTime::parse_from_rfc3339(token)
        .map(|dt| dt.naive_local().date())
        .or_else(|_| NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(token, "%Y-%m-%d"))
        .map_err(|_| DateError::Malformed)?;

    let violations = range_violations(
        date.day().into(),
        date.month().into(),
        date.year().into(),
        today,
    );
    match (violations.is_empty(), policy) {
        (true, _) | (false, DatePolicy::Lenient) => Ok(ValidatedDate {
            date,
            warnings: violations,
        }),
        (false, DatePolicy::Strict) => Err(DateError::OutOfRange(violations)),
    }
}

fn range_violations(day: i64, month: i64, year: i64, today: NaiveDate) -> Vec<RangeViolation> {
    let current_year = i64::from(today.year());
    let current_month = i64::from(today.month());
    let in_current_year = year == current_year;
    let in_current_month = in_current_year && month == current_month;

    let mut violations = Vec::new();
    if day < 1
        || day > days_in_month(month, year)
        || (in_current_month && day > i64::from(today.day()))
    {
        violations.push(RangeViolation::Day);
    }
    if !(1..=12).contains(&month) || (in_current_year && month > current_month) {
        violations.push(RangeViolation::Month);
    }
    if !(MIN_YEAR..=current_year).contains(&year) {
        violations.push(RangeViolation::Year);
    }
    violations
}

fn days_in_month(month: i64, year: i64) -> i64 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn ymd(day: i64, month: i64, year: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Builds a date from raw numbers the way a calendar with overflow does:
/// month 13 is January of the next year, day 0 is the last day of the
/// previous month.
fn roll_over(day: i64, month: i64, year: i64) -> Option<NaiveDate> {
    if day.abs() > MAX_ROLL_OVER_DAYS {
        return None;
    }
    let months = year.checked_mul(12)?.checked_add(month.checked_sub(1)?)?;
    let first = NaiveDate::from_ymd_opt(
        i32::try_from(months.div_euclid(12)).ok()?,
        u32::try_from(months.rem_euclid(12) + 1).ok()?,
        1,
    )?;
    first.checked_add_signed(Duration::days(day - 1))
}
