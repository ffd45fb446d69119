//! Calendar windows for reporting counts, all computed in UTC.
//!
//! Both ends of every window are inclusive, so a month window also matches
//! the first instant of the following month.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::error::{Result, TicketError};
use crate::store::{DateField, DateWindow};

/// The 24 hours ending at `date`: `[date - 1 day, date]`.
#[must_use]
pub fn day(field: DateField, date: DateTime<Utc>) -> DateWindow {
    DateWindow::new(field, date - Duration::days(1), date)
}

/// Zero-based `month` of `year`: `[first of month, first of next month]`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `month > 11` or the year is out of range.
pub fn month(field: DateField, year: i32, month: u32) -> Result<DateWindow> {
    if month > 11 {
        return Err(TicketError::invalid(
            "month",
            format!("{month} is out of range (expected 0-11)"),
        ));
    }
    let start = first_of(year, month + 1)?;
    let end = if month == 11 {
        first_of(next_year(year)?, 1)?
    } else {
        first_of(year, month + 2)?
    };
    Ok(DateWindow::new(field, start, end))
}

/// Calendar `year` on creation date: `[Jan 1 year, Jan 1 year + 1]`.
///
/// # Errors
///
/// Returns `InvalidArgument` if either bound is not a representable date.
pub fn year(year: i32) -> Result<DateWindow> {
    Ok(DateWindow::new(
        DateField::Created,
        first_of(year, 1)?,
        first_of(next_year(year)?, 1)?,
    ))
}

/// The current UTC calendar year.
#[must_use]
pub fn current_year() -> i32 {
    Utc::now().year()
}

fn first_of(year: i32, month: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| TicketError::invalid("year", format!("{year} is not a representable year")))
}

fn next_year(year: i32) -> Result<i32> {
    year.checked_add(1)
        .ok_or_else(|| TicketError::invalid("year", format!("{year} is not a representable year")))
}
