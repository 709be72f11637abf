//! Calendar helpers for parsing bank statement dates and grouping transactions.

use time::{Date, Duration, Month, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

const DD_MM_YYYY: &[BorrowedFormatItem<'_>] = format_description!("[day]-[month]-[year]");
const DISPLAY_DATE: &[BorrowedFormatItem<'_>] = format_description!("[day]/[month]/[year]");

/// Parse a date in the `DD-MM-YYYY` format used by ING statements, e.g. `01-01-2023`.
///
/// # Errors
/// Returns [Error::InvalidDate] if `text` is not a real calendar date in that format.
pub fn parse_dd_mm_yyyy(text: &str) -> Result<Date, Error> {
    Date::parse(text.trim(), DD_MM_YYYY).map_err(|error| {
        tracing::debug!("could not parse \"{text}\" as DD-MM-YYYY: {error}");
        Error::InvalidDate(text.to_owned())
    })
}

/// The Monday on or before `date`.
pub fn week_start(date: Date) -> Date {
    let days_since_monday = date.weekday().number_days_from_monday();

    date - Duration::days(days_since_monday.into())
}

/// The month of `date` as `YYYYMM`, e.g. `202501`.
pub fn month_index(date: Date) -> String {
    format!("{:04}{:02}", date.year(), u8::from(date.month()))
}

/// Parse a `YYYYMM` month index into the first day of that month.
///
/// # Errors
/// Returns [Error::InvalidDate] if `text` is not six digits naming a real month.
pub fn parse_month_index(text: &str) -> Result<Date, Error> {
    let invalid = || Error::InvalidDate(text.to_owned());

    if text.len() != 6 || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = text[..4].parse().map_err(|_| invalid())?;
    let month: u8 = text[4..].parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;

    Date::from_calendar_date(year, month, 1).map_err(|_| invalid())
}

/// The month of `date` as `MMM-YYYY`, e.g. `Jan-2025`.
pub fn year_month_label(date: Date) -> String {
    let month = match date.month() {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    };

    format!("{month}-{}", date.year())
}

/// Format `date` as `DD/MM/YYYY` for tables.
pub fn format_display_date(date: Date) -> String {
    date.format(DISPLAY_DATE)
        .unwrap_or_else(|_| date.to_string())
}

/// The first day of the month containing `date`.
pub fn month_start(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// The last day of the month containing `date`.
pub fn month_end(date: Date) -> Date {
    let start = month_start(date);
    let days = start.month().length(start.year());

    start.replace_day(days).unwrap_or(start)
}
