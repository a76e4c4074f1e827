//! Due-date parsing and display labels.
//!
//! All functions take `today` explicitly so labels are deterministic; callers
//! pass `today_local()` at render time.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Utc};

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Parses a stored or typed due date.
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its UTC calendar date).
/// Anything else yields `None`, which callers treat as "no due date".
pub fn parse_date_input(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_INPUT_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|stamp| stamp.with_timezone(&Utc).date_naive())
        })
}

/// Formats a date for a `<input type="date">`-style field.
pub fn format_date_input(date: NaiveDate) -> String {
    date.format(DATE_INPUT_FORMAT).to_string()
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// A due date strictly before today is overdue.
pub fn is_overdue(due: NaiveDate, today: NaiveDate) -> bool {
    due < today
}

/// Human label for a due date relative to `today`.
///
/// `Today`, `Tomorrow`, `Overdue • Jan 5` for past dates, the weekday name
/// inside the current Sunday-start week, `Jan 5` within the year, and
/// `Jan 5, 2023` otherwise.
pub fn due_label(due: Option<NaiveDate>, today: NaiveDate) -> Option<String> {
    let due = due?;

    if due == today {
        return Some("Today".to_string());
    }
    if today.checked_add_days(Days::new(1)) == Some(due) {
        return Some("Tomorrow".to_string());
    }
    if is_overdue(due, today) {
        return Some(format!("Overdue • {}", due.format("%b %-d")));
    }
    if week_start(due) == week_start(today) {
        return Some(due.format("%A").to_string());
    }
    if due.year() == today.year() {
        return Some(due.format("%b %-d").to_string());
    }
    Some(due.format("%b %-d, %Y").to_string())
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}
