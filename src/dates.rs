//! Date-range prefix expansion
//!
//! Turns a strftime-style pattern such as `logs/year=%Y/month=%m/day=%d/`
//! into the ordered list of concrete prefixes covering an inclusive date
//! range. Used to seed the prefix queue when a caller wants a date range
//! rather than a single root.

use std::fmt::Write;

use chrono::format::{Item, Numeric, StrftimeItems};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

/// Expand `pattern` over every day from `start` to `end`, inclusive
///
/// Patterns containing an hour specifier (`%H`, `%I`, `%k`, `%l`, or a
/// composite such as `%T`) are expanded hourly instead. Consecutive
/// duplicates are removed, so a monthly pattern over a 60-day range yields
/// two or three prefixes, in chronological order.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use prefix_retriever::dates::expand;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
/// let prefixes = expand("data/year=%Y/month=%m/", start, end).unwrap();
/// assert_eq!(prefixes, vec!["data/year=2024/month=01/", "data/year=2024/month=02/"]);
/// ```
pub fn expand(pattern: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
    if start > end {
        return Err(Error::InvalidPattern(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidPattern(format!(
            "unsupported format specifier in {pattern:?}"
        )));
    }

    let hourly = items
        .iter()
        .any(|item| matches!(item, Item::Numeric(Numeric::Hour | Numeric::Hour12, _)));
    let step = if hourly {
        Duration::hours(1)
    } else {
        Duration::days(1)
    };
    let at_hour = |day: NaiveDate, hour: u32| {
        day.and_hms_opt(hour, 0, 0)
            .ok_or_else(|| Error::InvalidPattern(format!("cannot represent {day} {hour:02}:00")))
    };
    let last = at_hour(end, if hourly { 23 } else { 0 })?;

    let mut prefixes: Vec<String> = Vec::new();
    let mut current: NaiveDateTime = at_hour(start, 0)?;
    while current <= last {
        let mut prefix = String::new();
        write!(prefix, "{}", current.format_with_items(items.iter())).map_err(|_| {
            Error::InvalidPattern(format!(
                "pattern {pattern:?} cannot be rendered for a naive date (time zone specifiers are not supported)"
            ))
        })?;
        if prefixes.last() != Some(&prefix) {
            prefixes.push(prefix);
        }
        current += step;
    }

    Ok(prefixes)
}

/// Parse an inclusive `YYYY-MM-DD..YYYY-MM-DD` range
pub fn parse_date_range(range: &str) -> Result<(NaiveDate, NaiveDate)> {
    let (start, end) = range.split_once("..").ok_or_else(|| {
        Error::InvalidPattern(format!(
            "date range {range:?} must look like YYYY-MM-DD..YYYY-MM-DD"
        ))
    })?;
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| Error::InvalidPattern(format!("invalid date {s:?}: {e}")))
    };
    Ok((parse(start)?, parse(end)?))
}
