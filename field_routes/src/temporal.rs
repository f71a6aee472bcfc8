//! Normalization of the free-form date and time fields.
//!
//! The uploads come from many tools and locales: `10-01-2024 09:30`,
//! `10/01/2024 9:30 AM`, `2024-01-10T09:30:00`, a date column next to a time
//! column... All of them are brought to the canonical `DD-MM-YYYY HH:MM:SS`
//! form, or to the `Invalid Time` marker when nothing matches.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::config::*;

// Two-digit years come first: `%Y` would happily read `24` as the year 24.
const DAY_FIRST_DATES: &[&str] = &[
    "%d-%m-%y", "%d/%m/%y", "%d.%m.%y", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%b-%y", "%d-%b-%Y",
    "%d %b %Y", "%d-%B-%Y", "%d %B %Y",
];

const MONTH_FIRST_DATES: &[&str] = &[
    "%m-%d-%y", "%m/%d/%y", "%m.%d.%y", "%m-%d-%Y", "%m/%d/%Y", "%m.%d.%Y", "%b %d %Y", "%b %d, %Y",
    "%B %d %Y", "%B %d, %Y",
];

const YEAR_FIRST_DATES: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

const TIMES: &[&str] = &[
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
    "%I:%M:%S%p",
    "%I:%M%p",
];

/// Parses dates and timestamps following a date convention.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TemporalNormalizer {
    date_patterns: Vec<String>,
    datetime_patterns: Vec<String>,
}

impl TemporalNormalizer {
    pub fn new(format: &DateFormat) -> TemporalNormalizer {
        let dates: Vec<String> = match format {
            DateFormat::DayFirst => [DAY_FIRST_DATES, YEAR_FIRST_DATES, MONTH_FIRST_DATES].concat(),
            DateFormat::MonthFirst => {
                [MONTH_FIRST_DATES, YEAR_FIRST_DATES, DAY_FIRST_DATES].concat()
            }
            DateFormat::YearFirst => [YEAR_FIRST_DATES, DAY_FIRST_DATES, MONTH_FIRST_DATES].concat(),
            DateFormat::Explicit(fmt) => vec![fmt.as_str()],
        }
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut datetime_patterns: Vec<String> = Vec::new();
        if let DateFormat::Explicit(fmt) = format {
            // The explicit format may already describe a full timestamp.
            datetime_patterns.push(fmt.clone());
        }
        for d in dates.iter() {
            for t in TIMES.iter() {
                datetime_patterns.push(format!("{} {}", d, t));
                datetime_patterns.push(format!("{}T{}", d, t));
            }
        }
        TemporalNormalizer {
            date_patterns: dates,
            datetime_patterns,
        }
    }

    /// Reads a calendar date. A full timestamp is accepted and its date
    /// part is returned.
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        self.date_patterns
            .iter()
            .find_map(|p| NaiveDate::parse_from_str(s, p).ok())
            .or_else(|| self.parse_datetime_only(s).map(|dt| dt.date()))
    }

    /// Reads a time of day. A full timestamp is accepted and its time part
    /// is returned.
    pub fn parse_time_of_day(&self, raw: &str) -> Option<NaiveTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        TIMES
            .iter()
            .find_map(|p| NaiveTime::parse_from_str(s, p).ok())
            .or_else(|| self.parse_datetime_only(s).map(|dt| dt.time()))
    }

    /// Reads a full timestamp. A value with only a date is read as midnight.
    pub fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        self.parse_datetime_only(s).or_else(|| {
            self.date_patterns
                .iter()
                .find_map(|p| NaiveDate::parse_from_str(s, p).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
    }

    fn parse_datetime_only(&self, s: &str) -> Option<NaiveDateTime> {
        self.datetime_patterns
            .iter()
            .find_map(|p| NaiveDateTime::parse_from_str(s, p).ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.naive_local())
            })
    }

    /// Normalizes a timestamp field.
    ///
    /// With a date column (`date_raw`), the date is read first and combined
    /// with the time of day found in `time_raw`. A blank time cannot be
    /// combined: the result is `Invalid Time`, even next to a good date. If
    /// the date cannot be read, `time_raw` must hold a full timestamp on its
    /// own. Without a date column, `time_raw` is read as a full timestamp.
    pub fn normalize(&self, time_raw: &str, date_raw: Option<&str>) -> Timestamp {
        let res = match date_raw.and_then(|d| self.parse_date(d)) {
            Some(date) => self.parse_time_of_day(time_raw).map(|t| date.and_time(t)),
            None => self.parse_timestamp(time_raw),
        };
        match res {
            Some(dt) => Timestamp::Valid(dt),
            None => {
                debug!(
                    "normalize: could not parse time {:?} with date {:?}",
                    time_raw, date_raw
                );
                Timestamp::Invalid
            }
        }
    }
}

impl Default for TemporalNormalizer {
    fn default() -> Self {
        TemporalNormalizer::new(&DateFormat::DayFirst)
    }
}
