use chrono::NaiveDate;
use log::debug;
use snafu::ResultExt;

use crate::config::*;

/// The format of the date bounds of a map request.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Selection of the records to draw.
///
/// Both date bounds are inclusive and apply to the calendar date of the
/// punch timestamp. A missing bound leaves that side open.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RouteFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Exact match on the employee name.
    pub employee: Option<String>,
}

impl RouteFilter {
    /// Builds a filter from the raw request parameters. Empty strings count
    /// as not provided.
    pub fn parse(
        start_date: Option<&str>,
        end_date: Option<&str>,
        employee: Option<&str>,
    ) -> Result<RouteFilter, RouteError> {
        Ok(RouteFilter {
            start_date: parse_bound("start", start_date)?,
            end_date: parse_bound("end", end_date)?,
            employee: employee.filter(|e| !e.is_empty()).map(|e| e.to_string()),
        })
    }

    pub fn has_date_bounds(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if let Some(emp) = &self.employee {
            if record.employee_name != *emp {
                return false;
            }
        }
        if !self.has_date_bounds() {
            return true;
        }
        match record.punch_timestamp.date() {
            // Without a valid punch time, there is no way to tell.
            None => false,
            Some(d) => {
                self.start_date.map_or(true, |start| d >= start)
                    && self.end_date.map_or(true, |end| d <= end)
            }
        }
    }

    pub fn apply<'a>(&self, records: &'a [CanonicalRecord]) -> Vec<&'a CanonicalRecord> {
        let res: Vec<&CanonicalRecord> = records.iter().filter(|r| self.matches(r)).collect();
        debug!(
            "apply: {:?} kept {} records out of {}",
            self,
            res.len(),
            records.len()
        );
        res
    }
}

fn parse_bound(bound: &str, value: Option<&str>) -> Result<Option<NaiveDate>, RouteError> {
    match value.map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, ISO_DATE_FORMAT)
            .map(Some)
            .context(DateFilterFormatSnafu { bound, value: s }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn record(name: &str, ts: &str) -> CanonicalRecord {
        CanonicalRecord {
            row_index: 0,
            employee_name: name.to_string(),
            punch_lat: Some(12.97),
            punch_lon: Some(77.59),
            visit_lat: None,
            visit_lon: None,
            punch_timestamp: match NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
                Ok(dt) => Timestamp::Valid(dt),
                Err(_) => Timestamp::Invalid,
            },
            visit_timestamp: None,
            outlet_name: None,
            outlet_id: None,
        }
    }

    fn records() -> Vec<CanonicalRecord> {
        vec![
            record("A", "2024-01-09 23:59:59"),
            record("A", "2024-01-10 00:00:00"),
            record("B", "2024-01-10 18:30:00"),
            record("A", "2024-01-11 00:00:00"),
            record("B", "garbage"),
        ]
    }

    #[test]
    fn single_day() {
        let recs = records();
        let f = RouteFilter::parse(Some("2024-01-10"), Some("2024-01-10"), None).unwrap();
        let res = f.apply(&recs);
        assert_eq!(res.len(), 2);
        for r in res {
            assert_eq!(r.punch_timestamp.date(), NaiveDate::from_ymd_opt(2024, 1, 10));
        }
    }

    #[test]
    fn open_bounds() {
        let recs = records();
        let f = RouteFilter::parse(Some("2024-01-10"), None, None).unwrap();
        assert_eq!(f.apply(&recs).len(), 3);
        let f = RouteFilter::parse(None, Some("2024-01-10"), Some("")).unwrap();
        assert_eq!(f.apply(&recs).len(), 3);
    }

    #[test]
    fn invalid_times_only_without_date_bounds() {
        let recs = records();
        let f = RouteFilter::parse(None, None, Some("B")).unwrap();
        assert_eq!(f.apply(&recs).len(), 2);
        let f = RouteFilter::parse(Some("2000-01-01"), None, Some("B")).unwrap();
        assert_eq!(f.apply(&recs).len(), 1);
    }

    #[test]
    fn empty_result_is_fine() {
        let recs = records();
        let f = RouteFilter::parse(None, None, Some("Nobody")).unwrap();
        assert!(f.apply(&recs).is_empty());
        let f = RouteFilter::parse(Some("2024-02-01"), Some("2024-01-01"), None).unwrap();
        assert!(f.apply(&recs).is_empty());
    }

    #[test]
    fn malformed_bound() {
        let err = RouteFilter::parse(Some("10-01-2024"), None, None).unwrap_err();
        assert!(matches!(&err, RouteError::DateFilterFormat { bound, .. } if bound == "start"));
        assert!(err.to_string().contains("YYYY-MM-DD"));
        let err = RouteFilter::parse(None, Some("2024-13-01"), None).unwrap_err();
        assert!(matches!(&err, RouteError::DateFilterFormat { bound, value, .. }
            if bound == "end" && value == "2024-13-01"));
    }
}
