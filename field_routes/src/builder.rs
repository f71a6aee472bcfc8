use log::{debug, info, warn};
use snafu::ensure;

use crate::columns::{ColumnResolver, ColumnRoleMap};
pub use crate::config::*;
use crate::temporal::TemporalNormalizer;

/// A builder for uploading rows.
///
/// The headers are given first: the column roles are resolved immediately
/// and the upload is rejected if a mandatory role is missing. The rows are
/// then added one by one, and normalized when the dataset is built.
///
/// ```
/// use field_routes::builder::DatasetBuilder;
/// use field_routes::IngestRules;
/// # use field_routes::RouteError;
///
/// let headers: Vec<String> = ["Employee Name", "Punch In Time", "Latitude", "Longitude", "Outlet Name", "Outlet ID"]
///     .iter().map(|s| s.to_string()).collect();
/// let mut builder = DatasetBuilder::new(&IngestRules::DEFAULT_RULES).headers(&headers)?;
///
/// builder.add_values(&["Asha".to_string(), "10-01-2024 09:00".to_string(),
///     "12.97".to_string(), "77.59".to_string(), "Shop 1".to_string(), "S1".to_string()])?;
///
/// let dataset = builder.build()?;
/// assert_eq!(dataset.records[0].punch_timestamp.to_string(), "10-01-2024 09:00:00");
/// # Ok::<(), RouteError>(())
/// ```
pub struct DatasetBuilder {
    pub(crate) _rules: IngestRules,
    pub(crate) _resolver: ColumnResolver,
    pub(crate) _headers: Option<Vec<String>>,
    pub(crate) _columns: ColumnRoleMap,
    pub(crate) _rows: Vec<RawRow>,
}

impl DatasetBuilder {
    pub fn new(rules: &IngestRules) -> DatasetBuilder {
        DatasetBuilder {
            _rules: rules.clone(),
            _resolver: ColumnResolver::default(),
            _headers: None,
            _columns: ColumnRoleMap::default(),
            _rows: Vec::new(),
        }
    }

    /// Replaces the default keyword table. Call it before `headers`.
    pub fn resolver(self, resolver: &ColumnResolver) -> DatasetBuilder {
        DatasetBuilder {
            _resolver: resolver.clone(),
            ..self
        }
    }

    /// Sets the headers of the upload and resolves the column roles.
    pub fn headers(self, headers: &[String]) -> Result<DatasetBuilder, RouteError> {
        let columns = self._resolver.resolve_mandatory(headers)?;
        info!("headers: resolved columns {:?}", columns);
        Ok(DatasetBuilder {
            _headers: Some(headers.to_vec()),
            _columns: columns,
            _rows: Vec::new(),
            ..self
        })
    }

    /// Adds a row. Fails when the maximum number of rows is exceeded.
    pub fn add_row(&mut self, row: RawRow) -> Result<(), RouteError> {
        if let Some(max_rows) = self._rules.max_rows {
            let rows = self._rows.len() + 1;
            ensure!(rows <= max_rows, InputTooLargeSnafu { rows, max_rows });
        }
        self._rows.push(row);
        Ok(())
    }

    /// Adds a row given as values, in the order of the headers.
    pub fn add_values(&mut self, values: &[String]) -> Result<(), RouteError> {
        let headers = self._headers.clone().unwrap_or_default();
        self.add_row(RawRow::from_values(&headers, values))
    }

    /// Resolves and normalizes all the rows.
    ///
    /// The only fatal condition is a missing mandatory column. Timestamps
    /// that cannot be parsed become `Invalid Time` and are reported in the
    /// warnings of the dataset. Coordinates that are not numbers are absent,
    /// without a warning.
    pub fn build(self) -> Result<CanonicalDataset, RouteError> {
        let headers = self._headers.unwrap_or_default();
        ensure!(
            self._columns.missing_mandatory().is_empty(),
            MissingColumnsSnafu {
                missing: self._columns.missing_mandatory(),
                detected: headers.clone(),
            }
        );

        let normalizer = TemporalNormalizer::new(&self._rules.date_format);
        let mut records: Vec<CanonicalRecord> = Vec::with_capacity(self._rows.len());
        let mut warnings: Vec<RowParseWarning> = Vec::new();
        for (idx, row) in self._rows.iter().enumerate() {
            let rec = canonical_record(idx, row, &self._columns, &normalizer, &mut warnings);
            debug!("build: row {}: {:?}", idx, rec);
            records.push(rec);
        }

        if !warnings.is_empty() {
            warn!(
                "build: {} values could not be parsed, first one: {}",
                warnings.len(),
                warnings[0]
            );
        }
        info!(
            "build: {} records, {} warnings",
            records.len(),
            warnings.len()
        );
        Ok(CanonicalDataset {
            headers,
            columns: self._columns,
            records,
            warnings,
        })
    }
}

fn canonical_record(
    row_index: usize,
    row: &RawRow,
    columns: &ColumnRoleMap,
    normalizer: &TemporalNormalizer,
    warnings: &mut Vec<RowParseWarning>,
) -> CanonicalRecord {
    let value = |role: Role| columns.get(role).and_then(|h| row.get(h));

    let mut timestamp = |time_role: Role, date_role: Role| -> Option<Timestamp> {
        columns.get(time_role)?;
        let raw_time = value(time_role).unwrap_or("");
        let raw_date = value(date_role);
        let ts = normalizer.normalize(raw_time, raw_date);
        if !ts.is_valid() {
            let shown = match raw_date {
                Some(d) if !d.trim().is_empty() => {
                    format!("{} {}", d.trim(), raw_time.trim()).trim_end().to_string()
                }
                _ => raw_time.to_string(),
            };
            warnings.push(RowParseWarning {
                row_index,
                role: time_role,
                value: shown,
            });
        }
        Some(ts)
    };

    let punch_timestamp = timestamp(Role::PunchTime, Role::PunchDate).unwrap_or(Timestamp::Invalid);
    let visit_timestamp = timestamp(Role::VisitTime, Role::VisitDate);

    CanonicalRecord {
        row_index,
        employee_name: value(Role::EmployeeName).unwrap_or("").trim().to_string(),
        punch_lat: value(Role::PunchLat).and_then(parse_coordinate),
        punch_lon: value(Role::PunchLon).and_then(parse_coordinate),
        visit_lat: value(Role::VisitLat).and_then(parse_coordinate),
        visit_lon: value(Role::VisitLon).and_then(parse_coordinate),
        punch_timestamp,
        visit_timestamp,
        outlet_name: value(Role::OutletName).and_then(non_blank),
        outlet_id: value(Role::OutletID).and_then(non_blank),
    }
}

/// A coordinate in degrees. Blank, non-numeric or non-finite values are
/// absent.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

fn non_blank(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(s.to_string())
    }
}
