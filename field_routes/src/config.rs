// ********* Input data structures ***********

use std::collections::HashSet;
use std::fmt::Display;

use chrono::{NaiveDate, NaiveDateTime};
use snafu::Snafu;

use crate::columns::ColumnRoleMap;
use crate::geo::GeoPoint;
use crate::store::DatasetHandle;

/// The semantic meaning of a column in the uploaded table.
///
/// Headers are arbitrary: the column resolver assigns a role to a header
/// based on keywords.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Role {
    PunchLat,
    PunchLon,
    VisitLat,
    VisitLon,
    PunchTime,
    VisitTime,
    PunchDate,
    VisitDate,
    EmployeeName,
    OutletName,
    OutletID,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::PunchLat,
        Role::PunchLon,
        Role::VisitLat,
        Role::VisitLon,
        Role::PunchTime,
        Role::VisitTime,
        Role::PunchDate,
        Role::VisitDate,
        Role::EmployeeName,
        Role::OutletName,
        Role::OutletID,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::PunchLat => "PunchLat",
            Role::PunchLon => "PunchLon",
            Role::VisitLat => "VisitLat",
            Role::VisitLon => "VisitLon",
            Role::PunchTime => "PunchTime",
            Role::VisitTime => "VisitTime",
            Role::PunchDate => "PunchDate",
            Role::VisitDate => "VisitDate",
            Role::EmployeeName => "EmployeeName",
            Role::OutletName => "OutletName",
            Role::OutletID => "OutletID",
        }
    }

    /// An upload is rejected when one of these roles cannot be resolved.
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, Role::VisitTime | Role::PunchDate | Role::VisitDate)
    }

    /// Case-insensitive lookup, ignoring underscores: `outlet_id`,
    /// `OutletID` and `outletid` all name the same role.
    pub fn from_name(name: &str) -> Option<Role> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_' && *c != ' ')
            .collect::<String>()
            .to_lowercase();
        Role::ALL
            .iter()
            .find(|r| r.name().to_lowercase() == key)
            .cloned()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One row of the uploaded table, as handed over by the tabular reader.
///
/// The fields keep the order of the header. The schema is unknown until
/// the column roles are resolved.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(fields: Vec<(String, String)>) -> RawRow {
        RawRow { fields }
    }

    /// Pairs the header with the values of a row. Missing trailing values
    /// are treated as empty cells.
    pub fn from_values(headers: &[String], values: &[String]) -> RawRow {
        let fields = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.clone(), values.get(idx).cloned().unwrap_or_default()))
            .collect();
        RawRow { fields }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// The full content of an upload: the detected headers and the rows.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Format of all the normalized timestamps.
pub const CANONICAL_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Placeholder for a timestamp that could not be understood.
pub const INVALID_TIME: &str = "Invalid Time";

/// Placeholder used in the textual summaries for a missing value.
pub const NOT_AVAILABLE: &str = "N/A";

/// A normalized timestamp.
///
/// It is never blank: either a valid instant or the explicit invalid marker,
/// which displays as `Invalid Time`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Timestamp {
    Valid(NaiveDateTime),
    Invalid,
}

impl Timestamp {
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::Valid(dt) => Some(*dt),
            Timestamp::Invalid => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.datetime().map(|dt| dt.date())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Timestamp::Valid(_))
    }

    /// Reads back a string in the canonical format. Anything else,
    /// including the invalid marker, is invalid.
    pub fn parse_canonical(s: &str) -> Timestamp {
        match NaiveDateTime::parse_from_str(s.trim(), CANONICAL_FORMAT) {
            Ok(dt) => Timestamp::Valid(dt),
            Err(_) => Timestamp::Invalid,
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timestamp::Valid(dt) => write!(f, "{}", dt.format(CANONICAL_FORMAT)),
            Timestamp::Invalid => write!(f, "{}", INVALID_TIME),
        }
    }
}

/// A row of the upload after column resolution and normalization.
#[derive(PartialEq, Debug, Clone)]
pub struct CanonicalRecord {
    /// Position of the source row in the upload (0 is the first data row).
    pub row_index: usize,
    pub employee_name: String,
    pub punch_lat: Option<f64>,
    pub punch_lon: Option<f64>,
    pub visit_lat: Option<f64>,
    pub visit_lon: Option<f64>,
    pub punch_timestamp: Timestamp,
    /// Absent when the upload has no visit time column.
    pub visit_timestamp: Option<Timestamp>,
    pub outlet_name: Option<String>,
    pub outlet_id: Option<String>,
}

impl CanonicalRecord {
    pub fn punch_point(&self) -> Option<GeoPoint> {
        match (self.punch_lat, self.punch_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    pub fn visit_point(&self) -> Option<GeoPoint> {
        match (self.visit_lat, self.visit_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

/// A value that could not be normalized. The row is kept, with the
/// `Invalid Time` marker in place of the value.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RowParseWarning {
    pub row_index: usize,
    pub role: Role,
    pub value: String,
}

impl Display for RowParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}: could not parse {} value {:?}, using {:?}",
            self.row_index, self.role, self.value, INVALID_TIME
        )
    }
}

/// The result of a successful upload.
///
/// It is immutable: a new upload creates a new dataset.
#[derive(PartialEq, Debug, Clone)]
pub struct CanonicalDataset {
    pub headers: Vec<String>,
    pub columns: ColumnRoleMap,
    pub records: Vec<CanonicalRecord>,
    pub warnings: Vec<RowParseWarning>,
}

impl CanonicalDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The employee names, in order of first appearance.
    pub fn employees(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.employee_name.as_str()))
            .map(|r| r.employee_name.clone())
            .collect()
    }

    /// The distinct calendar dates of the valid punch timestamps, sorted.
    pub fn unique_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .records
            .iter()
            .filter_map(|r| r.punch_timestamp.date())
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MarkerKind {
    Punch,
    Visit,
}

impl MarkerKind {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Punch => "punch",
            MarkerKind::Visit => "visit",
        }
    }

    /// The icon name understood by the renderer.
    pub fn icon(&self) -> &'static str {
        match self {
            MarkerKind::Punch => "user-clock",
            MarkerKind::Visit => "briefcase",
        }
    }

    pub fn icon_color(&self) -> &'static str {
        match self {
            MarkerKind::Punch => "blue",
            MarkerKind::Visit => "green",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: GeoPoint,
    /// The calendar date of the punch that produced this marker.
    pub date: NaiveDate,
    pub popup: String,
    pub tooltip: String,
}

/// One leg of a route, between two consecutive punch locations.
#[derive(PartialEq, Debug, Clone)]
pub struct Segment {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub distance_km: f64,
    pub color: String,
    pub weight: u32,
    pub opacity: f64,
    pub tooltip: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct EmployeeRoute {
    pub employee: String,
    pub color: String,
    /// The records of the route, in chronological order.
    pub records: Vec<CanonicalRecord>,
    pub markers: Vec<Marker>,
    pub segments: Vec<Segment>,
    pub total_distance_km: f64,
    /// Number of records left out because their punch time is invalid.
    pub dropped_records: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct LegendEntry {
    pub employee: String,
    pub color: String,
    pub total_distance_km: f64,
    pub label: String,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct MapView {
    pub center: GeoPoint,
    pub bounds: Option<Bounds>,
    /// The renderer should zoom on the bounds rather than use a default zoom.
    pub fit_bounds: bool,
}

/// Everything the renderer needs to draw the routes of a filtered dataset.
#[derive(PartialEq, Debug, Clone)]
pub struct RouteModel {
    /// One route per employee, in order of first appearance.
    pub routes: Vec<EmployeeRoute>,
    pub legend: Vec<LegendEntry>,
    pub view: MapView,
}

impl RouteModel {
    pub fn total_distances(&self) -> Vec<(String, f64)> {
        self.routes
            .iter()
            .map(|r| (r.employee.clone(), r.total_distance_km))
            .collect()
    }

    pub fn colors(&self) -> Vec<(String, String)> {
        self.routes
            .iter()
            .map(|r| (r.employee.clone(), r.color.clone()))
            .collect()
    }

    pub fn route(&self, employee: &str) -> Option<&EmployeeRoute> {
        self.routes.iter().find(|r| r.employee == employee)
    }
}

/// The outcome of a map request. An empty selection is not an error.
#[derive(PartialEq, Debug, Clone)]
pub enum RouteOutcome {
    Routes(RouteModel),
    Empty,
}

/// Errors that stop an upload or a map request.
///
/// Row-level problems are not errors: they are reported as
/// [RowParseWarning] on the dataset.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RouteError {
    #[snafu(display(
        "Missing required columns: {}. Please check your file headers. Detected: {:?}",
        role_list(missing),
        detected
    ))]
    MissingColumns {
        missing: Vec<Role>,
        detected: Vec<String>,
    },

    #[snafu(display("The upload has {rows} rows, more than the maximum of {max_rows}"))]
    InputTooLarge { rows: usize, max_rows: usize },

    #[snafu(display("Invalid {bound} date format {value:?}. Please use YYYY-MM-DD."))]
    DateFilterFormat {
        bound: String,
        value: String,
        source: chrono::ParseError,
    },

    #[snafu(display("No data uploaded for {handle}. Please upload a file first."))]
    UnknownDataset { handle: DatasetHandle },
}

fn role_list(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.name())
        .collect::<Vec<&str>>()
        .join(", ")
}

// ********* Configuration **********

/// How ambiguous dates are read.
///
/// The upstream collaborator should declare it: a value like `03-04-2024`
/// cannot be interpreted without a convention.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DateFormat {
    /// `03-04-2024` is the 3rd of April. Values that cannot be day first
    /// (`12/25/2024`) are read month first.
    DayFirst,
    /// `03-04-2024` is the 4th of March.
    MonthFirst,
    /// `2024-04-03`, then day first.
    YearFirst,
    /// A chrono format string for the date part, for example `%d.%m.%Y`.
    /// It may also describe a full timestamp.
    Explicit(String),
}

impl DateFormat {
    pub fn parse(s: &str) -> DateFormat {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "" | "day_first" | "dayfirst" => DateFormat::DayFirst,
            "month_first" | "monthfirst" => DateFormat::MonthFirst,
            "year_first" | "yearfirst" | "iso" => DateFormat::YearFirst,
            _ => DateFormat::Explicit(s.trim().to_string()),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IngestRules {
    pub date_format: DateFormat,
    /// Uploads with more rows are rejected. This bounds the cost of each
    /// map request.
    pub max_rows: Option<usize>,
}

impl IngestRules {
    pub const DEFAULT_RULES: IngestRules = IngestRules {
        date_format: DateFormat::DayFirst,
        max_rows: Some(500_000),
    };
}

/// The colours assigned to the employees, in order of first appearance.
pub const DEFAULT_PALETTE: [&str; 15] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#aec7e8", "#ffbb78", "#98df8a", "#ff9896", "#c5b0d5",
];

pub const MIN_PALETTE_SIZE: usize = 15;

/// Center of the map when there is no coordinate to look at.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: 20.5937,
    lon: 78.9629,
};

#[derive(PartialEq, Debug, Clone)]
pub struct RenderRules {
    pub palette: Vec<String>,
    pub line_weight: u32,
    pub line_opacity: f64,
}

impl Default for RenderRules {
    fn default() -> Self {
        RenderRules {
            palette: DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect(),
            line_weight: 4,
            line_opacity: 0.7,
        }
    }
}
