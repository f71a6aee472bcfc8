/*!
Route reconstruction for field-force attendance data.

The input is a table of punch-in and outlet-visit events, as exported by
attendance tools: headers and formats vary from one export to the next. This
crate finds the meaning of the columns, normalizes the timestamps and
rebuilds the route of each employee with its markers and travelled distance.

The pipeline:
1. [ingest] resolves the column roles and normalizes every row into a
   [CanonicalDataset]. A missing mandatory column rejects the whole upload;
   a bad value only produces a [RowParseWarning].
2. [generate_routes] filters the records and builds a [RouteModel], ready to
   be drawn by a map renderer.

The [store::DatasetStore] keeps the datasets under opaque handles for
services that serve several requests.

See the [manual] for the details of each step.
*/

mod config;

pub mod builder;
pub mod columns;
pub mod filter;
pub mod geo;
pub mod manual;
pub mod routes;
pub mod store;
pub mod temporal;

use log::info;

pub use crate::columns::{ColumnResolver, ColumnRoleMap, ColumnRule};
pub use crate::config::*;
pub use crate::filter::RouteFilter;
pub use crate::geo::{haversine_km, GeoPoint};
pub use crate::store::{DatasetHandle, DatasetStore};

use crate::builder::DatasetBuilder;

/// Turns a table into a dataset.
///
/// Arguments:
/// * `table` the headers and rows of the upload
/// * `rules` the date convention and the maximum number of rows
/// * `resolver` the keywords used to find the column of each role
pub fn ingest(
    table: &TabularData,
    rules: &IngestRules,
    resolver: &ColumnResolver,
) -> Result<CanonicalDataset, RouteError> {
    info!(
        "Ingesting {} rows, headers: {:?}",
        table.rows.len(),
        table.headers
    );
    let mut builder = DatasetBuilder::new(rules)
        .resolver(resolver)
        .headers(&table.headers)?;
    for row in table.rows.iter() {
        builder.add_row(row.clone())?;
    }
    builder.build()
}

/// Builds the routes of the records selected by `filter`.
///
/// An empty selection is reported as [RouteOutcome::Empty]. When a single
/// employee is requested, the map view asks to fit its bounds.
pub fn generate_routes(
    dataset: &CanonicalDataset,
    filter: &RouteFilter,
    rules: &RenderRules,
) -> RouteOutcome {
    let selected = filter.apply(&dataset.records);
    if selected.is_empty() {
        info!("generate_routes: no record matches {:?}", filter);
        return RouteOutcome::Empty;
    }
    let model = routes::build_routes(&selected, rules, filter.employee.is_some());
    info!(
        "generate_routes: {} records, {} employees",
        selected.len(),
        model.routes.len()
    );
    RouteOutcome::Routes(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> TabularData {
        let headers: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        let rows = rows
            .iter()
            .map(|r| {
                let values: Vec<String> = r.iter().map(|s| s.to_string()).collect();
                RawRow::from_values(&headers, &values)
            })
            .collect();
        TabularData { headers, rows }
    }

    fn visits() -> TabularData {
        table(
            &[
                "Employee Name",
                "Punch In Date",
                "Punch In Time",
                "Punch In Latitude",
                "Punch In Longitude",
                "Visit Time",
                "Visit Latitude",
                "Visit Longitude",
                "Outlet Name",
                "Outlet ID",
            ],
            &[
                &["Asha", "10/01/2024", "11:00", "12.98", "77.60", "11:20", "12.981", "77.601", "Shop 2", "S2"],
                &["Asha", "10/01/2024", "09:00", "12.97", "77.59", "09:30", "12.971", "77.591", "Shop 1", "S1"],
                &["Ravi", "10/01/2024", "10:00", "13.02", "77.55", "", "", "", "Shop 3", "S3"],
                &["Asha", "11/01/2024", "09:00", "12.97", "77.59", "09:10", "12.971", "77.591", "Shop 1", "S1"],
                &["Ravi", "??", "??", "13.03", "77.56", "", "", "", "Shop 4", "S4"],
            ],
        )
    }

    #[test]
    fn end_to_end() {
        init();
        let ds = ingest(&visits(), &IngestRules::DEFAULT_RULES, &ColumnResolver::default()).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.employees(), vec!["Asha".to_string(), "Ravi".to_string()]);
        assert_eq!(ds.unique_dates().len(), 2);
        // Row 2 has no visit time. The unreadable punch date spoils both
        // timestamps of the last row.
        let roles: Vec<(usize, Role)> = ds.warnings.iter().map(|w| (w.row_index, w.role)).collect();
        assert_eq!(
            roles,
            vec![(2, Role::VisitTime), (4, Role::PunchTime), (4, Role::VisitTime)]
        );

        let model = match generate_routes(&ds, &RouteFilter::default(), &RenderRules::default()) {
            RouteOutcome::Routes(m) => m,
            RouteOutcome::Empty => panic!("no routes"),
        };
        let asha = model.route("Asha").unwrap();
        assert_eq!(asha.records[0].punch_timestamp.to_string(), "10-01-2024 09:00:00");
        assert_eq!(asha.segments.len(), 2);
        let d = haversine_km(GeoPoint::new(12.97, 77.59), GeoPoint::new(12.98, 77.60));
        assert!((asha.total_distance_km - 2.0 * d).abs() < 1e-9);

        let ravi = model.route("Ravi").unwrap();
        assert_eq!(ravi.dropped_records, 1);
        assert_eq!(ravi.markers.len(), 1);
        assert_eq!(ravi.color, DEFAULT_PALETTE[1]);
    }

    #[test]
    fn blank_punch_time_is_not_midnight() {
        init();
        let t = table(
            &["Employee Name", "Punch In Date", "Punch In Time", "Latitude", "Longitude", "Visit Time", "Outlet Name", "Outlet ID"],
            &[
                &["A", "10/01/2024", "09:00", "12.97", "77.59", "09:10", "Shop 1", "S1"],
                &["A", "10/01/2024", "", "12.98", "77.60", "", "Shop 2", "S2"],
            ],
        );
        let ds = ingest(&t, &IngestRules::DEFAULT_RULES, &ColumnResolver::default()).unwrap();
        assert_eq!(ds.records[1].punch_timestamp, Timestamp::Invalid);
        assert_eq!(ds.records[1].visit_timestamp, Some(Timestamp::Invalid));
        let roles: Vec<(usize, Role)> = ds.warnings.iter().map(|w| (w.row_index, w.role)).collect();
        assert_eq!(roles, vec![(1, Role::PunchTime), (1, Role::VisitTime)]);

        // Kept without date bounds, but left out of the route.
        let model = match generate_routes(&ds, &RouteFilter::default(), &RenderRules::default()) {
            RouteOutcome::Routes(m) => m,
            RouteOutcome::Empty => panic!("no routes"),
        };
        let a = model.route("A").unwrap();
        assert_eq!(a.dropped_records, 1);
        let times: Vec<String> = a.records.iter().map(|r| r.punch_timestamp.to_string()).collect();
        assert_eq!(times, vec!["10-01-2024 09:00:00".to_string()]);
        assert!(a.segments.is_empty());

        // Excluded by a date bound.
        let f = RouteFilter::parse(Some("2024-01-10"), Some("2024-01-10"), None).unwrap();
        let selected = f.apply(&ds.records);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].row_index, 0);
    }

    #[test]
    fn idempotent() {
        let ds = ingest(&visits(), &IngestRules::DEFAULT_RULES, &ColumnResolver::default()).unwrap();
        let f = RouteFilter::parse(Some("2024-01-10"), Some("2024-01-10"), None).unwrap();
        let r1 = generate_routes(&ds, &f, &RenderRules::default());
        let r2 = generate_routes(&ds, &f, &RenderRules::default());
        assert_eq!(r1, r2);
    }

    #[test]
    fn empty_selection() {
        let ds = ingest(&visits(), &IngestRules::DEFAULT_RULES, &ColumnResolver::default()).unwrap();
        let f = RouteFilter::parse(None, None, Some("Nobody")).unwrap();
        assert_eq!(
            generate_routes(&ds, &f, &RenderRules::default()),
            RouteOutcome::Empty
        );
    }

    #[test]
    fn rejected_upload() {
        let t = table(&["Name", "Time", "Lat", "Lon", "Outlet Name"], &[]);
        let err = ingest(&t, &IngestRules::DEFAULT_RULES, &ColumnResolver::default()).unwrap_err();
        assert!(err.to_string().starts_with("Missing required columns: OutletID."));
    }
}
