//! Reconstruction of the routes of each employee.
//!
//! Routing goes from punch to punch: the legs of a route join the punch
//! locations of consecutive records. Visit locations are shown as markers
//! but do not take part in the distance.
//!
//! Records with an invalid punch time cannot be placed in time and are left
//! out of the routes entirely (no marker, no leg).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::{debug, info};

use crate::config::*;
use crate::geo::{haversine_km, GeoPoint};

// Coordinates are compared bit for bit: the same text always parses to the
// same float.
type PunchKey = (u64, u64, NaiveDate);
type VisitKey = (u64, u64, NaiveDate, String);

fn coord_bits(p: GeoPoint) -> (u64, u64) {
    // -0.0 and 0.0 are the same place.
    ((p.lat + 0.0).to_bits(), (p.lon + 0.0).to_bits())
}

fn fmt_coord(x: Option<f64>) -> String {
    match x {
        Some(v) => format!("{:.4}", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn fmt_opt(x: &Option<String>) -> &str {
    x.as_deref().unwrap_or(NOT_AVAILABLE)
}

fn visit_time_display(rec: &CanonicalRecord) -> String {
    match rec.visit_timestamp {
        Some(ts) => ts.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn punch_marker(rec: &CanonicalRecord, position: GeoPoint, date: NaiveDate) -> Marker {
    let ts = rec.punch_timestamp.to_string();
    Marker {
        kind: MarkerKind::Punch,
        position,
        date,
        popup: format!(
            "Employee: {}\nPunch In Time: {}\nLatitude: {}\nLongitude: {}",
            rec.employee_name,
            ts,
            fmt_coord(rec.punch_lat),
            fmt_coord(rec.punch_lon)
        ),
        tooltip: format!("Name: {} | Punch In: {}", rec.employee_name, ts),
    }
}

fn visit_marker(rec: &CanonicalRecord, position: GeoPoint, date: NaiveDate) -> Marker {
    let vt = visit_time_display(rec);
    let outlet = fmt_opt(&rec.outlet_name);
    Marker {
        kind: MarkerKind::Visit,
        position,
        date,
        popup: format!(
            "Employee: {}\nOutlet: {} (ID: {})\nVisit Time: {}\nLatitude: {}\nLongitude: {}",
            rec.employee_name,
            outlet,
            fmt_opt(&rec.outlet_id),
            vt,
            fmt_coord(rec.visit_lat),
            fmt_coord(rec.visit_lon)
        ),
        tooltip: format!("Outlet: {} | Visit: {}", outlet, vt),
    }
}

/// Builds the route of a single employee from its records.
pub fn build_employee_route(
    employee: &str,
    color: &str,
    records: &[&CanonicalRecord],
    rules: &RenderRules,
) -> EmployeeRoute {
    let mut ordered: Vec<&CanonicalRecord> = records
        .iter()
        .filter(|r| r.punch_timestamp.is_valid())
        .cloned()
        .collect();
    let dropped_records = records.len() - ordered.len();
    if dropped_records > 0 {
        debug!(
            "build_employee_route: {}: dropping {} records with an invalid punch time",
            employee, dropped_records
        );
    }
    // Stable: records at the same instant keep the upload order.
    ordered.sort_by_key(|r| r.punch_timestamp);

    let mut punch_keys: HashSet<PunchKey> = HashSet::new();
    let mut visit_keys: HashSet<VisitKey> = HashSet::new();
    let mut markers: Vec<Marker> = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut total_distance_km = 0.0;
    let mut prev: Option<&CanonicalRecord> = None;

    for rec in ordered.iter() {
        // Only valid timestamps are left at this point.
        let date = match rec.punch_timestamp.date() {
            Some(d) => d,
            None => continue,
        };

        if let Some(p) = rec.punch_point() {
            let (lat, lon) = coord_bits(p);
            if punch_keys.insert((lat, lon, date)) {
                markers.push(punch_marker(rec, p, date));
            }
        }
        if let Some(p) = rec.visit_point() {
            let (lat, lon) = coord_bits(p);
            let outlet = fmt_opt(&rec.outlet_name).to_string();
            if visit_keys.insert((lat, lon, date, outlet)) {
                markers.push(visit_marker(rec, p, date));
            }
        }

        if let Some(prev_rec) = prev {
            match (prev_rec.punch_point(), rec.punch_point()) {
                (Some(from), Some(to)) => {
                    let distance_km = haversine_km(from, to);
                    total_distance_km += distance_km;
                    segments.push(Segment {
                        from,
                        to,
                        distance_km,
                        color: color.to_string(),
                        weight: rules.line_weight,
                        opacity: rules.line_opacity,
                        tooltip: format!("{:.2} km", distance_km),
                    });
                }
                (from, to) => {
                    debug!(
                        "build_employee_route: {}: skipping leg from {} to {} (missing coordinates)",
                        employee,
                        from.map_or(NOT_AVAILABLE.to_string(), |p| p.to_string()),
                        to.map_or(NOT_AVAILABLE.to_string(), |p| p.to_string())
                    );
                }
            }
        }
        prev = Some(rec);
    }

    EmployeeRoute {
        employee: employee.to_string(),
        color: color.to_string(),
        records: ordered.into_iter().cloned().collect(),
        markers,
        segments,
        total_distance_km,
        dropped_records,
    }
}

/// The employees of the selection, in order of first appearance, with
/// their colours.
pub fn assign_colors(records: &[&CanonicalRecord], palette: &[String]) -> Vec<(String, String)> {
    let names: Vec<&str> = group_by_employee(records)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    colors_for(&names, palette)
}

fn colors_for(names: &[&str], palette: &[String]) -> Vec<(String, String)> {
    let default_palette: Vec<String> = DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect();
    let palette = if palette.is_empty() {
        &default_palette
    } else {
        palette
    };
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.to_string(), palette[idx % palette.len()].clone()))
        .collect()
}

/// Splits the selection by employee in a single pass. The groups come in
/// order of first appearance and keep the order of the records.
pub fn group_by_employee<'a>(
    records: &[&'a CanonicalRecord],
) -> Vec<(&'a str, Vec<&'a CanonicalRecord>)> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a CanonicalRecord>)> = Vec::new();
    for &r in records.iter() {
        let name = r.employee_name.as_str();
        let idx = *index.entry(name).or_insert_with(|| {
            groups.push((name, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(r);
    }
    groups
}

fn map_view(routes: &[EmployeeRoute], fit_bounds: bool) -> MapView {
    let points: Vec<GeoPoint> = routes
        .iter()
        .flat_map(|r| r.records.iter())
        .filter_map(|r| r.punch_point())
        .collect();
    if points.is_empty() {
        return MapView {
            center: DEFAULT_CENTER,
            bounds: None,
            fit_bounds: false,
        };
    }
    let n = points.len() as f64;
    let center = GeoPoint::new(
        points.iter().map(|p| p.lat).sum::<f64>() / n,
        points.iter().map(|p| p.lon).sum::<f64>() / n,
    );
    let south_west = GeoPoint::new(
        points.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min),
        points.iter().map(|p| p.lon).fold(f64::INFINITY, f64::min),
    );
    let north_east = GeoPoint::new(
        points.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max),
        points.iter().map(|p| p.lon).fold(f64::NEG_INFINITY, f64::max),
    );
    MapView {
        center,
        bounds: Some(Bounds {
            south_west,
            north_east,
        }),
        fit_bounds,
    }
}

/// Builds the routes of all the employees present in the selection.
///
/// `fit_bounds` asks the renderer to zoom on the data, which is useful when
/// a single employee is shown.
pub fn build_routes(
    records: &[&CanonicalRecord],
    rules: &RenderRules,
    fit_bounds: bool,
) -> RouteModel {
    let groups = group_by_employee(records);
    let names: Vec<&str> = groups.iter().map(|(name, _)| *name).collect();
    let colors = colors_for(&names, &rules.palette);
    let mut routes: Vec<EmployeeRoute> = Vec::with_capacity(groups.len());
    for ((employee, emp_records), (_, color)) in groups.iter().zip(colors.iter()) {
        let route = build_employee_route(employee, color, emp_records, rules);
        info!(
            "build_routes: {}: {} records, {} markers, {} legs, {:.2} km",
            employee,
            route.records.len(),
            route.markers.len(),
            route.segments.len(),
            route.total_distance_km
        );
        routes.push(route);
    }

    let legend: Vec<LegendEntry> = routes
        .iter()
        .map(|r| LegendEntry {
            employee: r.employee.clone(),
            color: r.color.clone(),
            total_distance_km: r.total_distance_km,
            label: format!("{} (Dist: {:.2} km)", r.employee, r.total_distance_km),
        })
        .collect();

    let view = map_view(&routes, fit_bounds);
    RouteModel {
        routes,
        legend,
        view,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> Timestamp {
        match NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            Ok(dt) => Timestamp::Valid(dt),
            Err(_) => Timestamp::Invalid,
        }
    }

    fn rec(name: &str, time: &str, punch: (f64, f64), visit: (f64, f64), outlet: &str) -> CanonicalRecord {
        CanonicalRecord {
            row_index: 0,
            employee_name: name.to_string(),
            punch_lat: Some(punch.0),
            punch_lon: Some(punch.1),
            visit_lat: Some(visit.0),
            visit_lon: Some(visit.1),
            punch_timestamp: ts(time),
            visit_timestamp: Some(ts(time)),
            outlet_name: Some(outlet.to_string()),
            outlet_id: Some("ID".to_string()),
        }
    }

    fn build(recs: &[CanonicalRecord]) -> RouteModel {
        let refs: Vec<&CanonicalRecord> = recs.iter().collect();
        build_routes(&refs, &RenderRules::default(), false)
    }

    fn count(route: &EmployeeRoute, kind: MarkerKind) -> usize {
        route.markers.iter().filter(|m| m.kind == kind).count()
    }

    #[test]
    fn two_punches_one_leg() {
        let a = (12.97, 77.59);
        let b = (12.98, 77.60);
        let recs = vec![
            rec("A", "2024-01-10 09:00:00", a, a, "O1"),
            rec("A", "2024-01-10 11:00:00", b, b, "O2"),
        ];
        let model = build(&recs);
        let route = model.route("A").unwrap();
        let expected = haversine_km(GeoPoint::new(a.0, a.1), GeoPoint::new(b.0, b.1));
        assert_eq!(route.segments.len(), 1);
        assert_eq!(route.total_distance_km, expected);
        assert_eq!(route.segments[0].distance_km, expected);
        assert_eq!(model.total_distances(), vec![("A".to_string(), expected)]);
    }

    #[test]
    fn exact_duplicates() {
        let a = (12.97, 77.59);
        let v = (12.971, 77.591);
        let r = rec("A", "2024-01-10 09:00:00", a, v, "O1");
        let model = build(&[r.clone(), r]);
        let route = model.route("A").unwrap();
        assert_eq!(count(route, MarkerKind::Punch), 1);
        assert_eq!(count(route, MarkerKind::Visit), 1);
        assert_eq!(route.total_distance_km, 0.0);
        // Both records still take part in the route.
        assert_eq!(route.records.len(), 2);
    }

    #[test]
    fn same_place_same_day_one_marker() {
        let a = (12.97, 77.59);
        let recs = vec![
            rec("A", "2024-01-10 09:00:00", a, (1.0, 1.0), "O1"),
            rec("A", "2024-01-10 12:00:00", a, (2.0, 2.0), "O2"),
            // Another day: a new marker.
            rec("A", "2024-01-11 09:00:00", a, (2.0, 2.0), "O2"),
        ];
        let model = build(&recs);
        let route = model.route("A").unwrap();
        assert_eq!(count(route, MarkerKind::Punch), 2);
        assert_eq!(count(route, MarkerKind::Visit), 3);
        assert_eq!(route.segments.len(), 2);
        assert_eq!(route.total_distance_km, 0.0);
    }

    #[test]
    fn visit_key_includes_outlet() {
        let a = (12.97, 77.59);
        let recs = vec![
            rec("A", "2024-01-10 09:00:00", a, a, "O1"),
            rec("A", "2024-01-10 10:00:00", a, a, "O2"),
        ];
        let route = build(&recs).routes.remove(0);
        assert_eq!(count(&route, MarkerKind::Punch), 1);
        assert_eq!(count(&route, MarkerKind::Visit), 2);
    }

    #[test]
    fn chronological_order_and_invalid_times() {
        let recs = vec![
            rec("A", "2024-01-10 12:00:00", (3.0, 3.0), (3.0, 3.0), "O3"),
            rec("A", "garbage", (9.0, 9.0), (9.0, 9.0), "O9"),
            rec("A", "2024-01-10 08:00:00", (1.0, 1.0), (1.0, 1.0), "O1"),
            rec("A", "2024-01-10 10:00:00", (2.0, 2.0), (2.0, 2.0), "O2"),
        ];
        let model = build(&recs);
        let route = model.route("A").unwrap();
        assert_eq!(route.dropped_records, 1);
        let lats: Vec<Option<f64>> = route.records.iter().map(|r| r.punch_lat).collect();
        assert_eq!(lats, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(route.segments.len(), 2);
        assert_eq!(route.segments[0].from, GeoPoint::new(1.0, 1.0));
        assert_eq!(route.segments[1].to, GeoPoint::new(3.0, 3.0));
        let expected = haversine_km(GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0))
            + haversine_km(GeoPoint::new(2.0, 2.0), GeoPoint::new(3.0, 3.0));
        assert!((route.total_distance_km - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_coordinates_skip_the_leg() {
        let mut middle = rec("A", "2024-01-10 10:00:00", (2.0, 2.0), (2.0, 2.0), "O2");
        middle.punch_lon = None;
        let recs = vec![
            rec("A", "2024-01-10 08:00:00", (1.0, 1.0), (1.0, 1.0), "O1"),
            middle,
            rec("A", "2024-01-10 12:00:00", (3.0, 3.0), (3.0, 3.0), "O3"),
        ];
        let model = build(&recs);
        let route = model.route("A").unwrap();
        assert_eq!(route.segments.len(), 0);
        assert_eq!(route.total_distance_km, 0.0);
        assert_eq!(count(route, MarkerKind::Punch), 2);
        // The visit of the middle record is still shown.
        assert_eq!(count(route, MarkerKind::Visit), 3);
        assert_eq!(route.records[1].punch_lon, None);
    }

    #[test]
    fn single_record() {
        let recs = vec![rec("A", "2024-01-10 08:00:00", (1.0, 1.0), (1.5, 1.5), "O1")];
        let model = build(&recs);
        let route = model.route("A").unwrap();
        assert!(route.segments.is_empty());
        assert_eq!(route.markers.len(), 2);
        assert_eq!(route.total_distance_km, 0.0);
    }

    #[test]
    fn colors_by_first_appearance() {
        let mut recs: Vec<CanonicalRecord> = Vec::new();
        for i in 0..17 {
            recs.push(rec(&format!("E{}", i), "2024-01-10 08:00:00", (1.0, 1.0), (1.0, 1.0), "O"));
        }
        // E3 again: no new colour.
        recs.push(rec("E3", "2024-01-10 09:00:00", (1.0, 1.0), (1.0, 1.0), "O"));
        let model = build(&recs);
        let colors = model.colors();
        assert_eq!(colors.len(), 17);
        assert_eq!(colors[0], ("E0".to_string(), DEFAULT_PALETTE[0].to_string()));
        assert_eq!(colors[14].1, DEFAULT_PALETTE[14]);
        assert_eq!(colors[15].1, DEFAULT_PALETTE[0]);
        assert_eq!(colors[16].1, DEFAULT_PALETTE[1]);
        assert_eq!(model, build(&recs));
    }

    #[test]
    fn groups_keep_first_appearance() {
        let recs = vec![
            rec("B", "2024-01-10 08:00:00", (1.0, 1.0), (1.0, 1.0), "O"),
            rec("A", "2024-01-10 09:00:00", (2.0, 2.0), (2.0, 2.0), "O"),
            rec("B", "2024-01-10 07:00:00", (3.0, 3.0), (3.0, 3.0), "O"),
        ];
        let refs: Vec<&CanonicalRecord> = recs.iter().collect();
        let groups = group_by_employee(&refs);
        let names: Vec<&str> = groups.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].punch_lat, Some(3.0));
        assert_eq!(
            assign_colors(&refs, &[]),
            vec![
                ("B".to_string(), DEFAULT_PALETTE[0].to_string()),
                ("A".to_string(), DEFAULT_PALETTE[1].to_string()),
            ]
        );
    }

    #[test]
    fn marker_texts_and_legend() {
        let mut r = rec("Asha", "2024-01-10 08:00:00", (12.97, 77.59), (12.5, 77.5), "Shop");
        r.outlet_id = None;
        r.visit_timestamp = None;
        let model = build(&[r]);
        let route = model.route("Asha").unwrap();
        let punch = &route.markers[0];
        assert_eq!(punch.tooltip, "Name: Asha | Punch In: 10-01-2024 08:00:00");
        assert!(punch.popup.contains("Latitude: 12.9700"));
        let visit = &route.markers[1];
        assert_eq!(visit.tooltip, "Outlet: Shop | Visit: N/A");
        assert!(visit.popup.contains("(ID: N/A)"));
        assert_eq!(model.legend[0].label, "Asha (Dist: 0.00 km)");
    }

    #[test]
    fn view_bounds() {
        let recs = vec![
            rec("A", "2024-01-10 08:00:00", (1.0, 4.0), (0.0, 0.0), "O"),
            rec("B", "2024-01-10 08:00:00", (3.0, 2.0), (0.0, 0.0), "O"),
        ];
        let model = build(&recs);
        assert_eq!(model.view.center, GeoPoint::new(2.0, 3.0));
        let b = model.view.bounds.unwrap();
        assert_eq!(b.south_west, GeoPoint::new(1.0, 2.0));
        assert_eq!(b.north_east, GeoPoint::new(3.0, 4.0));
        let empty = build_routes(&[], &RenderRules::default(), true);
        assert_eq!(empty.view.center, DEFAULT_CENTER);
        assert!(empty.view.bounds.is_none());
    }
}
