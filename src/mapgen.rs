use log::{debug, info, warn};

use field_routes::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

use crate::args::Args;
use crate::mapgen::config_reader::*;
use crate::mapgen::io_common::{resolve_path, InputProvider};

/// Shown when the filters select nothing.
const NO_DATA_MESSAGE: &str = "No data found for the selected filters.";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MapgenError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("The workbook {path} has no worksheet named {name:?}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not find the directory of {path}"))]
    MissingParentDir { path: String },

    #[snafu(display("{source}"))]
    Routes { source: RouteError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type MapgenResult<T> = Result<T, MapgenError>;

// ********* JSON output ***********

fn point_to_json(p: &GeoPoint) -> JSValue {
    json!([p.lat, p.lon])
}

fn marker_to_json(m: &Marker) -> JSValue {
    json!({
        "kind": m.kind.name(),
        "position": point_to_json(&m.position),
        "date": m.date.format("%Y-%m-%d").to_string(),
        "icon": m.kind.icon(),
        "iconColor": m.kind.icon_color(),
        "popup": m.popup,
        "tooltip": m.tooltip,
    })
}

fn segment_to_json(s: &Segment) -> JSValue {
    json!({
        "from": point_to_json(&s.from),
        "to": point_to_json(&s.to),
        "distanceKm": s.distance_km,
        "color": s.color,
        "weight": s.weight,
        "opacity": s.opacity,
        "tooltip": s.tooltip,
    })
}

fn route_to_json(r: &EmployeeRoute) -> JSValue {
    let stops: Vec<JSValue> = r
        .records
        .iter()
        .map(|rec| {
            json!({
                "row": rec.row_index,
                "punchTime": rec.punch_timestamp.to_string(),
                "visitTime": rec.visit_timestamp.map(|t| t.to_string()),
                "outletName": rec.outlet_name,
                "outletId": rec.outlet_id,
            })
        })
        .collect();
    json!({
        "employee": r.employee,
        "color": r.color,
        "totalDistanceKm": r.total_distance_km,
        "droppedRecords": r.dropped_records,
        "stops": stops,
        "markers": r.markers.iter().map(marker_to_json).collect::<Vec<JSValue>>(),
        "segments": r.segments.iter().map(segment_to_json).collect::<Vec<JSValue>>(),
    })
}

fn route_model_to_json(model: &RouteModel) -> JSValue {
    let view = &model.view;
    let bounds = view
        .bounds
        .map(|b| json!([point_to_json(&b.south_west), point_to_json(&b.north_east)]));

    let mut total_distances: JSMap<String, JSValue> = JSMap::new();
    for (emp, km) in model.total_distances() {
        total_distances.insert(emp, json!(km));
    }
    let mut colors: JSMap<String, JSValue> = JSMap::new();
    for (emp, color) in model.colors() {
        colors.insert(emp, json!(color));
    }

    let legend: Vec<JSValue> = model
        .legend
        .iter()
        .map(|l| {
            json!({
                "employee": l.employee,
                "color": l.color,
                "totalDistanceKm": l.total_distance_km,
                "label": l.label,
            })
        })
        .collect();

    json!({
        "status": "ok",
        "view": {
            "center": point_to_json(&view.center),
            "bounds": bounds,
            "fitBounds": view.fit_bounds,
        },
        "routes": model.routes.iter().map(route_to_json).collect::<Vec<JSValue>>(),
        "legend": legend,
        "totalDistances": total_distances,
        "colors": colors,
    })
}

pub fn route_outcome_to_json(outcome: &RouteOutcome) -> JSValue {
    match outcome {
        RouteOutcome::Routes(model) => route_model_to_json(model),
        RouteOutcome::Empty => json!({
            "status": "empty",
            "message": NO_DATA_MESSAGE,
            "routes": [],
            "legend": [],
        }),
    }
}

fn employees_to_json(dataset: &CanonicalDataset) -> JSValue {
    json!({
        "employees": dataset.employees(),
        "records": dataset.len(),
        "warnings": dataset.warnings.iter().map(|w| w.to_string()).collect::<Vec<String>>(),
    })
}

/// The days with a valid punch time: `value` is the form expected by the
/// date filters, `text` the form shown to users.
fn dates_to_json(dataset: &CanonicalDataset) -> JSValue {
    let dates: Vec<JSValue> = dataset
        .unique_dates()
        .iter()
        .map(|d| {
            json!({
                "value": d.format("%Y-%m-%d").to_string(),
                "text": d.format("%d-%m-%Y").to_string(),
            })
        })
        .collect();
    JSValue::Array(dates)
}

// ********* Pipeline ***********

fn read_table(
    path: &str,
    provider: InputProvider,
    worksheet_name: Option<&str>,
) -> MapgenResult<TabularData> {
    info!("Attempting to read {:?} as {:?}", path, provider);
    match provider {
        InputProvider::Csv => io_csv::read_csv_table(path),
        InputProvider::Excel => io_excel::read_excel_table(path, worksheet_name),
    }
}

/// Runs the whole pipeline and returns the JSON output, without writing it.
pub fn generate_output(args: &Args) -> MapgenResult<JSValue> {
    let (config, root): (MapgenConfig, Option<PathBuf>) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root_p = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu { path: config_path })?;
            (config, Some(root_p.to_path_buf()))
        }
        None => (MapgenConfig::default(), None),
    };

    // The command line takes precedence over the configuration.
    let input_path = match (&args.input, &config.input_settings.file_path) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(root.as_deref(), p),
        (None, None) => {
            whatever!("No input file: use --input or set inputSettings.filePath in the configuration")
        }
    };
    let provider = match args
        .input_type
        .as_deref()
        .or(config.input_settings.provider.as_deref())
    {
        Some(p) => InputProvider::parse(p)?,
        None => InputProvider::infer(&input_path)?,
    };
    let worksheet_name = args
        .excel_worksheet_name
        .as_deref()
        .or(config.input_settings.excel_worksheet_name.as_deref());

    let ingest_rules = config.ingest_rules(args.date_format.as_deref());
    let resolver = config.resolver()?;
    let render_rules = config.render_rules()?;
    debug!(
        "generate_output: ingest rules: {:?} render rules: {:?}",
        ingest_rules, render_rules
    );

    let table = read_table(&input_path, provider, worksheet_name)?;
    let dataset = ingest(&table, &ingest_rules, &resolver).context(RoutesSnafu {})?;
    for w in dataset.warnings.iter() {
        debug!("generate_output: {}", w);
    }

    if args.list_employees {
        return Ok(employees_to_json(&dataset));
    }
    if args.list_dates {
        return Ok(dates_to_json(&dataset));
    }

    let filters = &config.filters;
    let start_date = args.start_date.as_deref().or(filters.start_date.as_deref());
    let end_date = args.end_date.as_deref().or(filters.end_date.as_deref());
    let employee = args
        .employee
        .as_deref()
        .or(filters.employee_name.as_deref());
    let filter = RouteFilter::parse(start_date, end_date, employee).context(RoutesSnafu {})?;

    let outcome = generate_routes(&dataset, &filter, &render_rules);
    if outcome == RouteOutcome::Empty {
        warn!("{}", NO_DATA_MESSAGE);
    }
    Ok(route_outcome_to_json(&outcome))
}

pub fn run_mapgen(args: &Args) -> MapgenResult<()> {
    let result_js = generate_output(args)?;
    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js),
        Some(out_path) => {
            info!("Writing output to {}", out_path);
            fs::write(out_path, &pretty_js).context(WritingOutputSnafu { path: out_path })?;
        }
    }

    // The reference output, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let reference_js = read_reference(reference_path)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js {
            warn!("Found differences with the reference output");
            print_diff(pretty_js_reference.as_str(), pretty_js.as_ref(), "\n");
            whatever!("Difference detected between the generated output and the reference output")
        }
        info!("The output matches the reference {}", reference_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sample_args() -> Args {
        Args {
            input: Some("testdata/visits.csv".to_string()),
            ..Args::default()
        }
    }

    fn route_names(js: &JSValue) -> Vec<String> {
        js["routes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["employee"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn all_routes() {
        init();
        let js = generate_output(&sample_args()).unwrap();
        assert_eq!(js["status"], "ok");
        assert_eq!(
            route_names(&js),
            vec!["Asha Rao", "Ravi Kumar", "Meena Iyer"]
        );
        assert_eq!(js["view"]["fitBounds"], false);
        assert_eq!(js["colors"]["Ravi Kumar"], DEFAULT_PALETTE[1]);

        let asha = &js["routes"][0];
        // The duplicated first visit only gives one pair of markers.
        assert_eq!(asha["markers"].as_array().unwrap().len(), 6);
        assert_eq!(asha["segments"].as_array().unwrap().len(), 3);
        assert_eq!(asha["stops"][0]["punchTime"], "10-01-2024 09:00:00");

        let meena = &js["routes"][2];
        assert_eq!(meena["droppedRecords"], 1);
        assert!(meena["segments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn single_employee() {
        let args = Args {
            employee: Some("Ravi Kumar".to_string()),
            ..sample_args()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(route_names(&js), vec!["Ravi Kumar"]);
        assert_eq!(js["view"]["fitBounds"], true);
        let ravi = &js["routes"][0];
        // The last visit has no coordinates.
        let kinds: Vec<&str> = ravi["markers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["punch", "visit", "punch", "visit", "punch"]);
        let label = js["legend"][0]["label"].as_str().unwrap();
        assert!(label.starts_with("Ravi Kumar (Dist: "), "{}", label);
        // An empty visit time is not turned into midnight.
        assert_eq!(ravi["stops"][2]["punchTime"], "11-01-2024 13:10:00");
        assert_eq!(ravi["stops"][2]["visitTime"], INVALID_TIME);
    }

    #[test]
    fn excel_input() {
        let args = Args {
            input: Some("testdata/visits.xlsx".to_string()),
            ..Args::default()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(js["status"], "ok");
        assert_eq!(route_names(&js), vec!["Asha Rao"]);
        let asha = &js["routes"][0];
        assert_eq!(asha["stops"][0]["punchTime"], "10-01-2024 09:00:00");
        assert_eq!(asha["stops"][1]["punchTime"], "10-01-2024 11:30:00");
        assert_eq!(asha["segments"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn date_filters() {
        let args = Args {
            start_date: Some("2024-01-12".to_string()),
            ..sample_args()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(route_names(&js), vec!["Meena Iyer"]);

        let args = Args {
            start_date: Some("2024-02-01".to_string()),
            ..sample_args()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(js["status"], "empty");
        assert_eq!(js["message"], NO_DATA_MESSAGE);

        let args = Args {
            end_date: Some("12/01/2024".to_string()),
            ..sample_args()
        };
        let err = generate_output(&args).unwrap_err();
        assert!(matches!(
            err,
            MapgenError::Routes {
                source: RouteError::DateFilterFormat { .. }
            }
        ));
    }

    #[test]
    fn lists() {
        let args = Args {
            list_dates: true,
            ..sample_args()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(
            js,
            json!([
                {"value": "2024-01-10", "text": "10-01-2024"},
                {"value": "2024-01-11", "text": "11-01-2024"},
                {"value": "2024-01-12", "text": "12-01-2024"},
            ])
        );

        let args = Args {
            list_employees: true,
            ..sample_args()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(js["employees"], json!(["Asha Rao", "Ravi Kumar", "Meena Iyer"]));
        assert_eq!(js["records"], 9);
        // Two empty visit times and Meena's unreadable punch time.
        assert_eq!(js["warnings"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn config_file() {
        let args = Args {
            config: Some("testdata/config.json".to_string()),
            ..Args::default()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(route_names(&js), vec!["Ravi Kumar"]);
        assert_eq!(js["routes"][0]["segments"][0]["weight"], 3);

        // The command line wins.
        let args = Args {
            config: Some("testdata/config.json".to_string()),
            employee: Some("Asha Rao".to_string()),
            ..Args::default()
        };
        let js = generate_output(&args).unwrap();
        assert_eq!(route_names(&js), vec!["Asha Rao"]);
    }

    #[test]
    fn missing_columns() {
        let args = Args {
            input: Some("testdata/missing_outlet_id.csv".to_string()),
            ..Args::default()
        };
        let err = generate_output(&args).unwrap_err();
        match err {
            MapgenError::Routes {
                source: RouteError::MissingColumns { missing, detected },
            } => {
                assert_eq!(missing, vec![Role::OutletID]);
                assert_eq!(detected.len(), 5);
            }
            x => panic!("unexpected error {:?}", x),
        }
    }

    #[test]
    fn no_input() {
        assert!(generate_output(&Args::default()).is_err());
    }

    #[test]
    fn reference_check() {
        init();
        let out = std::env::temp_dir().join(format!("fieldroutes-{}.json", std::process::id()));
        let out_path = out.display().to_string();
        let args = Args {
            out: Some(out_path.clone()),
            ..sample_args()
        };
        run_mapgen(&args).unwrap();

        // Same input and filters: the output is identical.
        let args = Args {
            out: Some("stdout".to_string()),
            reference: Some(out_path),
            ..args
        };
        run_mapgen(&args).unwrap();

        // Another filter: the check fails.
        let args = Args {
            employee: Some("Asha Rao".to_string()),
            ..args
        };
        assert!(run_mapgen(&args).is_err());

        let _ = fs::remove_file(out);
    }
}
