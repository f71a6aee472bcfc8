use std::path::Path;

use field_routes::{RawRow, TabularData};

use crate::mapgen::*;

/// The readers of tabular files.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputProvider {
    Csv,
    Excel,
}

impl InputProvider {
    pub fn parse(s: &str) -> MapgenResult<InputProvider> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(InputProvider::Csv),
            "excel" | "xlsx" | "xls" => Ok(InputProvider::Excel),
            x => whatever!("Unsupported input type {:?}. Use csv or excel.", x),
        }
    }

    /// Guesses the reader from the extension of the file.
    pub fn infer(path: &str) -> MapgenResult<InputProvider> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(InputProvider::Csv),
            Some("xls") | Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("ods") => {
                Ok(InputProvider::Excel)
            }
            _ => whatever!(
                "Unsupported file type for {}. Please provide a CSV or Excel file, or set the input type.",
                simplify_file_name(path)
            ),
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Resolves a path found in a configuration file: relative paths are
/// relative to the directory of the configuration.
pub fn resolve_path(root: Option<&Path>, path: &str) -> String {
    match root {
        Some(r) if Path::new(path).is_relative() => r.join(path).display().to_string(),
        _ => path.to_string(),
    }
}

/// Assembles a table from the first line (the headers) and the other lines
/// of a file.
///
/// The headers are trimmed. A header seen several times gets a `.1`, `.2`...
/// suffix so that each column can be addressed. Lines without any value are
/// skipped.
pub fn make_table(raw_headers: &[String], lines: Vec<Vec<String>>) -> TabularData {
    let mut headers: Vec<String> = Vec::with_capacity(raw_headers.len());
    for h in raw_headers.iter() {
        let base = h.trim().to_string();
        let mut name = base.clone();
        let mut n = 0;
        while headers.contains(&name) {
            n += 1;
            name = format!("{}.{}", base, n);
        }
        headers.push(name);
    }

    let rows: Vec<RawRow> = lines
        .into_iter()
        .filter(|l| l.iter().any(|v| !v.trim().is_empty()))
        .map(|l| RawRow::from_values(&headers, &l))
        .collect();
    debug!(
        "make_table: {} columns, {} rows",
        headers.len(),
        rows.len()
    );
    TabularData { headers, rows }
}
