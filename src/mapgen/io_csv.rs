// Primitives for reading CSV files.

use field_routes::TabularData;

use crate::mapgen::{io_common::make_table, *};

/// Reads a CSV file. The first line holds the headers.
///
/// Lines may have fewer or more values than the headers: missing values are
/// empty cells, extra values are ignored.
pub fn read_csv_table(path: &str) -> MapgenResult<TabularData> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut records = rdr.records();
    let header = match records.next() {
        Some(r) => r.context(CsvLineParseSnafu { lineno: 1_usize })?,
        None => whatever!("The CSV file {} is empty", path),
    };
    let headers: Vec<String> = header.iter().map(|s| s.to_string()).collect();
    debug!("read_csv_table: headers: {:?}", headers);

    let mut lines: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_table: {:?} {:?}", lineno, line);
        lines.push(line.iter().map(|s| s.to_string()).collect());
    }
    info!("read_csv_table: read {} lines from {}", lines.len(), path);
    Ok(make_table(&headers, lines))
}
