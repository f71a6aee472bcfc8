use calamine::{open_workbook_auto, DataType, Range, Reader};
use chrono::{Days, NaiveDate, NaiveTime};
use field_routes::TabularData;

use crate::mapgen::{io_common::make_table, *};

/// Reads a worksheet of an Excel (or OpenDocument) workbook. The first row
/// holds the headers. Without a worksheet name, the first worksheet is used.
pub fn read_excel_table(path: &str, worksheet_name: Option<&str>) -> MapgenResult<TabularData> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let wrange = get_range(path, worksheet_name)?;

    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    let headers: Vec<String> = header.iter().map(cell_to_string).collect();
    debug!("read_excel_table: header: {:?}", headers);

    let mut lines: Vec<Vec<String>> = Vec::new();
    for row in iter {
        lines.push(row.iter().map(cell_to_string).collect());
    }
    info!("read_excel_table: read {} rows from {}", lines.len(), path);
    Ok(make_table(&headers, lines))
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> MapgenResult<Range<DataType>> {
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;
    match worksheet_name {
        // A worksheet name was provided, use it.
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path }),
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path }),
    }
}

/// The text of a cell, as it would be exported to CSV.
///
/// Integral numbers have no decimal part. Dates are written
/// `YYYY-MM-DD HH:MM:SS`, and times of day (less than one day) `HH:MM:SS`.
pub fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => format_number(*f),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => {
            excel_datetime(*serial).unwrap_or_else(|| format_number(*serial))
        }
        DataType::Empty => String::new(),
        // Cells in error (#DIV/0!, #N/A...) carry no value.
        _ => {
            debug!("cell_to_string: ignoring cell {:?}", cell);
            String::new()
        }
    }
}

fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Converts an Excel serial date (days since 1899-12-30, the fraction being
/// the time of day).
fn excel_datetime(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Rounded to the second first, so that 23:59:59.9 rolls over to the
    // next day.
    let total_secs = (serial * 86400.0).round() as u64;
    let days = total_secs / 86400;
    let secs = (total_secs % 86400) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
    if days == 0 {
        return Some(time.format("%H:%M:%S").to_string());
    }
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days))?;
    Some(date.and_time(time).format("%Y-%m-%d %H:%M:%S").to_string())
}
