use crate::error::{RepoError, Result};
use crate::record::Value;
use crate::table::Table;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{Format, Worksheet, XlsxError};

/// Convert a table to CSV format
///
/// This function exports a table (typically the currently filtered view) as
/// delimited rows:
/// - The first line is the table header
/// - Values follow in header order, empty cells as empty fields
/// - Special characters (commas, quotes, newlines) are quoted by the csv writer
///
/// Exporting an unfiltered table reproduces the loaded header and values.
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `Result<String>` - CSV content as a string or an `Export` error
///
/// # Examples
/// ```
/// use georepo::downloader::to_csv;
/// use georepo::record::Value;
/// use georepo::table::Table;
///
/// let table = Table::from_raw(
///     "Tools",
///     vec![vec![Value::from("Tools")], vec![Value::from("QGIS")]],
/// )
/// .unwrap();
/// assert_eq!(to_csv(&table).unwrap(), "Tools\nQGIS\n");
/// ```
pub fn to_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !table.header().is_empty() {
        writer.write_record(table.header()).map_err(export_error)?;
    }
    for record in table.rows() {
        writer
            .write_record(record.values().iter().map(|v| v.to_string()))
            .map_err(export_error)?;
    }

    let bytes = writer.into_inner().map_err(export_error)?;
    String::from_utf8(bytes).map_err(export_error)
}

/// Convert a table to XLSX format
///
/// The header is written as the first worksheet row, numbers stay numeric and
/// empty cells are left blank. The worksheet is named after the table.
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an `Export` error
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    // Names over 31 chars or with []:*?/\ are refused; the default name stays then
    let _ = worksheet.set_name(table.name());

    for (c, name) in table.header().iter().enumerate() {
        worksheet
            .write_string(0, c as u16, name)
            .map_err(export_error)?;
    }

    for (r, record) in table.rows().iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, value) in record.values().iter().enumerate() {
            write_cell(&mut worksheet, row, c as u16, value).map_err(export_error)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(export_error)
}

/// Write one value into a worksheet cell, keeping its kind
///
/// Dates are written as Excel serial numbers with a date format, so they read
/// back as dates rather than text.
pub(crate) fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
) -> std::result::Result<(), XlsxError> {
    match value {
        Value::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        Value::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        Value::DateTime(dt) => match excel_serial(dt) {
            Some(serial) => {
                let format = Format::new().set_num_format(date_format(dt));
                worksheet.write_number_with_format(row, col, serial, &format)?;
            }
            None => {
                worksheet.write_string(row, col, value.to_string())?;
            }
        },
        Value::Empty => {}
    }
    Ok(())
}

// Days since 1899-12-30, the epoch that lines up with Excel serials after 1900-02-28
fn excel_serial(dt: &NaiveDateTime) -> Option<f64> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    Some((*dt - epoch).num_milliseconds() as f64 / 86_400_000.0)
}

fn date_format(dt: &NaiveDateTime) -> &'static str {
    if dt.num_seconds_from_midnight() == 0 {
        "yyyy-mm-dd"
    } else {
        "yyyy-mm-dd hh:mm:ss"
    }
}

/// File name offered for a download of `table`
pub fn export_file_name(table: &Table, extension: &str) -> String {
    let stem: String = table
        .name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}.{}", stem, extension)
}

fn export_error(e: impl std::fmt::Display) -> RepoError {
    RepoError::Export(e.to_string())
}
