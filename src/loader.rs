use crate::downloader::write_cell;
use crate::error::{RepoError, Result};
use crate::record::Value;
use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::NaiveDateTime;
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A spreadsheet-shaped backing store holding named tables
///
/// Stores hand back raw rows: the header row is the first entry and nothing is
/// filtered. Normalization happens in [`crate::table::Table::from_raw`].
pub trait TableStore: Send + Sync {
    /// Human-readable location of the store, used in log lines
    fn describe(&self) -> String;

    /// Names of all tables the store holds
    fn table_names(&self) -> Result<Vec<String>>;

    /// All rows of a table, header first
    fn read_rows(&self, table: &str) -> Result<Vec<Vec<Value>>>;

    /// Append one row at the end of an existing table
    fn append_row(&self, table: &str, row: &[Value]) -> Result<()>;

    /// Create a new table holding only the header row
    fn create_table(&self, table: &str, header: &[String]) -> Result<()>;
}

/// Directory of `<table>.csv` files
///
/// # Examples
/// ```no_run
/// use georepo::loader::{CsvDirStore, TableStore};
///
/// let store = CsvDirStore::new("data");
/// match store.read_rows("Tools") {
///     Ok(rows) => println!("{} raw rows", rows.len()),
///     Err(e) => eprintln!("Error loading table: {}", e),
/// }
/// ```
pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        CsvDirStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn check_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(RepoError::SourceUnavailable(format!(
                "CSV directory not found: {}",
                self.dir.display()
            )))
        }
    }

    fn table_path(&self, table: &str) -> Result<PathBuf> {
        self.check_dir()?;
        // Table names map straight to file names, so path separators are never valid
        if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('.') {
            return Err(RepoError::TableNotFound(table.to_string()));
        }
        Ok(self.dir.join(format!("{}.csv", table)))
    }

    fn existing_table_path(&self, table: &str) -> Result<PathBuf> {
        let path = self.table_path(table)?;
        if !path.is_file() {
            return Err(RepoError::TableNotFound(table.to_string()));
        }
        Ok(path)
    }
}

impl TableStore for CsvDirStore {
    fn describe(&self) -> String {
        format!("csv directory {}", self.dir.display())
    }

    fn table_names(&self) -> Result<Vec<String>> {
        self.check_dir()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let path = self.existing_table_path(table)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::from).collect());
        }
        Ok(rows)
    }

    fn append_row(&self, table: &str, row: &[Value]) -> Result<()> {
        let path = self.existing_table_path(table)?;
        let mut file = OpenOptions::new().read(true).append(true).open(&path)?;

        // Files edited by hand may lack a final newline
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(row.iter().map(|v| v.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    fn create_table(&self, table: &str, header: &[String]) -> Result<()> {
        let path = self.table_path(table)?;
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        writer.flush()?;
        info!("created table '{}' at {}", table, path.display());
        Ok(())
    }
}

/// Local `.xlsx` workbook, one worksheet per table
///
/// Appends rewrite the whole workbook into a temporary file next to the
/// original and rename it into place. Rewrites are serialized because every
/// table shares the same file.
pub struct WorkbookStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl WorkbookStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        WorkbookStore {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn open(&self) -> Result<Xlsx<std::io::BufReader<File>>> {
        open_workbook(&self.path).map_err(|e: calamine::XlsxError| {
            RepoError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }

    fn read_all(&self) -> Result<Vec<(String, Vec<Vec<Value>>)>> {
        let mut workbook = self.open()?;
        let names = workbook.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = workbook.worksheet_range(&name)?;
            sheets.push((name, range_rows(&range)));
        }
        Ok(sheets)
    }

    fn rewrite(&self, sheets: &[(String, Vec<Vec<Value>>)]) -> Result<()> {
        use rust_xlsxwriter::{Workbook, Worksheet};

        let mut workbook = Workbook::new();
        for (name, rows) in sheets {
            let mut worksheet = Worksheet::new();
            worksheet.set_name(name)?;
            for (r, row) in rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    write_cell(&mut worksheet, r as u32, c as u16, value)?;
                }
            }
            workbook.push_worksheet(worksheet);
        }

        let buffer = workbook.save_to_buffer()?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&buffer)?;
        tmp.persist(&self.path).map_err(|e| RepoError::from(e.error))?;
        Ok(())
    }
}

impl TableStore for WorkbookStore {
    fn describe(&self) -> String {
        format!("workbook {}", self.path.display())
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.open()?.sheet_names().to_vec())
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let mut workbook = self.open()?;
        if !workbook.sheet_names().iter().any(|name| name == table) {
            return Err(RepoError::TableNotFound(table.to_string()));
        }
        let range = workbook.worksheet_range(table)?;
        Ok(range_rows(&range))
    }

    fn append_row(&self, table: &str, row: &[Value]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sheets = self.read_all()?;
        let (_, rows) = sheets
            .iter_mut()
            .find(|(name, _)| name == table)
            .ok_or_else(|| RepoError::TableNotFound(table.to_string()))?;
        rows.push(row.to_vec());
        self.rewrite(&sheets)
    }

    fn create_table(&self, table: &str, header: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sheets = self.read_all()?;
        if sheets.iter().any(|(name, _)| name == table) {
            return Err(RepoError::SourceUnavailable(format!(
                "Worksheet already exists: {}",
                table
            )));
        }
        let header_row = header.iter().map(|h| Value::from(h.as_str())).collect();
        sheets.push((table.to_string(), vec![header_row]));
        self.rewrite(&sheets)?;
        info!("created worksheet '{}' in {}", table, self.path.display());
        Ok(())
    }
}

/// Convert a calamine range into rows anchored at column A.
///
/// calamine trims leading blank columns, so those are padded back in to keep
/// the "first column" meaning stable.
fn range_rows(range: &calamine::Range<Data>) -> Vec<Vec<Value>> {
    let lead = range.start().map_or(0, |(_, col)| col as usize);
    range
        .rows()
        .map(|row| {
            let mut values = vec![Value::Empty; lead];
            values.extend(row.iter().map(cell_value));
            values
        })
        .collect()
}

/// Convert a calamine cell to a repository value
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(s) => Value::from_text(s.as_str()),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::DateTime(dt) if dt.is_duration() => Value::Number(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| Value::Number(dt.as_f64()), Value::DateTime),
        Data::DateTimeIso(s) => s
            .parse::<NaiveDateTime>()
            .map_or_else(|_| Value::from_text(s.as_str()), Value::DateTime),
        Data::DurationIso(s) => Value::from_text(s.as_str()),
        Data::Error(e) => Value::Text(format!("#ERROR: {:?}", e)),
    }
}

/// Open the local store matching a path: a directory of CSV files or an `.xlsx` workbook
///
/// # Arguments
/// * `path` - Directory or workbook path
///
/// # Returns
/// * `Result<Box<dyn TableStore>>` - The opened store or an error
pub fn open_local_store(path: impl AsRef<Path>) -> Result<Box<dyn TableStore>> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(Box::new(CsvDirStore::new(path)));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(Box::new(WorkbookStore::new(path))),
        Some(ext) => Err(RepoError::SourceUnavailable(format!(
            "Unsupported file extension: {}",
            ext
        ))),
        None => Err(RepoError::SourceUnavailable(format!(
            "Not a directory or workbook: {}",
            path.display()
        ))),
    }
}
