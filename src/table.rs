use crate::error::{RepoError, Result};
use crate::record::{Record, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A named collection of records sharing one header row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Table {
    name: String,
    #[serde(serialize_with = "serialize_header")]
    header: Arc<[String]>,
    rows: Vec<Record>,
}

fn serialize_header<S: serde::Serializer>(
    header: &Arc<[String]>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    header.as_ref().serialize(serializer)
}

impl Table {
    /// Create an empty table with the given header
    pub fn empty(name: impl Into<String>, header: Vec<String>) -> Self {
        Table {
            name: name.into(),
            header: header.into(),
            rows: Vec::new(),
        }
    }

    /// Build a table from raw store rows
    ///
    /// The first raw row is the header and is not part of the data. Rows whose
    /// first column is blank are dropped. Rows shorter than the header are padded
    /// with `Empty`; rows carrying non-empty cells past the header width are
    /// rejected with `MalformedRow`.
    ///
    /// # Arguments
    /// * `name` - Table (category) name
    /// * `raw` - All rows as retrieved from the store, header included
    ///
    /// # Returns
    /// * `Result<Table>` - The normalized table or a `MalformedRow` error
    pub fn from_raw(name: impl Into<String>, raw: Vec<Vec<Value>>) -> Result<Self> {
        let name = name.into();
        let mut raw = raw.into_iter();

        let header = match raw.next() {
            Some(first) => header_names(&first),
            None => return Ok(Table::empty(name, Vec::new())),
        };
        let header: Arc<[String]> = header.into();

        let mut rows = Vec::new();
        for (idx, mut values) in raw.enumerate() {
            if values.first().is_none_or(Value::is_blank) {
                continue;
            }

            if values.len() > header.len() {
                let overflow = &values[header.len()..];
                if overflow.iter().any(|v| !v.is_blank()) {
                    return Err(RepoError::MalformedRow {
                        table: name,
                        // Spreadsheet row numbers are 1-based and the header is row 1
                        row: idx + 2,
                        reason: format!(
                            "{} cells for a {}-column header",
                            values.len(),
                            header.len()
                        ),
                    });
                }
                values.truncate(header.len());
            }

            rows.push(Record::new(Arc::clone(&header), values));
        }

        Ok(Table { name, header, rows })
    }

    /// New table with the same name and header but a different row set
    pub fn with_rows(&self, rows: Vec<Record>) -> Self {
        Table {
            name: self.name.clone(),
            header: Arc::clone(&self.header),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Turn the first raw row into unique field names.
///
/// Blank header cells become `Unnamed: <index>`, repeated names get `.1`, `.2`, ...
fn header_names(first: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(first.len());

    for (idx, cell) in first.iter().enumerate() {
        let base = match cell.present() {
            Some(_) => cell.to_string(),
            None => format!("Unnamed: {}", idx),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<Value> {
        cells.iter().map(|c| Value::from(*c)).collect()
    }

    #[test]
    fn first_row_becomes_header() {
        let table = Table::from_raw(
            "Tools",
            vec![text_row(&["Tools", "Link"]), text_row(&["QGIS", "https://qgis.org"])],
        )
        .unwrap();
        assert_eq!(table.header(), &["Tools".to_string(), "Link".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get("Tools"), Some(&Value::from("QGIS")));
    }

    #[test]
    fn rows_with_blank_first_column_are_dropped() {
        let table = Table::from_raw(
            "Tools",
            vec![
                text_row(&["Tools", "Link"]),
                text_row(&["", "orphan link"]),
                text_row(&["  ", "orphan link"]),
                vec![],
                text_row(&["GDAL", ""]),
            ],
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].first(), Some(&Value::from("GDAL")));
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::from_raw(
            "Tools",
            vec![text_row(&["Tools", "Link", "Version"]), text_row(&["GDAL"])],
        )
        .unwrap();
        assert_eq!(table.rows()[0].values().len(), 3);
        assert_eq!(table.rows()[0].get("Version"), Some(&Value::Empty));
    }

    #[test]
    fn overflowing_row_is_malformed() {
        let err = Table::from_raw(
            "Tools",
            vec![text_row(&["Tools"]), text_row(&["GDAL"]), text_row(&["QGIS", "extra"])],
        )
        .unwrap_err();
        match err {
            RepoError::MalformedRow { table, row, .. } => {
                assert_eq!(table, "Tools");
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_and_duplicate_header_names_are_made_unique() {
        let names = header_names(&text_row(&["Link", "", "Link", "Link"]));
        assert_eq!(names, vec!["Link", "Unnamed: 1", "Link.1", "Link.2"]);
    }

    #[test]
    fn empty_source_yields_empty_table() {
        let table = Table::from_raw("Courses", Vec::new()).unwrap();
        assert!(table.is_empty());
        assert!(table.header().is_empty());
    }
}
