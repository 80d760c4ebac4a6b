use crate::error::{RepoError, Result};
use crate::record::Value;
use crate::render::{LINK_FIELDS, TITLE_FIELDS, is_web_link};
use crate::repository::{Repository, with_retry};
use crate::table::Table;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Header used when a submission creates its target table
pub const SUBMISSION_HEADER: &[&str] = &[
    "Title",
    "Description",
    "Link",
    "Category",
    "Type",
    "Purpose",
    "Year/Month of Data Availability",
];

const YEAR_MONTH_FIELDS: &[&str] = &["Year/Month of Data Availability", "Year/Month"];

/// A record entered through the submission form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    /// Name of the data source, tool or tutorial (required)
    pub title: String,
    pub description: String,
    /// Where the resource lives (required)
    pub link: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub purpose: String,
    pub year_month: String,
}

impl Submission {
    /// Check the required fields: title and link must be non-blank, and the
    /// link must be an http(s) URL
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.link.trim().is_empty() {
            missing.push("link");
        }
        if !missing.is_empty() {
            return Err(RepoError::ValidationFailed(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }
        if !is_web_link(&self.link) {
            return Err(RepoError::ValidationFailed(format!(
                "link must start with http:// or https://, got '{}'",
                self.link.trim()
            )));
        }
        Ok(())
    }

    /// Lay the submission out along a table header
    ///
    /// The title goes to the first title alias the header has (or the first
    /// column), the link to the first link alias. Fields the header has no
    /// column for are dropped with a warning. The first column is never left
    /// blank: when nothing else fills it, it repeats the title, since rows with
    /// a blank first column are not shown.
    pub fn to_row(&self, header: &[String]) -> Vec<Value> {
        let column = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|c| header.iter().position(|h| h == *c))
        };

        let mut row = vec![Value::Empty; header.len()];
        let title_col = column(TITLE_FIELDS).or(if header.is_empty() { None } else { Some(0) });

        let placements = [
            ("title", title_col, &self.title),
            ("description", column(&["Description"]), &self.description),
            ("link", column(LINK_FIELDS), &self.link),
            ("category", column(&["Category"]), &self.category),
            ("type", column(&["Type"]), &self.kind),
            ("purpose", column(&["Purpose"]), &self.purpose),
            ("year/month", column(YEAR_MONTH_FIELDS), &self.year_month),
        ];

        for (name, col, text) in placements {
            let text = text.trim();
            match col {
                Some(idx) => row[idx] = Value::from_text(text),
                None if !text.is_empty() => {
                    warn!("submission field '{}' has no column in target table", name)
                }
                None => {}
            }
        }

        if let Some(first) = row.first_mut().filter(|v| v.is_blank()) {
            debug!("first column of target table repeats the submission title");
            *first = Value::from_text(self.title.trim());
        }

        row
    }
}

/// Write side of the repository: appends submissions to a table
///
/// Submissions to the same table are serialized through a per-table mutex, so
/// concurrent appends in this process never overwrite each other.
pub struct SubmissionSink {
    repo: Arc<Repository>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubmissionSink {
    pub fn new(repo: Arc<Repository>) -> Self {
        SubmissionSink {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn table_lock(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(table.to_string()).or_default())
    }

    /// Append a submission as the last row of `table`
    ///
    /// A missing table is created with [`SUBMISSION_HEADER`]. The cached copy of
    /// the table is dropped afterwards.
    ///
    /// # Errors
    /// * `ValidationFailed` - title or link blank; nothing is written
    /// * `SourceUnavailable` - the store could not be reached, even after one retry
    pub fn submit(&self, table: &str, submission: &Submission) -> Result<()> {
        submission.validate()?;

        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let store = self.repo.store();

        // Header is read from the store, never from the cache
        let header = match with_retry("read", || store.read_rows(table)) {
            Ok(mut raw) => {
                raw.truncate(1);
                Table::from_raw(table, raw)?.header().to_vec()
            }
            Err(RepoError::TableNotFound(_)) => {
                let header: Vec<String> = SUBMISSION_HEADER.iter().map(|s| s.to_string()).collect();
                store.create_table(table, &header)?;
                header
            }
            Err(e) => return Err(e),
        };

        // A table without a header row gets the default one first
        let header = if header.is_empty() {
            let header: Vec<String> = SUBMISSION_HEADER.iter().map(|s| s.to_string()).collect();
            let header_row: Vec<Value> = header.iter().map(|h| Value::from(h.as_str())).collect();
            with_retry("append", || store.append_row(table, &header_row))?;
            header
        } else {
            header
        };

        let row = submission.to_row(&header);

        with_retry("append", || store.append_row(table, &row))?;
        self.repo.refresh(table);
        info!("appended submission '{}' to '{}'", submission.title.trim(), table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn submission() -> Submission {
        Submission {
            title: "Sentinel-2".into(),
            link: "https://sentinel.esa.int".into(),
            kind: "Raster Data".into(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_title_or_link_fails_validation() {
        let mut s = submission();
        s.link = "   ".into();
        assert!(matches!(s.validate(), Err(RepoError::ValidationFailed(_))));
        s.link = "https://x".into();
        s.title.clear();
        assert!(matches!(s.validate(), Err(RepoError::ValidationFailed(_))));
    }

    #[test]
    fn non_web_links_fail_validation() {
        let mut s = submission();
        for link in ["javascript:alert(1)", "JaVaScRiPt:alert(1)", "data:text/html,hi", "www.example.org"] {
            s.link = link.into();
            assert!(
                matches!(s.validate(), Err(RepoError::ValidationFailed(_))),
                "{} accepted",
                link
            );
        }
        s.link = "HTTPS://Example.org/data".into();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn title_and_link_follow_header_aliases() {
        let row = submission().to_row(&header(&["Data Source", "Type", "Links"]));
        assert_eq!(
            row,
            vec![
                Value::from("Sentinel-2"),
                Value::from("Raster Data"),
                Value::from("https://sentinel.esa.int"),
            ]
        );
    }

    #[test]
    fn title_falls_back_to_first_column() {
        let row = submission().to_row(&header(&["Name", "Link"]));
        assert_eq!(row[0], Value::from("Sentinel-2"));
        assert_eq!(row[1], Value::from("https://sentinel.esa.int"));
    }

    #[test]
    fn untitled_first_column_repeats_title() {
        let row = submission().to_row(&header(&["Category", "Title", "Link"]));
        assert_eq!(row[0], Value::from("Sentinel-2"));
        assert_eq!(row[1], Value::from("Sentinel-2"));
        assert_eq!(row[2], Value::from("https://sentinel.esa.int"));

        let mut s = submission();
        s.category = "Data Sources".into();
        let row = s.to_row(&header(&["Category", "Title", "Link"]));
        assert_eq!(row[0], Value::from("Data Sources"));
    }

    #[test]
    fn submission_header_round_trips_all_fields() {
        let s = Submission {
            title: "GEE course".into(),
            description: "Intro".into(),
            link: "https://example.org".into(),
            category: "Courses".into(),
            kind: "Video".into(),
            purpose: "Training".into(),
            year_month: "2024/01".into(),
        };
        let header: Vec<String> = SUBMISSION_HEADER.iter().map(|s| s.to_string()).collect();
        let row = s.to_row(&header);
        assert!(row.iter().all(|v| !v.is_blank()));
        assert_eq!(row[6], Value::from("2024/01"));
    }
}
