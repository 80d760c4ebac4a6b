use crate::record::Record;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Exact-match filter on one field: the value must be one of `allowed`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub allowed: BTreeSet<String>,
}

impl FieldFilter {
    pub fn new<I, S>(field: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldFilter {
            field: field.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty allowed set filters nothing
    pub fn is_active(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .is_some_and(|value| self.allowed.contains(&value.to_string()))
    }
}

/// Filter criteria: optional free-text query and optional field filter, ANDed together
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterCriteria {
    pub text_query: Option<String>,
    pub field_filter: Option<FieldFilter>,
}

impl FilterCriteria {
    pub fn new(text_query: Option<String>, field_filter: Option<FieldFilter>) -> Self {
        FilterCriteria {
            text_query,
            field_filter,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let text_ok = match normalized_query(self.text_query.as_deref()) {
            Some(query) => contains_text(record, &query),
            None => true,
        };
        let field_ok = match &self.field_filter {
            Some(filter) if filter.is_active() => filter.matches(record),
            _ => true,
        };
        text_ok && field_ok
    }

    /// Apply the criteria to a table
    pub fn apply(&self, table: &Table) -> Table {
        apply(
            table,
            self.text_query.as_deref(),
            self.field_filter.as_ref(),
        )
    }
}

/// Keep the rows of `table` matching the optional text query and field filter
///
/// A blank query and a filter with no allowed values are both ignored. Row
/// order is preserved and the input table is left untouched.
///
/// # Arguments
/// * `table` - Table to filter
/// * `text_query` - Case-insensitive substring searched in every field
/// * `field_filter` - Allowed values for one designated field
///
/// # Returns
/// * `Table` - A new table holding the matching rows
pub fn apply(table: &Table, text_query: Option<&str>, field_filter: Option<&FieldFilter>) -> Table {
    let query = normalized_query(text_query);
    let field_filter = field_filter.filter(|f| f.is_active());

    let rows = table
        .rows()
        .iter()
        .filter(|record| query.as_deref().is_none_or(|q| contains_text(record, q)))
        .filter(|record| field_filter.is_none_or(|f| f.matches(record)))
        .cloned()
        .collect();

    table.with_rows(rows)
}

/// Sorted distinct non-blank values of `field` across the table
pub fn distinct_values(table: &Table, field: &str) -> Vec<String> {
    table
        .rows()
        .iter()
        .filter_map(|record| record.get(field).and_then(|value| value.present()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn normalized_query(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

// `query` is already lower-cased
fn contains_text(record: &Record, query: &str) -> bool {
    record
        .values()
        .iter()
        .any(|value| value.to_string().to_lowercase().contains(query))
}
