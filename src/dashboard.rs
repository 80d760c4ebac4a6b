use crate::config::DashboardSettings;
use crate::error::Result;
use crate::filter::{self, FieldFilter, FilterCriteria};
use crate::render::{self, CardView};
use crate::repository::Repository;
use crate::table::Table;
use log::warn;
use serde::Serialize;

/// What the user asked to see
#[derive(Clone, Debug, Default)]
pub struct ViewRequest {
    pub table: String,
    pub query: Option<String>,
    /// Selected values of the dashboard filter field
    pub selected: Vec<String>,
}

impl ViewRequest {
    pub fn criteria(&self, filter_field: &str) -> FilterCriteria {
        let field_filter = if self.selected.is_empty() {
            None
        } else {
            Some(FieldFilter::new(filter_field, self.selected.iter().cloned()))
        };
        FilterCriteria::new(self.query.clone(), field_filter)
    }
}

/// Everything the record list needs to render one category
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub table: String,
    pub query: String,
    pub filter_field: String,
    /// Distinct values of the filter field in the unfiltered table
    pub options: Vec<FilterOption>,
    /// Rows in the unfiltered table
    pub total: usize,
    pub cards: Vec<CardView>,
    /// Set when the table could not be loaded; `cards` is then empty
    pub warning: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub selected: bool,
}

/// Load, filter and return the table for a request
pub fn filtered_table(repo: &Repository, settings: &DashboardSettings, request: &ViewRequest) -> Result<Table> {
    let table = repo.load(&request.table)?;
    Ok(request.criteria(&settings.filter_field).apply(&table))
}

/// Build the card list for a request
///
/// A failed load never propagates: the view comes back empty with a warning.
pub fn build_view(repo: &Repository, settings: &DashboardSettings, request: &ViewRequest) -> DashboardView {
    let mut view = DashboardView {
        table: request.table.clone(),
        query: request.query.clone().unwrap_or_default(),
        filter_field: settings.filter_field.clone(),
        options: Vec::new(),
        total: 0,
        cards: Vec::new(),
        warning: None,
    };

    let table = match repo.load(&request.table) {
        Ok(table) => table,
        Err(e) => {
            warn!("showing empty view for '{}': {}", request.table, e);
            view.warning = Some(e.to_string());
            return view;
        }
    };

    view.total = table.len();
    view.options = filter::distinct_values(&table, &settings.filter_field)
        .into_iter()
        .map(|value| FilterOption {
            selected: request.selected.contains(&value),
            value,
        })
        .collect();

    let filtered = request.criteria(&settings.filter_field).apply(&table);
    view.cards = render::render_all(filtered.rows());
    view
}
