use crate::record::Record;
use serde::Serialize;

/// Fields tried, in order, for the card title
pub const TITLE_FIELDS: &[&str] = &["Data Source", "Tools", "Title", "Tutorials"];

/// Fields tried, in order, for the card link
pub const LINK_FIELDS: &[&str] = &["Links", "Link", "Link to the codes"];

/// Title used when no title field is present
pub const UNNAMED: &str = "Unnamed";

/// Optional card fields as `(field name, display label)`, in display order
pub const OPTIONAL_FIELDS: &[(&str, &str)] = &[
    ("Description", "Description"),
    ("Purpose", "Purpose"),
    ("Type", "Type"),
    ("Spatial Resolution (in m)", "Resolution"),
    ("Version", "Version"),
    ("Year/Month of Data Availability", "Year/Month"),
    ("Countries Covered", "Countries Covered"),
    ("Applicability", "Applicability"),
    ("Datasets Availability", "Datasets Availability"),
    ("Remarks/Suggestions", "Remarks"),
];

/// One labelled line on a card
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardField {
    pub label: &'static str,
    pub value: String,
}

/// User-facing summary of one record
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardView {
    pub title: String,
    pub link: Option<String>,
    /// `link` when it is safe to put in an `href`, i.e. an http(s) URL
    pub href: Option<String>,
    pub fields: Vec<CardField>,
}

/// Whether `link` is an absolute `http://` or `https://` URL
pub fn is_web_link(link: &str) -> bool {
    let link = link.trim();
    ["http://", "https://"].iter().any(|scheme| {
        link.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// First field among `candidates` whose value is present, as display text.
///
/// Blank text counts as absent.
pub fn first_present(record: &Record, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|field| record.get(field).and_then(|value| value.present()))
}

/// Map a record to its card view
pub fn render(record: &Record) -> CardView {
    let title = first_present(record, TITLE_FIELDS).unwrap_or_else(|| UNNAMED.to_string());
    let link = first_present(record, LINK_FIELDS);
    let href = link.clone().filter(|l| is_web_link(l));

    let fields = OPTIONAL_FIELDS
        .iter()
        .filter_map(|&(field, label)| {
            first_present(record, &[field]).map(|value| CardField { label, value })
        })
        .collect();

    CardView {
        title,
        link,
        href,
        fields,
    }
}

pub fn render_all<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<CardView> {
    records.into_iter().map(render).collect()
}
