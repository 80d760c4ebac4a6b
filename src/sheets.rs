//! Hosted spreadsheet store backed by the Google Sheets v4 REST API.

use crate::error::{RepoError, Result};
use crate::loader::TableStore;
use crate::record::Value;
use log::info;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// How requests authenticate against the Sheets API
#[derive(Clone, Debug)]
pub enum SheetsAuth {
    /// OAuth access token, e.g. issued for a service account
    Bearer(String),
    /// API key; read-only access to shared sheets
    ApiKey(String),
    None,
}

pub struct SheetsStore {
    spreadsheet_id: String,
    base_url: String,
    auth: SheetsAuth,
    timeout: Duration,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        base_url: impl Into<String>,
        auth: SheetsAuth,
        timeout: Duration,
    ) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(RepoError::Config("Sheets store needs a spreadsheet_id".into()));
        }
        Ok(SheetsStore {
            spreadsheet_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            timeout,
        })
    }

    // The blocking client owns a runtime, so it is built on the calling (blocking) thread.
    fn client(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn values_url(&self, table: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(&a1_sheet_range(table))
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            SheetsAuth::Bearer(token) => request.bearer_auth(token),
            SheetsAuth::ApiKey(key) => request.query(&[("key", key)]),
            SheetsAuth::None => request,
        }
    }

    fn send(&self, request: RequestBuilder, table: Option<&str>) -> Result<Response> {
        let response = self.authorize(request).send()?;
        check_status(response, table)
    }
}

impl TableStore for SheetsStore {
    fn describe(&self) -> String {
        format!("google sheet {}", self.spreadsheet_id)
    }

    fn table_names(&self) -> Result<Vec<String>> {
        let client = self.client()?;
        let request = client
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = self.send(request, None)?.json()?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let client = self.client()?;
        let request = client.get(self.values_url(table));
        let range: ValueRange = self.send(request, Some(table))?.json()?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(json_to_value).collect())
            .collect())
    }

    fn append_row(&self, table: &str, row: &[Value]) -> Result<()> {
        let client = self.client()?;
        let body = json!({ "values": [row.iter().map(value_to_json).collect::<Vec<_>>()] });
        let request = client
            .post(format!("{}:append", self.values_url(table)))
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body);
        self.send(request, Some(table))?;
        Ok(())
    }

    fn create_table(&self, table: &str, header: &[String]) -> Result<()> {
        let client = self.client()?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": table } } }]
        });
        let request = client
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .json(&body);
        self.send(request, None)?;
        info!("created sheet '{}' in {}", table, self.spreadsheet_id);

        let header: Vec<Value> = header.iter().map(|h| Value::from(h.as_str())).collect();
        self.append_row(table, &header)
    }
}

/// A1 range covering a whole sheet: the quoted sheet title
fn a1_sheet_range(table: &str) -> String {
    format!("'{}'", table.replace('\'', "''"))
}

fn check_status(response: Response, table: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    match (status, table) {
        // The API reports unknown sheet titles as an unparsable range
        (StatusCode::BAD_REQUEST, Some(table)) if body.contains("Unable to parse range") => {
            Err(RepoError::TableNotFound(table.to_string()))
        }
        _ => Err(RepoError::SourceUnavailable(format!(
            "Sheets API returned {}: {}",
            status,
            body.trim()
        ))),
    }
}

fn json_to_value(cell: &serde_json::Value) -> Value {
    match cell {
        serde_json::Value::String(s) => Value::from_text(s.as_str()),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Empty, Value::Number),
        serde_json::Value::Bool(b) => Value::Text(b.to_string()),
        serde_json::Value::Null => Value::Empty,
        other => Value::Text(other.to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Text(s) => json!(s),
        Value::Number(n) => json!(n),
        Value::DateTime(_) => json!(value.to_string()),
        Value::Empty => json!(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_titles_are_quoted_for_a1_ranges() {
        assert_eq!(a1_sheet_range("Data Sources"), "'Data Sources'");
        assert_eq!(a1_sheet_range("Bob's Tools"), "'Bob''s Tools'");
    }

    #[test]
    fn json_cells_map_to_values() {
        assert_eq!(json_to_value(&json!("")), Value::Empty);
        assert_eq!(json_to_value(&json!("Landsat 8")), Value::from("Landsat 8"));
        assert_eq!(json_to_value(&json!(30)), Value::Number(30.0));
        assert_eq!(json_to_value(&serde_json::Value::Null), Value::Empty);
    }

    #[test]
    fn values_url_encodes_sheet_title() {
        let store = SheetsStore::new(
            "abc123",
            "https://sheets.example/v4/",
            SheetsAuth::None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.values_url("Free Tutorials"),
            "https://sheets.example/v4/spreadsheets/abc123/values/%27Free%20Tutorials%27"
        );
    }

    #[test]
    fn spreadsheet_id_is_required() {
        let result = SheetsStore::new(" ", DEFAULT_BASE_URL, SheetsAuth::None, Duration::from_secs(5));
        assert!(matches!(result, Err(RepoError::Config(_))));
    }
}
