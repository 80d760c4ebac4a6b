//! Configuration settings.
//!
//! Settings are loaded from `georepo.toml` (or the path given on the command
//! line). Every key is optional:
//!
//! ```toml
//! bind = "127.0.0.1:3000"
//! static_dir = "static"
//!
//! [store]
//! kind = "sheets"
//! spreadsheet_id = "1AbC..."
//! timeout_secs = 10
//!
//! [cache]
//! ttl_secs = 300
//!
//! [dashboard]
//! filter_field = "Type"
//! submission_table = "Suggestions"
//! ```
//!
//! `GEOREPO_BIND` and `GEOREPO_SHEETS_TOKEN` override the file.

use crate::error::{RepoError, Result};
use crate::loader::{self, TableStore};
use crate::sheets::{self, SheetsAuth, SheetsStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "georepo.toml";
pub const BIND_ENV: &str = "GEOREPO_BIND";
pub const SHEETS_TOKEN_ENV: &str = "GEOREPO_SHEETS_TOKEN";

/// Top-level settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the web server listens on
    pub bind: String,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub dashboard: DashboardSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            dashboard: DashboardSettings::default(),
        }
    }
}

/// Which backing store holds the tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    /// Local `.xlsx` workbook, one worksheet per table
    Workbook { path: PathBuf },
    /// Directory of `<table>.csv` files
    CsvDir { path: PathBuf },
    /// Hosted Google Sheet
    Sheets {
        spreadsheet_id: String,
        #[serde(default)]
        access_token: Option<String>,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::Workbook {
            path: PathBuf::from("geospatial_repository_cleaned.xlsx"),
        }
    }
}

fn default_base_url() -> String {
    sheets::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Seconds a loaded table stays fresh; 0 disables caching
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// What the dashboard offers to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Categories shown in the selector, in order
    pub categories: Vec<String>,
    /// Field used by the multi-select filter
    pub filter_field: String,
    /// Table that receives form submissions
    pub submission_table: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            filter_field: "Type".to_string(),
            submission_table: "Suggestions".to_string(),
        }
    }
}

fn default_categories() -> Vec<String> {
    [
        "Data Sources",
        "Tools",
        "Free Tutorials",
        "Google Earth EnginePython Codes",
        "Courses",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| RepoError::Config(e.to_string()))
    }

    /// Load settings from a file, falling back to defaults when the file is missing
    ///
    /// Environment overrides are applied after the file is read.
    ///
    /// # Arguments
    /// * `path` - Path to the TOML file
    ///
    /// # Returns
    /// * `Result<Settings>` - The resolved settings or a `Config` error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| RepoError::Config(format!("{}: {}", path.display(), e)))?;
            Self::from_toml_str(&contents)?
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Settings::default()
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = bind;
        }
        if let Some(token) = lookup(SHEETS_TOKEN_ENV) {
            if let StoreSettings::Sheets { access_token, .. } = &mut self.store {
                *access_token = Some(token);
            }
        }
    }
}

impl StoreSettings {
    /// Open the configured store
    pub fn open(&self) -> Result<Box<dyn TableStore>> {
        match self {
            StoreSettings::Workbook { path } => Ok(Box::new(loader::WorkbookStore::new(path))),
            StoreSettings::CsvDir { path } => Ok(Box::new(loader::CsvDirStore::new(path))),
            StoreSettings::Sheets {
                spreadsheet_id,
                access_token,
                api_key,
                base_url,
                timeout_secs,
            } => {
                let auth = match (access_token, api_key) {
                    (Some(token), _) => SheetsAuth::Bearer(token.clone()),
                    (None, Some(key)) => SheetsAuth::ApiKey(key.clone()),
                    (None, None) => SheetsAuth::None,
                };
                Ok(Box::new(SheetsStore::new(
                    spreadsheet_id.clone(),
                    base_url.clone(),
                    auth,
                    Duration::from_secs(*timeout_secs),
                )?))
            }
        }
    }
}
