/*!
# Geospatial Data Repository

A browser for curated tabular records (geospatial data sources, tools,
tutorials, courses) kept in a spreadsheet, built in Rust.

## Overview

Each category lives in its own table of a spreadsheet. The application loads a
table, lets the user search and filter it, renders every row as a card, offers
the filtered rows as a download and accepts new suggestions through a
submission form that appends to the spreadsheet.

## Architecture

### Read path
- **DataSource Adapter** (`loader`, `sheets`, `repository`) - Reads a named table from
  the backing store, turns the first row into the header and drops rows whose
  first column is blank. Results are cached per table with a bounded TTL.
- **Filter Engine** (`filter`) - Case-insensitive substring search across all
  fields, ANDed with an exact-match multi-select on one designated field.
- **Record Renderer** (`render`) - Maps a row to a card through ordered
  candidate-key lookups for the title, link and optional fields.

### Write path
- **Submission Sink** (`submission`) - Validates a submission and appends it as
  the last row of the target table. Appends to one table are serialized.

### Backing stores
- Local `.xlsx` workbook, one worksheet per table (read with calamine, rewritten with rust_xlsxwriter)
- Directory of `<table>.csv` files
- Hosted Google Sheet over the Sheets v4 REST API

## Modules

- **record**: Cell values and rows
- **table**: Tables and header normalization
- **loader**: Store trait plus the local workbook and CSV directory stores
- **sheets**: Google Sheets store
- **cache**: Per-table TTL cache
- **repository**: Cached, retried table loading
- **filter**: Text and field filtering
- **render**: Card views
- **submission**: Submission validation and single-writer append
- **downloader**: Export functionality (CSV, XLSX)
- **dashboard**: Load → filter → render for one request, degrading to an empty view on failure
- **config**: TOML settings with environment overrides
- **app**: Routing and handlers (`web` feature)

## REST API Endpoints

- `GET /` - Dashboard page
- `POST /submit` - Submission form
- `GET /api/tables` - Configured categories and stored tables
- `GET /api/tables/{name}?q=..&type=..` - Filtered cards
- `GET /api/tables/{name}/export.csv`, `/export.xlsx` - Download of the filtered rows
- `POST /api/tables/{name}/refresh` - Drop the cached copy of a table
- `POST /api/submissions` - JSON submission
*/

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod record;
pub mod render;
pub mod repository;
pub mod sheets;
pub mod submission;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use error::{RepoError, Result};
pub use record::{Record, Value};
pub use repository::Repository;
pub use table::Table;
