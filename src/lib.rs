/*!
# Daily User Activity Report

Turns a daily export of per-user activity (sessions, deposits, withdrawals,
bets, bonuses) into a fixed set of counts and cross-tabulations, rendered as a
web page or as text, with spreadsheet re-export of the detail tables.

## Overview

Operators upload the spreadsheet produced by the back office at the end of the
day. Each row describes one user: whether they logged in, whether they bet,
how much they deposited, withdrew and received as bonus, and when they
registered. The report answers questions such as "how many users logged in but
did not deposit" and lists the users registered on the report day.

## Architecture

### Pipeline
- **Loader** - Reads the first sheet of an `.xlsx`/`.xls`/`.ods` workbook or a
  CSV file and normalises headers and flag columns
- **Metrics** - Derives the boolean segments (logged in, bet, deposited,
  withdrew, new user) and counts their conjunctions
- **Report** - Groups the counts into labelled sections and builds the detail
  tables
- **Downloader** - Re-exports detail tables as XLSX or CSV

### Frontends
- **Web** (feature `web`) - axum server with an upload form, the rendered
  report, a JSON view and table downloads
- **CLI** - `report-cli <file>` prints the report and can write the exports

## Modules

- **record**: Normalised per-user row and its segment predicates
- **loader**: Spreadsheet and CSV import
- **metrics**: Segment counts, cross-tabulations and shares over logged-in users
- **report**: Presentation model and text rendering
- **downloader**: XLSX/CSV export
- **progress**: Processing stages
- **config**: Server settings
- **app**: Routing and handlers

## HTTP Endpoints

- `GET /` - Upload form
- `POST /report` - Processes an upload (multipart field `file`)
- `GET /reports/{id}` - Renders a processed report
- `GET /api/reports/{id}` - Report as JSON
- `GET /reports/{id}/download/{table}?format=xlsx|csv` - Detail table export
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod progress;
pub mod record;
pub mod report;

#[cfg(feature = "web")]
pub mod app;

pub use error::{ReportError, Result};
pub use metrics::{Analysis, BetRule, DailyMetrics, analyze};
pub use record::UserRecord;
pub use report::{DailyReport, build_report};
