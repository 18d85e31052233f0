use crate::error::{ReportError, Result};
use crate::record::{RawValue, UserRecord, extract_report_date};
use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Columns that every daily export must carry
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "id",
    "user_id",
    "logged_in_day",
    "have_bet",
    "total_deposit_amount",
    "total_withdrawal_amount",
    "total_release_bonus_amount",
    "registration_date",
];

/// Header row plus raw data rows of the first sheet of an upload
#[derive(Debug, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

/// Load user records from a file on disk
///
/// The format is chosen from the file extension: CSV files go through the
/// `csv` reader, every spreadsheet format `calamine` understands is read from
/// its first worksheet.
///
/// # Examples
/// ```no_run
/// use daily_report::loader::load_records;
///
/// match load_records("resumen_diario.xlsx") {
///     Ok(records) => println!("Loaded {} users", records.len()),
///     Err(e) => eprintln!("Error loading report: {}", e),
/// }
/// ```
pub fn load_records(filepath: impl AsRef<Path>) -> Result<Vec<UserRecord>> {
    let path = filepath.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = fs::read(path)?;
    load_records_from_bytes(&name, bytes)
}

/// Load user records from an upload held in memory. `file_name` is only used
/// to pick the format.
pub fn load_records_from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Vec<UserRecord>> {
    let sheet = read_sheet(file_name, bytes)?;
    let records = records_from_sheet(&sheet)?;
    info!(
        "loaded {} user rows ({} columns) from {}",
        records.len(),
        sheet.headers.len(),
        file_name
    );
    Ok(records)
}

/// Read the first sheet of an upload without interpreting any column
pub fn read_sheet(file_name: &str, bytes: Vec<u8>) -> Result<RawSheet> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(&bytes),
        Some("xlsx") | Some("xls") | Some("xlsm") | Some("xlsb") | Some("ods") => from_excel(bytes),
        Some(ext) => Err(ReportError::UnsupportedFormat(ext.to_string())),
        None => Err(ReportError::UnsupportedFormat(format!(
            "'{}' has no extension",
            file_name
        ))),
    }
}

fn from_excel(bytes: Vec<u8>) -> Result<RawSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReportError::EmptySheet)?;
    debug!("reading worksheet '{}'", sheet_name);

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let headers = match rows.next() {
        Some(header) => header.iter().map(|cell| raw_from_excel(cell).to_text()).collect(),
        None => return Err(ReportError::EmptySheet),
    };

    Ok(RawSheet {
        headers,
        rows: rows
            .map(|row| row.iter().map(raw_from_excel).collect())
            .collect(),
    })
}

fn raw_from_excel(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(RawValue::DateTime)
            .unwrap_or(RawValue::Empty),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(_) => RawValue::Empty,
    }
}

// CSV cells stay textual; numbers and dates are parsed per column later so
// that ids such as "00123" keep their leading zeros.
fn from_csv(bytes: &[u8]) -> Result<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawValue::Empty
                    } else {
                        RawValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawSheet { headers, rows })
}

/// Column lookup over normalised (lower-cased, trimmed) header names
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &[String]) -> Self {
        let mut index = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // first occurrence wins on duplicated headers
            index.entry(header.trim().to_lowercase()).or_insert(i);
        }
        Columns { index }
    }

    fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.index.contains_key(**name)) {
            Some(missing) => Err(ReportError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    fn get<'a>(&self, row: &'a [RawValue], name: &str) -> &'a RawValue {
        const EMPTY: &RawValue = &RawValue::Empty;
        self.index
            .get(name)
            .and_then(|&i| row.get(i))
            .unwrap_or(EMPTY)
    }
}

/// Map raw rows onto [`UserRecord`]s, checking that the required columns exist
pub fn records_from_sheet(sheet: &RawSheet) -> Result<Vec<UserRecord>> {
    if sheet.headers.is_empty() {
        return Err(ReportError::EmptySheet);
    }

    let columns = Columns::new(&sheet.headers);
    columns.require(&REQUIRED_COLUMNS)?;

    let records: Vec<UserRecord> = sheet
        .rows
        .iter()
        .filter(|row| !row.iter().all(RawValue::is_empty))
        .map(|row| UserRecord {
            report_date: extract_report_date(&columns.get(row, "id").to_text()),
            user_id: columns.get(row, "user_id").to_text(),
            login: columns.get(row, "login").to_text(),
            status: columns.get(row, "status").to_text(),
            registration_date: columns.get(row, "registration_date").to_date(),
            last_login: columns.get(row, "last_login_date").to_datetime(),
            logged_in_day: columns.get(row, "logged_in_day").to_flag(),
            have_bet: columns.get(row, "have_bet").to_flag(),
            total_deposit_amount: columns.get(row, "total_deposit_amount").to_number(),
            total_withdrawal_amount: columns.get(row, "total_withdrawal_amount").to_number(),
            total_release_bonus_amount: columns.get(row, "total_release_bonus_amount").to_number(),
            total_bet_amount: columns.get(row, "total_bet_amount").to_number(),
            session_number: columns.get(row, "session_number").to_number(),
            session_time_minutes: columns.get(row, "session_time_minutes").to_number(),
        })
        .collect();

    if records.is_empty() {
        return Err(ReportError::EmptySheet);
    }

    Ok(records)
}
