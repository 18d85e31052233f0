use std::io;

/// Errors produced while loading a daily export and building its report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write XLSX: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("the uploaded sheet has no data rows")]
    EmptySheet,

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("the 'id' column of the first row does not contain a report date")]
    MissingReportDate,
}

pub type Result<T> = std::result::Result<T, ReportError>;
