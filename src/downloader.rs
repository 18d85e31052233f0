use crate::error::{ReportError, Result};
use crate::report::{Table, TableValue};
use serde::Deserialize;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Name of the single sheet in every exported workbook
pub const SHEET_NAME: &str = "Datos";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
            ExportFormat::Csv => CSV_CONTENT_TYPE,
        }
    }
}

/// Download file name for a table, e.g. `nuevos_usuarios.xlsx`
pub fn file_name(table: &Table, format: ExportFormat) -> String {
    format!("{}.{}", table.kind.file_stem(), format.extension())
}

/// Export a table in the requested format
pub fn export(table: &Table, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => to_xlsx(table),
        ExportFormat::Csv => to_csv(table),
    }
}

/// Convert a detail table to CSV
///
/// The header row comes first; numbers are written without a trailing
/// fraction when they are integral and blank cells stay empty.
///
/// # Examples
/// ```
/// use daily_report::downloader::to_csv;
/// use daily_report::report::{Table, TableKind, TableValue};
///
/// let table = Table {
///     kind: TableKind::NewUsers,
///     title: "Nuevos usuarios".to_string(),
///     empty_message: None,
///     headers: vec!["User ID".to_string()],
///     rows: vec![vec![TableValue::Text("42".to_string())]],
/// };
/// let csv = to_csv(&table).unwrap();
/// assert_eq!(String::from_utf8(csv).unwrap(), "User ID\n42\n");
/// ```
pub fn to_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(TableValue::display))?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}

/// Convert a detail table to XLSX
///
/// The workbook holds one sheet named [`SHEET_NAME`] with a bold header row.
/// Numeric cells are stored as numbers so they stay usable in formulas.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (c, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header.as_str(), &header_format)?;
        worksheet.set_column_width(c as u16, (header.chars().count() + 4) as f64)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                TableValue::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                TableValue::Text(s) => {
                    worksheet.write_string(r, c, s.as_str())?;
                }
                TableValue::Empty => {}
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TableKind;

    fn table(rows: Vec<Vec<TableValue>>) -> Table {
        Table {
            kind: TableKind::LoginNoBet,
            title: "t".to_string(),
            empty_message: None,
            headers: vec!["User ID".into(), "Login".into(), "Monto".into()],
            rows,
        }
    }

    #[test]
    fn csv_quotes_and_blanks() {
        let t = table(vec![vec![
            TableValue::Text("7".into()),
            TableValue::Text("pérez, ana".into()),
            TableValue::Empty,
        ]]);
        let csv = String::from_utf8(to_csv(&t).unwrap()).unwrap();
        assert_eq!(csv, "User ID,Login,Monto\n7,\"pérez, ana\",\n");
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let t = table(vec![vec![
            TableValue::Text("7".into()),
            TableValue::Text("ana".into()),
            TableValue::Number(12.5),
        ]]);
        let bytes = to_xlsx(&t).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn xlsx_reads_back_with_sheet_and_cells() {
        use calamine::{Data, Reader, open_workbook_auto_from_rs};
        use std::io::Cursor;

        let t = table(vec![vec![
            TableValue::Text("7".into()),
            TableValue::Text("ana".into()),
            TableValue::Number(12.5),
        ]]);
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(to_xlsx(&t).unwrap())).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_size(), (2, 3));
        assert_eq!(range.get((0, 0)), Some(&Data::String("User ID".into())));
        assert_eq!(range.get((0, 2)), Some(&Data::String("Monto".into())));
        assert_eq!(range.get((1, 1)), Some(&Data::String("ana".into())));
        assert_eq!(range.get((1, 2)), Some(&Data::Float(12.5)));
    }

    #[test]
    fn empty_table_still_exports_headers() {
        let csv = String::from_utf8(to_csv(&table(Vec::new())).unwrap()).unwrap();
        assert_eq!(csv, "User ID,Login,Monto\n");
        assert!(!to_xlsx(&table(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn file_names_follow_table_kind() {
        let t = table(Vec::new());
        assert_eq!(file_name(&t, ExportFormat::Xlsx), "usuarios_login_no_jugaron.xlsx");
        assert_eq!(file_name(&t, ExportFormat::Csv), "usuarios_login_no_jugaron.csv");
    }
}
