use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use log::{error, info};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::{Deserialize, Serialize};

use crate::batch::ProvisioningOutcome;
use crate::identity::{AccountRecord, InputRow};
use crate::utils::{normalize_string, with_default_extension};

const SUCCESS_HEADER: &str = "Created";
const ERROR_HEADER: &str = "Error";

/// 0-based column of every field in the source worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub handle: usize,
    pub surname: usize,
    pub password: usize,
    pub full_name: usize,
    #[serde(default)]
    pub phone: Option<usize>,
    pub transliterated_surname: usize,
    pub group_year: usize,
    pub email: usize,
    pub success: usize,
    pub error: usize,
}

/// Built-in column layouts of the known input templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPreset {
    /// handle, surname, password, full name, transliterated surname, group/year, email
    #[default]
    Legacy,
    /// Same as legacy with a phone column after the full name.
    Phone,
}

impl FromStr for LayoutPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(LayoutPreset::Legacy),
            "phone" => Ok(LayoutPreset::Phone),
            other => Err(anyhow::anyhow!(
                "Unknown layout '{other}'. Expected one of: legacy, phone"
            )),
        }
    }
}

impl LayoutPreset {
    pub fn layout(self) -> ColumnLayout {
        match self {
            LayoutPreset::Legacy => ColumnLayout {
                handle: 0,
                surname: 1,
                password: 2,
                full_name: 3,
                phone: None,
                transliterated_surname: 4,
                group_year: 5,
                email: 6,
                success: 7,
                error: 8,
            },
            LayoutPreset::Phone => ColumnLayout {
                handle: 0,
                surname: 1,
                password: 2,
                full_name: 3,
                phone: Some(4),
                transliterated_surname: 5,
                group_year: 6,
                email: 7,
                success: 8,
                error: 9,
            },
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        LayoutPreset::default().layout()
    }
}

impl ColumnLayout {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file {}", path.display()))?;
        let layout: ColumnLayout = serde_json::from_str(&content)
            .with_context(|| format!("Invalid layout file {}", path.display()))?;
        layout.check_duplicates()?;
        return Ok(layout);
    }

    fn columns(&self) -> Vec<(&'static str, usize)> {
        let mut columns = vec![
            ("handle", self.handle),
            ("surname", self.surname),
            ("password", self.password),
            ("full_name", self.full_name),
            ("transliterated_surname", self.transliterated_surname),
            ("group_year", self.group_year),
            ("email", self.email),
            ("success", self.success),
            ("error", self.error),
        ];
        if let Some(phone) = self.phone {
            columns.push(("phone", phone));
        }
        columns
    }

    /// Reject layouts that map two fields onto the same column.
    pub fn check_duplicates(&self) -> Result<()> {
        let mut by_column: HashMap<usize, Vec<&str>> = HashMap::new();
        for (field, column) in self.columns() {
            by_column.entry(column).or_default().push(field);
        }

        let mut duplicates: Vec<String> = by_column
            .into_iter()
            .filter(|(_, fields)| fields.len() > 1)
            .map(|(column, fields)| format!("column {} is used by: {}", column + 1, fields.join(", ")))
            .collect();
        duplicates.sort();

        if duplicates.is_empty() {
            Ok(())
        } else {
            let message = format!(
                "Column layout maps several fields onto one column:\n{}",
                duplicates
                    .iter()
                    .map(|msg| format!("  • {msg}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
            error!("{message}");
            Err(anyhow::anyhow!(message))
        }
    }
}

/// One worksheet, with cells at their absolute positions.
#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub name: String,
    pub rows: Vec<Vec<Data>>,
}

/// Every worksheet of the input workbook in its original order. `source` is the
/// index of the sheet the accounts are read from.
#[derive(Debug, Clone)]
pub struct SourceWorkbook {
    pub sheets: Vec<SourceSheet>,
    pub source: usize,
}

impl SourceWorkbook {
    pub fn source_sheet(&self) -> &SourceSheet {
        &self.sheets[self.source]
    }

    pub fn sheet(&self, name: &str) -> Option<&SourceSheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }
}

pub fn excel_datetime_to_chrono(dt: &calamine::ExcelDateTime) -> Option<chrono::NaiveDateTime> {
    use chrono::{Duration, NaiveDate};
    let excel_base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let value = dt.as_f64();
    let days = value as i64;
    let seconds = ((value - days as f64) * 86400.0).round() as i64;
    Some(excel_base + Duration::days(days) + Duration::seconds(seconds))
}

/// Text value of a cell. Whole numbers lose their `.0` so `2024.0` reads as `2024`.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_datetime_to_chrono(dt)
            .map(|datetime| datetime.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn cell_at(row: &[Data], column: usize) -> String {
    row.get(column).map(cell_to_string).unwrap_or_default()
}

/// Pad a calamine range back to absolute worksheet coordinates.
fn absolute_rows(range: &Range<Data>) -> Vec<Vec<Data>> {
    let (start_row, start_col) = match range.start() {
        Some((row, col)) => (row as usize, col as usize),
        None => return Vec::new(),
    };

    let mut rows: Vec<Vec<Data>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut absolute = vec![Data::Empty; start_col];
        absolute.extend(row.iter().cloned());
        rows.push(absolute);
    }
    rows
}

/// Row Extractor: data rows below the header, up to the first empty surname.
pub fn extract_rows(rows: &[Vec<Data>], layout: &ColumnLayout) -> Vec<InputRow> {
    let mut extracted = Vec::new();

    for (row_index, row) in rows.iter().enumerate().skip(1) {
        let surname = normalize_string(&cell_at(row, layout.surname));
        if surname.is_empty() {
            break;
        }

        extracted.push(InputRow {
            row_index,
            surname,
            password: cell_at(row, layout.password),
            full_name: normalize_string(&cell_at(row, layout.full_name)),
            phone: layout
                .phone
                .map(|column| cell_at(row, column).trim().to_string())
                .filter(|phone| !phone.is_empty()),
            group_year: cell_at(row, layout.group_year).trim().to_string(),
        });
    }

    extracted
}

/// Open `path` and read every sheet. The accounts come from the named sheet, or the first one.
pub fn read_source_workbook(path: &Path, sheet_name: Option<&str>) -> Result<SourceWorkbook> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let names = workbook.sheet_names();
    let source = match sheet_name {
        Some(name) => names.iter().position(|candidate| candidate == name).ok_or_else(|| {
            anyhow::anyhow!("Sheet '{}' not found in {}", name, path.display())
        })?,
        None if names.is_empty() => {
            return Err(anyhow::anyhow!("Workbook {} has no worksheets", path.display()));
        }
        None => 0,
    };

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                return Err(anyhow::anyhow!("Error reading sheet '{}': {}", name, e));
            }
        };
        sheets.push(SourceSheet {
            rows: absolute_rows(&range),
            name,
        });
    }

    info!(
        "Workbook {} loaded ({} sheet(s), reading '{}')",
        path.display(),
        sheets.len(),
        sheets[source].name
    );
    Ok(SourceWorkbook { sheets, source })
}

pub fn read_input_rows(
    path: &Path,
    sheet_name: Option<&str>,
    layout: &ColumnLayout,
) -> Result<(SourceWorkbook, Vec<InputRow>)> {
    let workbook = read_source_workbook(path, sheet_name)?;
    let rows = extract_rows(&workbook.source_sheet().rows, layout);
    Ok((workbook, rows))
}

/// `result` -> `result.xlsx`; paths that already carry an extension are kept.
pub fn output_path(path: &Path) -> PathBuf {
    with_default_extension(path, "xlsx")
}

/// Copy `rows` into `worksheet`, leaving out the cells `skip` selects.
fn copy_cells(
    worksheet: &mut Worksheet,
    rows: &[Vec<Data>],
    skip: impl Fn(usize, usize) -> bool,
) -> Result<()> {
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm");

    for (row_index, row) in rows.iter().enumerate() {
        let r = u32::try_from(row_index)?;
        for (column, cell) in row.iter().enumerate() {
            if skip(row_index, column) {
                continue;
            }
            let c = u16::try_from(column)?;
            match cell {
                Data::Empty => {}
                Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Data::Float(f) => {
                    worksheet.write_number(r, c, *f)?;
                }
                Data::Int(i) => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                Data::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Data::DateTime(dt) => {
                    worksheet.write_number_with_format(r, c, dt.as_f64(), &date_format)?;
                }
                Data::Error(e) => {
                    worksheet.write_string(r, c, e.to_string())?;
                }
            }
        }
    }
    Ok(())
}

/// Fill derived fields and per-row outcomes into the copy of the source sheet.
fn fill_outcomes(
    worksheet: &mut Worksheet,
    sheet: &SourceSheet,
    layout: &ColumnLayout,
    records: &[AccountRecord],
    outcomes: &[ProvisioningOutcome],
) -> Result<()> {
    let header_empty = |column: usize| {
        sheet
            .rows
            .first()
            .and_then(|header| header.get(column))
            .is_none_or(|cell| matches!(cell, Data::Empty))
    };
    if header_empty(layout.success) {
        worksheet.write_string(0, u16::try_from(layout.success)?, SUCCESS_HEADER)?;
    }
    if header_empty(layout.error) {
        worksheet.write_string(0, u16::try_from(layout.error)?, ERROR_HEADER)?;
    }

    for record in records {
        let r = u32::try_from(record.row_index)?;
        worksheet.write_string(r, u16::try_from(layout.handle)?, &record.login_handle)?;
        worksheet.write_string(
            r,
            u16::try_from(layout.transliterated_surname)?,
            &record.transliterated_surname,
        )?;
        worksheet.write_string(r, u16::try_from(layout.email)?, &record.email)?;
    }

    for outcome in outcomes {
        let r = u32::try_from(outcome.row_index)?;
        worksheet.write_string(r, u16::try_from(layout.success)?, outcome.marker())?;
        if let Some(message) = &outcome.error_message {
            worksheet.write_string(r, u16::try_from(layout.error)?, message)?;
        }
    }
    Ok(())
}

/// Re-save the whole workbook. Every sheet is copied as-is, and the source sheet
/// also gets the derived fields and per-row outcomes.
pub fn write_outcomes(
    input: &SourceWorkbook,
    output: &Path,
    layout: &ColumnLayout,
    records: &[AccountRecord],
    outcomes: &[ProvisioningOutcome],
) -> Result<PathBuf> {
    let output = output_path(output);
    let outcome_rows: HashSet<usize> = outcomes.iter().map(|outcome| outcome.row_index).collect();

    let mut workbook = Workbook::new();
    for (index, sheet) in input.sheets.iter().enumerate() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        if index != input.source {
            copy_cells(worksheet, &sheet.rows, |_, _| false)?;
            continue;
        }

        // Stale outcomes from an earlier run are replaced.
        copy_cells(worksheet, &sheet.rows, |row, column| {
            outcome_rows.contains(&row) && (column == layout.success || column == layout.error)
        })?;
        fill_outcomes(worksheet, sheet, layout, records, outcomes)?;
    }

    workbook
        .save(&output)
        .with_context(|| format!("Failed to save Excel file: {}", output.display()))?;
    info!("Results saved to {}", output.display());

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Data {
        Data::String(value.to_string())
    }

    fn legacy_row(handle: &str, surname: &str, group_year: Data) -> Vec<Data> {
        vec![
            text(handle),
            text(surname),
            text("Secret#1"),
            text(&format!("{surname}  Иван ")),
            Data::Empty,
            group_year,
            Data::Empty,
        ]
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(2024.0)), "2024");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(24)), "24");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&text("IT24")), "IT24");
    }

    #[test]
    fn test_extract_stops_at_first_empty_surname() {
        let rows = vec![
            vec![text("cname"), text("surname")],
            legacy_row("", "Иванов", Data::Float(2024.0)),
            legacy_row("", "Петров", Data::Float(2024.0)),
            legacy_row("", " ", Data::Float(2024.0)),
            legacy_row("", "Сидоров", Data::Float(2024.0)),
        ];

        let extracted = extract_rows(&rows, &ColumnLayout::default());
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].row_index, 1);
        assert_eq!(extracted[0].surname, "Иванов");
        assert_eq!(extracted[0].full_name, "Иванов Иван");
        assert_eq!(extracted[0].group_year, "2024");
        assert_eq!(extracted[1].surname, "Петров");
    }

    #[test]
    fn test_extract_short_rows_and_phone_column() {
        let layout = LayoutPreset::Phone.layout();
        let rows = vec![
            vec![text("header")],
            vec![
                Data::Empty,
                text("Иванов"),
                text("pw"),
                text("Иванов Иван"),
                Data::Float(79000000000.0),
                Data::Empty,
                text("IT24"),
            ],
            vec![Data::Empty, text("Петров")],
        ];

        let extracted = extract_rows(&rows, &layout);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].phone.as_deref(), Some("79000000000"));
        assert_eq!(extracted[0].group_year, "IT24");
        assert_eq!(extracted[1].phone, None);
        assert_eq!(extracted[1].password, "");
    }

    #[test]
    fn test_presets_have_no_duplicate_columns() {
        assert!(LayoutPreset::Legacy.layout().check_duplicates().is_ok());
        assert!(LayoutPreset::Phone.layout().check_duplicates().is_ok());
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let mut layout = LayoutPreset::Phone.layout();
        layout.phone = Some(layout.email);
        let err = layout.check_duplicates().unwrap_err().to_string();
        assert!(err.contains("column 8"));
        assert!(err.contains("email"));
        assert!(err.contains("phone"));
    }

    #[test]
    fn test_layout_preset_from_str() {
        assert_eq!("Phone".parse::<LayoutPreset>().unwrap(), LayoutPreset::Phone);
        assert!("wide".parse::<LayoutPreset>().is_err());
    }

    #[test]
    fn test_output_path_gets_extension() {
        assert_eq!(output_path(Path::new("result")), PathBuf::from("result.xlsx"));
        assert_eq!(output_path(Path::new("out.xlsx")), PathBuf::from("out.xlsx"));
    }
}
