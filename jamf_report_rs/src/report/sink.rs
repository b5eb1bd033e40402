//! Output sinks: one xlsx workbook or one JSON document per run.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use report_common::Cell;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;

use super::Table;

/// Header fill.
pub const HEADER_FILL: u32 = 0xD5D8DC;

const MIN_COLUMN_WIDTH: usize = 8;
const MAX_COLUMN_WIDTH: usize = 80;

/// Receives finished tables and produces the output artifact.
pub trait RowSink {
    fn write_table(&mut self, table: &Table) -> Result<()>;

    /// Flush everything to the destination.
    fn finish(self) -> Result<()>;
}

pub struct XlsxSink {
    workbook: Workbook,
    path: PathBuf,
    header: Format,
    fills: HashMap<u32, Format>,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let header = Format::new()
            .set_bold()
            .set_font_size(16)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border_bottom(FormatBorder::Medium)
            .set_background_color(Color::RGB(HEADER_FILL));
        Self {
            workbook: Workbook::new(),
            path: path.into(),
            header,
            fills: HashMap::new(),
        }
    }
}

impl RowSink for XlsxSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let columns = table.columns();
        for rgb in table.palette() {
            self.fills
                .entry(rgb)
                .or_insert_with(|| Format::new().set_background_color(Color::RGB(rgb)));
        }

        let sheet = self.workbook.add_worksheet();
        sheet
            .set_name(table.name())
            .with_context(|| format!("invalid sheet name '{}'", table.name()))?;

        let mut widths: Vec<usize> = columns.iter().map(|c| header_width(c)).collect();
        for (col, name) in columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, &self.header)?;
        }
        sheet.set_row_height(0, 30)?;
        sheet.set_freeze_panes(1, 0)?;

        let row_fills = table.row_fills();
        for (idx, (row, rgb)) in table.rows().iter().zip(row_fills).enumerate() {
            let excel_row = idx as u32 + 1;
            let fill = rgb.and_then(|rgb| self.fills.get(&rgb));
            for (col, name) in columns.iter().enumerate() {
                let cell = row.get(name).cloned().unwrap_or_default();
                widths[col] = widths[col].max(cell.to_text().chars().count());
                write_cell(sheet, excel_row, col as u16, &cell, fill)?;
            }
        }

        for (col, width) in widths.into_iter().enumerate() {
            let width = (width + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
            sheet.set_column_width(col as u16, width as f64)?;
        }
        tracing::debug!("wrote sheet '{}' ({} rows)", table.name(), table.len());
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.workbook
            .save(&self.path)
            .with_context(|| format!("failed to save workbook {}", self.path.display()))?;
        Ok(())
    }
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    fill: Option<&Format>,
) -> Result<()> {
    match (cell, fill) {
        (Cell::Empty, None) => {}
        (Cell::Empty, Some(format)) => {
            sheet.write_blank(row, col, format)?;
        }
        (Cell::Int(v), None) => {
            sheet.write_number(row, col, *v as f64)?;
        }
        (Cell::Int(v), Some(format)) => {
            sheet.write_number_with_format(row, col, *v as f64, format)?;
        }
        (Cell::Text(s), None) => {
            sheet.write_string(row, col, s)?;
        }
        (Cell::Text(s), Some(format)) => {
            sheet.write_string_with_format(row, col, s, format)?;
        }
    }
    Ok(())
}

/// Header text is 16pt bold; give it roughly 1.5x the characters of body text.
fn header_width(name: &str) -> usize {
    name.chars().count() * 3 / 2
}

/// Where the JSON document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonTarget {
    File(PathBuf),
    Stdout,
}

#[derive(Debug, Serialize)]
struct JsonSheet {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDocument<'a> {
    generated_at: String,
    sheets: &'a [JsonSheet],
}

pub struct JsonSink {
    target: JsonTarget,
    sheets: Vec<JsonSheet>,
}

impl JsonSink {
    pub fn new(target: JsonTarget) -> Self {
        Self {
            target,
            sheets: Vec::new(),
        }
    }
}

impl RowSink for JsonSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let columns = table.columns();
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        self.sheets.push(JsonSheet {
            name: table.name().to_string(),
            columns: columns.into_iter().map(str::to_string).collect(),
            rows,
        });
        Ok(())
    }

    fn finish(self) -> Result<()> {
        let document = JsonDocument {
            generated_at: chrono::Local::now().to_rfc3339(),
            sheets: &self.sheets,
        };
        let json = serde_json::to_string_pretty(&document).context("failed to encode report")?;
        match &self.target {
            JsonTarget::File(path) => std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            JsonTarget::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{json}").context("failed to write report to stdout")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_common::ReportRow;

    fn sample_table() -> Table {
        Table::new("Jamf Scripts To Policy Info")
            .highlight("Type", "Script Not Used", 0x82E0AA)
            .with_rows([
                ReportRow::new()
                    .with("Type", "Script Used")
                    .with("Script ID", 1)
                    .with("Policy Name", "Nightly"),
                ReportRow::new().with("Type", "Script Not Used").with("Script ID", 2),
            ])
    }

    #[test]
    fn json_sink_writes_sheets_with_aligned_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut sink = JsonSink::new(JsonTarget::File(path.clone()));
        sink.write_table(&sample_table()).unwrap();
        sink.finish().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let sheet = &doc["sheets"][0];
        assert_eq!(sheet["name"], "Jamf Scripts To Policy Info");
        assert_eq!(
            sheet["columns"],
            serde_json::json!(["Type", "Script ID", "Policy Name"])
        );
        assert_eq!(
            sheet["rows"][1],
            serde_json::json!(["Script Not Used", 2, ""])
        );
        assert!(doc["generatedAt"].is_string());
    }

    #[test]
    fn xlsx_sink_creates_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        let mut sink = XlsxSink::new(&path);
        sink.write_table(&sample_table()).unwrap();
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn header_width_scales_with_name() {
        assert_eq!(header_width("Type"), 6);
        assert!(header_width("Computer Local Account Real Name") > 40);
    }
}
