//! Report rendering to XLSX and PDF
//!
//! Reports are built as plain tables first and then rendered by one of
//! the writers, so the JSON, spreadsheet and PDF outputs stay in sync.

use anyhow::{Context, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_xlsxwriter::{Format, Workbook};

use dojo_types::{AttendanceRequest, AttendanceSummary, GoalReport, Order};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Cell::Number(n) => format!("{:.2}", n),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<u32> for Cell {
    fn from(n: u32) -> Self {
        Cell::Number(f64::from(n))
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(f64::from(n))
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,
    pub tables: Vec<Table>,
}

/// Supported `?export=` formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

pub fn render(report: &Report, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => to_xlsx(report),
        ExportFormat::Pdf => to_pdf(report),
    }
}

/// Worksheet name Excel accepts: no `[ ] : * ? / \`, no surrounding
/// apostrophes, at most 31 characters, never empty.
fn sheet_name(raw: &str, index: usize) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let name: String = cleaned.trim().trim_matches('\'').chars().take(31).collect();
    let name = name.trim().trim_end_matches('\'').to_string();
    if name.is_empty() {
        format!("Sheet{}", index + 1)
    } else {
        name
    }
}

/// One worksheet per table, bold header row
pub fn to_xlsx(report: &Report) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let mut used: Vec<String> = Vec::new();
    for (index, table) in report.tables.iter().enumerate() {
        let mut name = sheet_name(&table.name, index);
        // Sheet names are unique regardless of case
        if used.contains(&name.to_lowercase()) {
            let suffix = format!(" ({})", index + 1);
            name = name.chars().take(31 - suffix.len()).collect::<String>() + &suffix;
        }
        used.push(name.to_lowercase());

        let sheet = workbook.add_worksheet();
        sheet.set_name(name).context("Invalid worksheet name")?;

        for (col, header) in table.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => sheet.write_string(r, col as u16, s)?,
                    Cell::Number(n) => sheet.write_number(r, col as u16, *n)?,
                };
            }
        }
    }

    workbook.save_to_buffer().context("Failed to build workbook")
}

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const LINE: f32 = 6.0;

struct PdfCursor {
    layer: PdfLayerReference,
    y: f32,
}

/// A4 portrait, Helvetica, tables as fixed-width text columns
pub fn to_pdf(report: &Report) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(&report.title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("Failed to load PDF font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("Failed to load PDF font")?;

    let mut cursor = PdfCursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_H - MARGIN,
    };

    let write_line = |cursor: &mut PdfCursor, text: &str, size: f32, font: &IndirectFontRef| {
        if cursor.y < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            cursor.layer = doc.get_page(page).get_layer(layer);
            cursor.y = PAGE_H - MARGIN;
        }
        cursor.layer.use_text(text, size, Mm(MARGIN), Mm(cursor.y), font);
        cursor.y -= LINE;
    };

    write_line(&mut cursor, &report.title, 16.0, &bold);
    cursor.y -= LINE;

    for table in &report.tables {
        write_line(&mut cursor, &table.name, 12.0, &bold);
        write_line(&mut cursor, &table.headers.join(" | "), 9.0, &bold);
        for row in &table.rows {
            let line = row.iter().map(Cell::display).collect::<Vec<_>>().join(" | ");
            write_line(&mut cursor, &line, 9.0, &font);
        }
        cursor.y -= LINE;
    }

    doc.save_to_bytes().context("Failed to build PDF")
}

pub fn attendance_table(requests: &[AttendanceRequest]) -> Table {
    Table {
        name: "Requests".to_string(),
        headers: vec!["Date", "Student", "Class", "Type", "Status", "Reason", "Rejection reason"],
        rows: requests
            .iter()
            .map(|r| {
                vec![
                    r.attendance_date.to_string().into(),
                    r.student_name.clone().into(),
                    r.class_name.clone().into(),
                    r.class_type.as_str().into(),
                    r.status.as_str().into(),
                    r.reason.clone().into(),
                    r.rejection_reason.clone().into(),
                ]
            })
            .collect(),
    }
}

pub fn summary_table(summary: &AttendanceSummary) -> Table {
    let mut rows: Vec<Vec<Cell>> = summary
        .cells
        .iter()
        .filter(|c| c.counts.total() > 0)
        .map(|c| {
            vec![
                c.weekday.to_string().into(),
                c.class_type.as_str().into(),
                c.counts.approved.into(),
                c.counts.pending.into(),
                c.counts.rejected.into(),
                c.counts.cancelled.into(),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".into(),
        "".into(),
        summary.totals.approved.into(),
        summary.totals.pending.into(),
        summary.totals.rejected.into(),
        summary.totals.cancelled.into(),
    ]);

    Table {
        name: "Summary".to_string(),
        headers: vec!["Weekday", "Type", "Approved", "Pending", "Rejected", "Cancelled"],
        rows,
    }
}

pub fn orders_table(orders: &[Order]) -> Table {
    Table {
        name: "Orders".to_string(),
        headers: vec!["Requested", "Student", "Item", "Quantity", "Status", "Value"],
        rows: orders
            .iter()
            .map(|o| {
                vec![
                    o.requested_at.format("%Y-%m-%d %H:%M").to_string().into(),
                    o.student_name.clone().into(),
                    o.item_name.clone().into(),
                    o.quantity.into(),
                    o.status.as_str().into(),
                    o.final_value_cents
                        .map(|c| Cell::Number(c as f64 / 100.0))
                        .unwrap_or_else(|| "".into()),
                ]
            })
            .collect(),
    }
}

pub fn goal_table(report: &GoalReport) -> Table {
    Table {
        name: "Progress".to_string(),
        headers: vec!["Student", "Attended", "Frequency %", "Status"],
        rows: report
            .students
            .iter()
            .map(|s| {
                vec![
                    s.student_name.clone().into(),
                    s.attended.into(),
                    s.frequency_pct.into(),
                    s.status.as_str().into(),
                ]
            })
            .collect(),
    }
}
