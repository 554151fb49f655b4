//! Sheet cloning
//!
//! Copies one [`SourceSheet`] into a fresh single-sheet workbook: values,
//! formula text, per-cell styling, column widths, row heights and merged
//! ranges. Individual style facets, dimensions and merges that the writer
//! rejects are skipped and logged; only a failure to build the destination
//! grid fails the clone.

use std::collections::HashMap;

use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet, XlsxError};
use tracing::{debug, warn};

use super::format::build_format;
use super::layout::{stored_width_to_character_width, CellRange};
use super::source::{CellValue, SourceCell, SourceSheet};
use crate::error::{SplitterError, SplitterResult};

/// Excel's sheet title limit, in characters.
pub const MAX_SHEET_TITLE: usize = 31;

const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";
const DEFAULT_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// What a clone copied and what it had to leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneReport {
    pub cells: usize,
    pub styled_cells: usize,
    pub skipped_facets: usize,
    pub merges: usize,
    pub skipped_merges: usize,
    pub columns: usize,
    pub rows: usize,
}

/// A cloned, not yet serialized, workbook.
pub struct ClonedSheet {
    pub title: String,
    pub report: CloneReport,
    workbook: Workbook,
}

impl ClonedSheet {
    /// Serialize to `.xlsx` bytes.
    pub fn to_bytes(&mut self) -> SplitterResult<Vec<u8>> {
        Ok(self.workbook.save_to_buffer()?)
    }
}

/// Truncate a sheet title to the format limit.
pub fn sheet_title(name: &str) -> String {
    name.chars().take(MAX_SHEET_TITLE).collect()
}

/// Clone `source` into a new workbook whose only sheet is titled `sheet_name`.
pub fn clone_sheet(source: &SourceSheet, sheet_name: &str) -> SplitterResult<ClonedSheet> {
    let title = sheet_title(sheet_name);
    let mut report = CloneReport::default();
    let mut workbook = Workbook::new();

    {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&title)
            .map_err(|e| SplitterError::Clone(format!("cannot name sheet {:?}: {}", title, e)))?;

        let mut formats = FormatCache::new(source);

        // Merges go first. The writer pads each range with placeholder cells;
        // those the source never had are cleared and the cell pass below
        // rewrites the rest.
        for range in &source.merges {
            let result = apply_merge(worksheet, range);
            // An overlapping range is rejected only after its padding is written.
            if matches!(result, Ok(()) | Err(XlsxError::MergeRangeOverlaps(..))) {
                clear_placeholders(worksheet, range, source);
            }
            match result {
                Ok(()) => report.merges += 1,
                Err(e) => {
                    report.skipped_merges += 1;
                    debug!(sheet = %title, range = %range, error = %e, "Skipped merge");
                }
            }
        }

        for (&(row, col), cell) in &source.cells {
            let format = formats.get(cell, &mut report);
            if format.is_some() {
                report.styled_cells += 1;
            }
            write_cell(worksheet, row, col, &cell.value, format.as_ref())
                .map_err(|e| SplitterError::Clone(format!("cell ({}, {}): {}", row, col, e)))?;
            report.cells += 1;
        }

        for (&col, &width) in &source.column_widths {
            match worksheet.set_column_width(col, stored_width_to_character_width(width)) {
                Ok(_) => report.columns += 1,
                Err(e) => debug!(sheet = %title, col, error = %e, "Skipped column width"),
            }
        }

        for (&row, &height) in &source.row_heights {
            match worksheet.set_row_height(row, height) {
                Ok(_) => report.rows += 1,
                Err(e) => debug!(sheet = %title, row, error = %e, "Skipped row height"),
            }
        }
    }

    if report.skipped_facets > 0 || report.skipped_merges > 0 {
        warn!(
            sheet = %title,
            skipped_facets = report.skipped_facets,
            skipped_merges = report.skipped_merges,
            "Sheet cloned with partial formatting"
        );
    }

    Ok(ClonedSheet {
        title,
        report,
        workbook,
    })
}

fn apply_merge(worksheet: &mut Worksheet, range: &CellRange) -> Result<(), XlsxError> {
    worksheet.merge_range(
        range.first_row,
        range.first_col,
        range.last_row,
        range.last_col,
        "",
        &Format::new(),
    )?;
    Ok(())
}

fn clear_placeholders(worksheet: &mut Worksheet, range: &CellRange, source: &SourceSheet) {
    for row in range.first_row..=range.last_row {
        for col in range.first_col..=range.last_col {
            if !source.cells.contains_key(&(row, col)) {
                worksheet.clear_cell(row, col);
            }
        }
    }
}

/// One [`Format`] per distinct style index; facet failures are logged once.
struct FormatCache<'a> {
    source: &'a SourceSheet,
    built: HashMap<u32, Option<Format>>,
}

impl<'a> FormatCache<'a> {
    fn new(source: &'a SourceSheet) -> Self {
        Self {
            source,
            built: HashMap::new(),
        }
    }

    fn get(&mut self, cell: &SourceCell, report: &mut CloneReport) -> Option<Format> {
        let index = cell.style?;
        let source = self.source;
        self.built
            .entry(index)
            .or_insert_with(|| {
                let style = source.styles.get(index)?;
                let built = build_format(style);
                for (facet, error) in &built.skipped {
                    report.skipped_facets += 1;
                    debug!(style = index, %facet, %error, "Skipped style facet");
                }
                Some(built.format)
            })
            .clone()
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match (value, format) {
        (CellValue::Empty, Some(format)) => {
            worksheet.write_blank(row, col, format)?;
        }
        (CellValue::Empty, None) => {}
        (CellValue::Number(n), Some(format)) => {
            worksheet.write_number_with_format(row, col, *n, format)?;
        }
        (CellValue::Number(n), None) => {
            worksheet.write_number(row, col, *n)?;
        }
        (CellValue::Text(s) | CellValue::Error(s), Some(format)) => {
            worksheet.write_string_with_format(row, col, s, format)?;
        }
        (CellValue::Text(s) | CellValue::Error(s), None) => {
            worksheet.write_string(row, col, s)?;
        }
        (CellValue::Bool(b), Some(format)) => {
            worksheet.write_boolean_with_format(row, col, *b, format)?;
        }
        (CellValue::Bool(b), None) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        (CellValue::DateTime(serial), Some(format)) => {
            worksheet.write_number_with_format(row, col, *serial, format)?;
        }
        (CellValue::DateTime(serial), None) => {
            let format = Format::new().set_num_format(default_date_format(*serial));
            worksheet.write_number_with_format(row, col, *serial, &format)?;
        }
        (CellValue::Formula { text, cached }, format) => {
            let formula = Formula::new(text).set_result(cached.result_text());
            match format {
                Some(format) => worksheet.write_formula_with_format(row, col, formula, format)?,
                None => worksheet.write_formula(row, col, formula)?,
            };
        }
    }
    Ok(())
}

fn default_date_format(serial: f64) -> &'static str {
    if serial.fract() == 0.0 {
        DEFAULT_DATE_FORMAT
    } else {
        DEFAULT_DATETIME_FORMAT
    }
}
