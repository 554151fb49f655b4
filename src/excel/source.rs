//! Source workbook access
//!
//! Values and formulas are read with calamine. For `.xlsx` files the package
//! is also opened directly to recover styling and layout, which calamine
//! does not expose.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use calamine::{open_workbook, Data, Range, Reader, Sheets, Xls, Xlsx};
use tracing::{debug, warn};

use super::layout::{CellRange, SheetLayout, XlsxPackage};
use super::styles::StyleTable;
use crate::error::{SplitterError, SplitterResult};
use crate::naming;

/// Container format of a source workbook, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xls,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => Some(SourceFormat::Xlsx),
            "xls" => Some(SourceFormat::Xls),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| naming::extension(&name.to_string_lossy()))
            .and_then(|ext| Self::from_extension(&ext))
    }
}

/// A cell value as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel serial date.
    DateTime(f64),
    /// Error value, kept as its display text (`#DIV/0!`, `#N/A`, ...).
    Error(String),
    /// Formula text without the leading `=`, plus the cached result.
    Formula { text: String, cached: Box<CellValue> },
}

impl CellValue {
    /// Cached result as Excel would display it in the formula's `<v>` element.
    pub fn result_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) | CellValue::DateTime(n) => n.to_string(),
            CellValue::Text(s) | CellValue::Error(s) => s.clone(),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Formula { cached, .. } => cached.result_text(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCell {
    pub value: CellValue,
    /// Index into the workbook's [`StyleTable`].
    pub style: Option<u32>,
}

/// Everything needed to clone one sheet, detached from the source file.
#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub name: String,
    /// Populated or styled cells keyed by 0-based (row, col).
    pub cells: BTreeMap<(u32, u16), SourceCell>,
    pub styles: Arc<StyleTable>,
    /// Stored OOXML widths for columns with an explicit width.
    pub column_widths: BTreeMap<u16, f64>,
    /// Heights in points for rows with an explicit height.
    pub row_heights: BTreeMap<u32, f64>,
    pub merges: Vec<CellRange>,
}

impl SourceSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            styles: Arc::new(StyleTable::default()),
            column_widths: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            merges: Vec::new(),
        }
    }
}

/// An opened source workbook.
pub struct SourceWorkbook {
    workbook: Sheets<BufReader<File>>,
    sheet_names: Vec<String>,
    package: Option<XlsxPackage<BufReader<File>>>,
    styles: Arc<StyleTable>,
}

impl SourceWorkbook {
    pub fn open<P: AsRef<Path>>(path: P) -> SplitterResult<Self> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path).ok_or_else(|| {
            SplitterError::Validation("Only XLSX or XLS files are supported".to_string())
        })?;
        Self::open_as(path, format)
    }

    /// Open `path` as `format` regardless of its extension.
    pub fn open_as<P: AsRef<Path>>(path: P, format: SourceFormat) -> SplitterResult<Self> {
        let path = path.as_ref();
        let workbook = match format {
            SourceFormat::Xlsx => Sheets::Xlsx(
                open_workbook::<Xlsx<_>, _>(path)
                    .map_err(|e| SplitterError::Workbook(e.to_string()))?,
            ),
            SourceFormat::Xls => Sheets::Xls(
                open_workbook::<Xls<_>, _>(path)
                    .map_err(|e| SplitterError::Workbook(e.to_string()))?,
            ),
        };
        let sheet_names = workbook.sheet_names();

        let package = match format {
            SourceFormat::Xlsx => match XlsxPackage::open(path) {
                Ok(package) => Some(package),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Styles unavailable, copying values only");
                    None
                }
            },
            SourceFormat::Xls => None,
        };
        let styles = Arc::new(
            package
                .as_ref()
                .map(|p| p.styles().clone())
                .unwrap_or_default(),
        );

        Ok(Self {
            workbook,
            sheet_names,
            package,
            styles,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Exact, case-sensitive lookup.
    pub fn contains(&self, name: &str) -> bool {
        self.sheet_names.iter().any(|n| n == name)
    }

    /// Read one sheet fully into memory.
    pub fn sheet(&mut self, name: &str) -> SplitterResult<SourceSheet> {
        if !self.contains(name) {
            return Err(SplitterError::SheetNotFound(name.to_string()));
        }

        let values = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| SplitterError::Workbook(format!("{}: {}", name, e)))?;

        let formulas = match self.workbook.worksheet_formula(name) {
            Ok(range) => range,
            Err(e) => {
                warn!(sheet = name, error = %e, "Formulas unavailable, copying cached values");
                Range::empty()
            }
        };

        let layout = self.layout(name);

        let mut sheet = SourceSheet::new(name);
        sheet.styles = Arc::clone(&self.styles);
        sheet.cells = merge_cells(&values, &formulas, &layout.cell_styles);
        sheet.column_widths = layout.column_widths;
        sheet.row_heights = layout.row_heights;
        sheet.merges = layout.merges;

        debug!(
            sheet = name,
            cells = sheet.cells.len(),
            merges = sheet.merges.len(),
            "Read source sheet"
        );
        Ok(sheet)
    }

    /// Layout is best-effort: a broken package part costs styling, not the sheet.
    fn layout(&mut self, name: &str) -> SheetLayout {
        match (&mut self.package, &self.workbook) {
            (Some(package), _) => package.sheet_layout(name).unwrap_or_else(|e| {
                warn!(sheet = name, error = %e, "Sheet layout unavailable");
                SheetLayout::default()
            }),
            (None, Sheets::Xls(xls)) => SheetLayout {
                merges: xls
                    .worksheet_merge_cells(name)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|dim| {
                        Some(CellRange::new(
                            dim.start.0,
                            u16::try_from(dim.start.1).ok()?,
                            dim.end.0,
                            u16::try_from(dim.end.1).ok()?,
                        ))
                    })
                    .collect(),
                ..SheetLayout::default()
            },
            _ => SheetLayout::default(),
        }
    }
}

/// Read only the ordered sheet inventory of the workbook at `path`.
pub fn read_sheet_names<P: AsRef<Path>>(path: P) -> SplitterResult<Vec<String>> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path).ok_or_else(|| {
        SplitterError::Validation("Only XLSX or XLS files are supported".to_string())
    })?;
    let names = match format {
        SourceFormat::Xlsx => open_workbook::<Xlsx<_>, _>(path)
            .map_err(|e| SplitterError::Workbook(e.to_string()))?
            .sheet_names(),
        SourceFormat::Xls => open_workbook::<Xls<_>, _>(path)
            .map_err(|e| SplitterError::Workbook(e.to_string()))?
            .sheet_names(),
    };
    Ok(names)
}

/// Join values, formulas and style indices into one sparse grid.
fn merge_cells(
    values: &Range<Data>,
    formulas: &Range<String>,
    styles: &BTreeMap<(u32, u16), u32>,
) -> BTreeMap<(u32, u16), SourceCell> {
    let mut cells = BTreeMap::new();

    let (row0, col0) = values.start().unwrap_or((0, 0));
    for (r, c, data) in values.used_cells() {
        let Some(key) = absolute(row0, col0, r, c) else {
            continue;
        };
        cells.insert(
            key,
            SourceCell {
                value: CellValue::from(data),
                style: None,
            },
        );
    }

    let mut formula_text: HashMap<(u32, u16), &str> = HashMap::new();
    let (row0, col0) = formulas.start().unwrap_or((0, 0));
    for (r, c, text) in formulas.used_cells() {
        if let Some(key) = absolute(row0, col0, r, c) {
            formula_text.insert(key, text.as_str());
        }
    }
    for (key, text) in formula_text {
        let cell = cells.entry(key).or_insert(SourceCell {
            value: CellValue::Empty,
            style: None,
        });
        let cached = std::mem::replace(&mut cell.value, CellValue::Empty);
        cell.value = CellValue::Formula {
            text: text.trim_start_matches('=').to_string(),
            cached: Box::new(cached),
        };
    }

    for (&key, &style) in styles {
        cells
            .entry(key)
            .or_insert(SourceCell {
                value: CellValue::Empty,
                style: None,
            })
            .style = Some(style);
    }

    cells
}

fn absolute(row0: u32, col0: u32, r: usize, c: usize) -> Option<(u32, u16)> {
    let row = row0.checked_add(u32::try_from(r).ok()?)?;
    let col = col0.checked_add(u32::try_from(c).ok()?)?;
    Some((row, u16::try_from(col).ok()?))
}
