//! Extraction orchestration
//!
//! Runs the cloner over a caller-selected list of sheets and names every
//! produced workbook uniquely.

use std::collections::HashSet;
use std::path::Path;

use tracing::{error, info, warn};

use super::cloner::clone_sheet;
use super::source::SourceWorkbook;
use crate::error::{SplitterError, SplitterResult};
use crate::naming::{resolve_duplicate, sanitize};

/// Upper bound on sheets requested in one extraction.
pub const MAX_SHEETS_PER_REQUEST: usize = 100;

/// One produced single-sheet workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFile {
    pub sheet: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSheet {
    pub sheet: String,
    pub reason: SkipReason,
}

/// Outcome of one extraction run, outputs in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub files: Vec<ExtractedFile>,
    pub skipped: Vec<SkippedSheet>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    /// Fail when nothing was produced.
    pub fn require_output(self) -> SplitterResult<Self> {
        if self.files.is_empty() {
            Err(SplitterError::NothingToExtract)
        } else {
            Ok(self)
        }
    }
}

/// Output file name for `sheet` of a workbook whose stem is `base_name`.
pub fn output_name(base_name: &str, sheet: &str) -> String {
    format!("{}_{}.xlsx", sanitize(base_name), sanitize(sheet))
}

/// Reject empty selections and selections longer than `max`.
pub fn validate_selection(sheets: &[String], max: usize) -> SplitterResult<()> {
    if sheets.is_empty() {
        return Err(SplitterError::Validation("No sheets selected".to_string()));
    }
    if sheets.len() > max {
        return Err(SplitterError::Validation(format!(
            "Too many sheets selected (max {})",
            max
        )));
    }
    Ok(())
}

/// Clone each requested sheet into its own workbook.
///
/// Unknown names and per-sheet failures are recorded in
/// [`Extraction::skipped`] and never abort the batch. An empty result is
/// returned as-is; callers turn it into an error with
/// [`Extraction::require_output`].
pub fn extract(
    workbook: &mut SourceWorkbook,
    sheets: &[String],
    base_name: &str,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut used: HashSet<String> = HashSet::new();

    for sheet in sheets {
        if !workbook.contains(sheet) {
            warn!(sheet = %sheet, "Sheet not found, skipping");
            extraction.skipped.push(SkippedSheet {
                sheet: sheet.clone(),
                reason: SkipReason::NotFound,
            });
            continue;
        }

        match extract_one(workbook, sheet) {
            Ok(bytes) => {
                let name = resolve_duplicate(&output_name(base_name, sheet), &used);
                used.insert(name.clone());
                info!(sheet = %sheet, file = %name, "Extracted sheet");
                extraction.files.push(ExtractedFile {
                    sheet: sheet.clone(),
                    name,
                    bytes,
                });
            }
            Err(e) => {
                error!(sheet = %sheet, error = %e, "Sheet extraction failed, skipping");
                extraction.skipped.push(SkippedSheet {
                    sheet: sheet.clone(),
                    reason: SkipReason::Failed(e.to_string()),
                });
            }
        }
    }

    extraction
}

fn extract_one(workbook: &mut SourceWorkbook, sheet: &str) -> SplitterResult<Vec<u8>> {
    let source = workbook.sheet(sheet)?;
    let mut cloned = clone_sheet(&source, sheet)?;
    cloned.to_bytes()
}

/// Open `path` and extract `sheets` from it.
pub fn extract_path(path: &Path, sheets: &[String], base_name: &str) -> SplitterResult<Extraction> {
    validate_selection(sheets, MAX_SHEETS_PER_REQUEST)?;
    let mut workbook = SourceWorkbook::open(path)?;
    extract(&mut workbook, sheets, base_name).require_output()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("sample_2sheets", "Sales"), "sample_2sheets_Sales.xlsx");
        assert_eq!(output_name("Q1 report", "Data !@#$"), "Q1_report_Data_____.xlsx");
        assert_eq!(output_name("2024년", "매출"), "2024년_매출.xlsx");
    }

    #[test]
    fn test_validate_selection_limits() {
        assert!(matches!(
            validate_selection(&[], MAX_SHEETS_PER_REQUEST),
            Err(SplitterError::Validation(_))
        ));

        let exactly_max: Vec<String> = (0..MAX_SHEETS_PER_REQUEST).map(|i| i.to_string()).collect();
        assert!(validate_selection(&exactly_max, MAX_SHEETS_PER_REQUEST).is_ok());

        let too_many: Vec<String> = (0..=MAX_SHEETS_PER_REQUEST).map(|i| i.to_string()).collect();
        assert!(matches!(
            validate_selection(&too_many, MAX_SHEETS_PER_REQUEST),
            Err(SplitterError::Validation(_))
        ));
    }

    #[test]
    fn test_require_output() {
        let empty = Extraction {
            files: vec![],
            skipped: vec![SkippedSheet {
                sheet: "Ghost".to_string(),
                reason: SkipReason::NotFound,
            }],
        };
        assert!(matches!(
            empty.require_output(),
            Err(SplitterError::NothingToExtract)
        ));

        let one = Extraction {
            files: vec![ExtractedFile {
                sheet: "Sales".to_string(),
                name: "book_Sales.xlsx".to_string(),
                bytes: vec![1, 2, 3],
            }],
            skipped: vec![],
        };
        assert_eq!(one.require_output().unwrap().names(), vec!["book_Sales.xlsx"]);
    }
}
