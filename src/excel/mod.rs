//! Excel sheet extraction
//!
//! - Read: `.xlsx` / `.xls` source workbooks (values via calamine, styling and
//!   layout via the package XML)
//! - Clone: one sheet into a fresh single-sheet workbook (rust_xlsxwriter)
//! - Extract: a selection of sheets into uniquely named outputs

pub mod cloner;
pub mod extractor;
pub mod format;
pub mod layout;
pub mod source;
pub mod styles;

pub use cloner::{clone_sheet, CloneReport, ClonedSheet};
pub use extractor::{
    extract, extract_path, output_name, validate_selection, ExtractedFile, Extraction, SkipReason,
    SkippedSheet, MAX_SHEETS_PER_REQUEST,
};
pub use source::{read_sheet_names, CellValue, SourceFormat, SourceSheet, SourceWorkbook};
