//! Sheet Splitter - split an Excel workbook into one workbook per sheet
//!
//! Each extracted sheet becomes a standalone `.xlsx` that keeps the source
//! cell values, formula text, per-cell styles, column widths, row heights
//! and merged ranges.
//!
//! # Features
//!
//! - `.xlsx` and `.xls` sources
//! - Filesystem-safe, collision-free output names
//! - Single workbook or ZIP bundle output
//! - HTTP service with upload sessions and time-based eviction
//!
//! # Example
//!
//! ```no_run
//! use sheet_splitter::archive;
//! use sheet_splitter::excel::extract_path;
//! use std::path::Path;
//!
//! let sheets = vec!["Sales".to_string(), "Expenses".to_string()];
//! let extraction = extract_path(Path::new("book.xlsx"), &sheets, "book")?;
//! for file in &extraction.files {
//!     println!("{} -> {} bytes", file.name, file.bytes.len());
//! }
//!
//! let output = archive::package(extraction, "book")?;
//! println!("Download: {}", output.file_name());
//! # Ok::<(), sheet_splitter::error::SplitterError>(())
//! ```

pub mod api;
pub mod archive;
pub mod cli;
pub mod error;
pub mod excel;
pub mod naming;
pub mod session;

// Re-export commonly used types
pub use error::{SplitterError, SplitterResult};
pub use session::{Session, SessionRegistry};
