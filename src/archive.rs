//! Download packaging: one workbook as-is, several as a ZIP bundle.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SplitterResult;
use crate::excel::{ExtractedFile, Extraction};
use crate::naming::sanitize;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// What a split hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutput {
    Single(ExtractedFile),
    Archive { name: String, bytes: Vec<u8> },
}

impl SplitOutput {
    pub fn file_name(&self) -> &str {
        match self {
            SplitOutput::Single(file) => &file.name,
            SplitOutput::Archive { name, .. } => name,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            SplitOutput::Single(_) => XLSX_CONTENT_TYPE,
            SplitOutput::Archive { .. } => ZIP_CONTENT_TYPE,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            SplitOutput::Single(file) => file.bytes,
            SplitOutput::Archive { bytes, .. } => bytes,
        }
    }
}

/// Archive name for a multi-sheet split of the workbook stem `base_name`.
pub fn archive_name(base_name: &str) -> String {
    format!("{}_split.zip", sanitize(base_name))
}

/// A single output is returned directly; more than one is zipped.
///
/// Callers must not pass an empty extraction.
pub fn package(extraction: Extraction, base_name: &str) -> SplitterResult<SplitOutput> {
    let mut files = extraction.files;
    if files.len() == 1 {
        if let Some(file) = files.pop() {
            return Ok(SplitOutput::Single(file));
        }
    }

    Ok(SplitOutput::Archive {
        name: archive_name(base_name),
        bytes: zip_files(&files)?,
    })
}

/// Deflate `files` into an in-memory ZIP, entries in order.
pub fn zip_files(files: &[ExtractedFile]) -> SplitterResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        zip.start_file(file.name.as_str(), options)?;
        zip.write_all(&file.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use zip::ZipArchive;

    fn file(name: &str, bytes: &[u8]) -> ExtractedFile {
        ExtractedFile {
            sheet: name.to_string(),
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_single_file_is_not_zipped() {
        let extraction = Extraction {
            files: vec![file("book_Sales.xlsx", b"xlsx")],
            skipped: vec![],
        };
        let output = package(extraction, "book").unwrap();

        assert_eq!(output.file_name(), "book_Sales.xlsx");
        assert_eq!(output.content_type(), XLSX_CONTENT_TYPE);
        assert_eq!(output.into_bytes(), b"xlsx".to_vec());
    }

    #[test]
    fn test_multiple_files_are_zipped_in_order() {
        let extraction = Extraction {
            files: vec![file("a.xlsx", b"first"), file("b.xlsx", b"second")],
            skipped: vec![],
        };
        let output = package(extraction, "my book").unwrap();

        assert_eq!(output.file_name(), "my_book_split.zip");
        assert_eq!(output.content_type(), ZIP_CONTENT_TYPE);

        let mut archive = ZipArchive::new(Cursor::new(output.into_bytes())).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        let mut entry = archive.by_index(1).unwrap();
        assert_eq!(entry.name(), "b.xlsx");
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "second");
    }
}
