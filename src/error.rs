use thiserror::Error;

pub type SplitterResult<T> = Result<T, SplitterError>;

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read workbook: {0}")]
    Workbook(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet clone failed: {0}")]
    Clone(String),

    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No sheets could be extracted")]
    NothingToExtract,

    #[error("Session error: {0}")]
    Session(String),
}

impl From<quick_xml::Error> for SplitterError {
    fn from(e: quick_xml::Error) -> Self {
        SplitterError::Workbook(format!("malformed package XML: {}", e))
    }
}
