//! HTTP API
//!
//! Upload a workbook, pick sheets, download them as standalone workbooks.
//! Run with `sheet-splitter serve`.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_api_server, ApiConfig, AppState};
