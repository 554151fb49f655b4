//! CLI command handlers

pub mod commands;

pub use commands::{serve, sheets, split};
