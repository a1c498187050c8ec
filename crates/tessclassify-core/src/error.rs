//! Error types for tessclassify-core
//!
//! Provides a unified error type for all operations in the core crate.
//! Template files are trusted install data, so format violations carry
//! enough context to point at the broken component.
//!
//! # See also
//!
//! C Tesseract reports template problems via `tprintf()` and keeps going
//! with partial data. This module replaces that with Rust's
//! `Result<T, Error>` pattern and makes short reads fatal.

use thiserror::Error;

/// tessclassify-rs core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or inconsistent template data
    #[error("invalid template data: {0}")]
    InvalidFormat(String),

    /// Template file version this build does not read
    #[error("unsupported template version: {0}")]
    UnsupportedVersion(i32),

    /// Index out of bounds
    #[error("index out of bounds: {index} >= {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
