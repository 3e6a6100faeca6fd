//! Error types shared across the catalog.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Text table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error("No artist with key {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised by the image slot editor
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Cannot commit images without an artist id")]
    EmptyKey,

    #[error("Artist id cannot be used in a file name: {0}")]
    InvalidKey(String),

    #[error("No image slot {} (slots are 1 to 3)", .0 + 1)]
    InvalidSlot(usize),

    #[error("Unsupported image file (expected .png, .jpg or .jpeg): {}", .0.display())]
    UnsupportedImage(PathBuf),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode clipboard image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Field validation failures that block a save
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Artist id must not be empty")]
    MissingArtistId,

    #[error("Display name must not be empty")]
    MissingDisplayName,

    #[error("Artist id must not contain '/', '\\' or '..'")]
    InvalidArtistId,
}

/// Structural problems in a file being imported
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("The file has no worksheet to import")]
    EmptyWorkbook,
}
