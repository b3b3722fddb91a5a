//! Error types for scriptref operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading an abbreviation table.
///
/// These are fatal to session start: no text is rewritten until the table
/// loads cleanly. Line numbers are 1-based.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read abbreviation table {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected 2 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: blank canonical book name")]
    BlankName { line: usize },

    #[error("line {line}: duplicate canonical book name '{name}'")]
    DuplicateName { line: usize, name: String },

    #[error("line {line}: '{name}' has no abbreviations")]
    NoAbbreviations { line: usize, name: String },

    #[error("line {line}: '{name}' has an empty abbreviation")]
    EmptyAbbreviation { line: usize, name: String },

    #[error("line {line}: token '{token}' already belongs to '{owner}'")]
    ConflictingToken {
        line: usize,
        token: String,
        owner: String,
    },

    #[error("pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),
}

/// Internal inconsistency between a pattern and its capture groups.
///
/// Never surfaced to callers: the rewriter treats the span as unmatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("capture group '{0}' missing from match")]
    MissingGroup(&'static str),
}

/// Errors that can occur while processing documents.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("expected {expected} rewritten units, got {found}")]
    UnitMismatch { expected: usize, found: usize },

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
