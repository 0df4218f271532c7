//! Domain errors for the cross-validation pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by divenet itself (as opposed to I/O or framework failures,
/// which travel as `anyhow::Error` with context attached)
#[derive(Error, Debug)]
pub enum DivenetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File {path:?} does not carry a '{prefix}<window>_reduced' token")]
    FilePattern { path: PathBuf, prefix: String },

    #[error("Missing required column '{column}' in {path:?}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("No usable rows in {0:?}")]
    EmptyDataset(PathBuf),

    #[error("Cross-validation needs at least two subjects, found {found}")]
    TooFewSubjects { found: usize },

    #[error("Window {window}: folds failed for subjects {subjects:?}")]
    FoldsFailed { window: String, subjects: Vec<String> },

    #[error("Input width mismatch: expected {expected} features, got {actual}")]
    InputWidthMismatch { expected: usize, actual: usize },
}
