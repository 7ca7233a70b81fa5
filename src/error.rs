//! Error types for reading and merging a subject's recordings

use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that abort reading a subject.
///
/// A missing modality directory is not an error; the corresponding artifact
/// is simply absent from [`SubjectData`](crate::reader::SubjectData).
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("malformed trigger sequence at event {index}: {reason}")]
    MalformedTriggerSequence { index: usize, reason: String },

    #[error("trial count mismatch: {eeg} EEG trial onsets, {eye} eye-tracking trials")]
    TrialCountMismatch { eeg: usize, eye: usize },

    #[error(
        "expected exactly one *.{extension} file in {}, found {}: {candidates:?}",
        dir.display(),
        candidates.len()
    )]
    AmbiguousFileSet {
        dir: PathBuf,
        extension: String,
        candidates: Vec<PathBuf>,
    },

    #[error("no *.{extension} file found in {}", dir.display())]
    MissingDataFile { dir: PathBuf, extension: String },

    #[error("eye-tracking trial {trial} is missing {what}")]
    MissingTrialData { trial: usize, what: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failures reported by a reader or by the in-memory recording, with the
    /// context chain attached
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Result type for subject reading operations
pub type ReadResult<T> = Result<T, ReadError>;
