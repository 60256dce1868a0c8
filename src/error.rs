use std::path::PathBuf;
use thiserror::Error;

/// Failures while persisting or reading session records. None of them touch
/// the in-memory session, so a save can simply be retried.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode record: {0}")]
    Encode(#[from] csv::Error),

    #[error("malformed record: {0}")]
    Malformed(String),
}
