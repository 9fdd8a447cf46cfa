//! Error types for cycle-log analysis.

use std::path::PathBuf;

use thiserror::Error;

pub type StatsResult<T> = Result<T, StatsError>;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("scheduler log path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad timestamp {timestamp:?} in {file}")]
    BadTimestamp { file: String, timestamp: String },
}
