//! Topology planning error types.

use thiserror::Error;

/// Result type alias for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors that can occur while planning a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The sizing request is contradictory or cannot be laid out on the
    /// given hosts. Fatal to the scenario; nothing has been executed.
    #[error("invalid cluster configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors from parsing a topology descriptor string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyParseError {
    #[error("missing ':' after host name in {0:?}")]
    MissingHost(String),

    #[error("empty host name in {0:?}")]
    EmptyHost(String),

    #[error("malformed server group {0:?}")]
    BadGroup(String),

    #[error("malformed mom entry {0:?}")]
    BadMom(String),

    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
}
