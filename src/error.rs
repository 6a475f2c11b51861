//! Error types for the fallible steps underneath the total engine surface.
//!
//! `engine::resolve_moment` and `schedule::next_wakeup` turn these into
//! fallbacks; only the loader hands them to callers.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or decoding the prayer-time table
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read prayer table from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("prayer table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prayer table root must be a JSON object")]
    NotAnObject,

    #[error("no readable prayer table among {0} candidate path(s)")]
    Unavailable(usize),
}

/// A time-of-day field that is not `H:MM` / `HH:MM`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("time is blank")]
    Blank,

    #[error("time '{0}' must have exactly one ':' separator")]
    Arity(String),

    #[error("time '{0}' has a non-numeric component")]
    NotNumeric(String),

    #[error("time '{0}' is out of range")]
    OutOfRange(String),
}

/// Unexpected state inside the engine, mapped to the degraded result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("city has no daily records")]
    EmptyCity,

    #[error("record index {index} out of range for {len} record(s)")]
    IndexOutOfRange { index: usize, len: usize },
}
