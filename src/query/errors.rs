//! Query ingestion errors.
//!
//! Three kinds, all terminal for the query being parsed:
//! envelope-level client errors (empty backtrace), term-level parse
//! errors (offending node's backtrace), and binary-decode failures.
//! Internal invariant violations are panics, not error values.

use thiserror::Error;

use crate::backtrace::BacktraceId;

/// Result type for query ingestion operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced to the caller of the ingestion core
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query envelope itself is malformed
    #[error("{message}")]
    Client { message: String },

    /// A term inside the query is malformed
    #[error("{message}")]
    Parse {
        message: String,
        bt: BacktraceId,
    },

    /// The binary stream ended early or carried unreadable data
    #[error("I/O error while decoding term stream: {0}")]
    Io(#[from] std::io::Error),

    /// A binary size field was out of range
    #[error("{message}")]
    Range { message: String },
}

impl QueryError {
    /// Envelope-level error; carries the empty backtrace
    pub fn client(message: impl Into<String>) -> Self {
        QueryError::Client {
            message: message.into(),
        }
    }

    /// Term-level error at the given backtrace
    pub fn parse(message: impl Into<String>, bt: BacktraceId) -> Self {
        QueryError::Parse {
            message: message.into(),
            bt,
        }
    }

    /// Out-of-range size in a binary stream
    pub fn range(message: impl Into<String>) -> Self {
        QueryError::Range {
            message: message.into(),
        }
    }

    /// Backtrace of the offending node; empty for non-term errors
    pub fn backtrace(&self) -> BacktraceId {
        match self {
            QueryError::Parse { bt, .. } => *bt,
            _ => BacktraceId::EMPTY,
        }
    }

    /// Stable error code for response encoding
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Client { .. } => "CLIENT_ERROR",
            QueryError::Parse { .. } => "PARSE_ERROR",
            QueryError::Io(_) => "IO_ERROR",
            QueryError::Range { .. } => "RANGE_ERROR",
        }
    }
}
