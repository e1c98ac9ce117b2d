//! Error types for retrieval and scoring.

use thiserror::Error;

/// The error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Underlying file or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest, segment info or wire frame could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A term dictionary could not be built or opened.
    #[error("term dictionary error: {0}")]
    Fst(#[from] fst::Error),

    /// A postings block was truncated or failed validation.
    #[error("corrupt postings block: {0}")]
    CorruptBlock(String),

    /// Two scores for different documents were added together.
    #[error("document ids differ ({left} vs {right}), cannot combine scores")]
    ScoreMismatch {
        /// Document id of the receiving score.
        left: u32,
        /// Document id of the score being added.
        right: u32,
    },

    /// Two scores for different logical documents were version-resolved.
    #[error("document hashes differ ({left:#x} vs {right:#x}), cannot take latest version")]
    HashMismatch {
        /// Hash of the incumbent score.
        left: u64,
        /// Hash of the challenger score.
        right: u64,
    },

    /// A remote read session failed or returned an error.
    #[error("remote session error: {0}")]
    Remote(String),

    /// The search was abandoned before it completed.
    #[error("search cancelled")]
    Cancelled,

    /// Every live segment failed, so there is nothing to answer from.
    #[error("no segment could be searched")]
    NoReachableSegments,

    /// The query tree is structurally invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// An argument was outside its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Index-level failure (layout, manifest, segment state).
    #[error("index error: {0}")]
    Index(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create an index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        TesseraError::Index(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidArgument(msg.into())
    }

    /// Create an invalid query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidQuery(msg.into())
    }

    /// Create a not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        TesseraError::NotFound(msg.into())
    }

    /// Create a corrupt block error.
    pub fn corrupt_block<S: Into<String>>(msg: S) -> Self {
        TesseraError::CorruptBlock(msg.into())
    }

    /// Create a remote session error.
    pub fn remote<S: Into<String>>(msg: S) -> Self {
        TesseraError::Remote(msg.into())
    }

    /// Create a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(msg.into())
    }

    /// Whether this error means a segment's store or remote session could not
    /// be read, as opposed to a problem with the query itself.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            TesseraError::Remote(_) | TesseraError::Io(_) | TesseraError::Index(_)
        )
    }

    /// Whether this error is a combination contract violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TesseraError::ScoreMismatch { .. } | TesseraError::HashMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_classification() {
        let err = TesseraError::ScoreMismatch { left: 1, right: 2 };
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("1 vs 2"));

        let err = TesseraError::HashMismatch { left: 0xa, right: 0xb };
        assert!(err.is_contract_violation());

        assert!(!TesseraError::corrupt_block("short").is_contract_violation());
    }

    #[test]
    fn test_session_failure_classification() {
        assert!(TesseraError::remote("connection refused").is_session_failure());
        assert!(TesseraError::index("missing segment").is_session_failure());
        assert!(!TesseraError::invalid_argument("bad budget").is_session_failure());
        assert!(!TesseraError::not_found("document 7").is_session_failure());
        assert!(!TesseraError::Cancelled.is_session_failure());
        assert!(!TesseraError::HashMismatch { left: 1, right: 2 }.is_session_failure());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: TesseraError = io.into();
        assert!(matches!(err, TesseraError::Io(_)));
    }
}
