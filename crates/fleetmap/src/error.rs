//! Error types for fleet map operations.

use thiserror::Error;

/// A specialized `Result` type for fleet map operations.
pub type Result<T> = std::result::Result<T, FleetmapError>;

/// Errors that can occur while building, encoding or decoding a fleet map.
///
/// Placement queries never produce an error: an unsatisfiable rule yields
/// `None`, which callers must distinguish from a malformed request.
#[derive(Debug, Error)]
pub enum FleetmapError {
    /// A bucket option string does not follow the `/key:value/...` syntax.
    #[error("invalid bucket path {path:?}: {reason}")]
    PathFormat {
        /// The offending path string.
        path: String,
        /// What exactly is wrong with it.
        reason: &'static str,
    },

    /// A node was added with the wrong number of options for the declared schema.
    #[error("schema mismatch: expected {expected} options, got {actual}")]
    SchemaMismatch {
        /// Number of options the schema declares.
        expected: usize,
        /// Number of options supplied by the caller.
        actual: usize,
    },

    /// The binary decoder ran out of input before a length prefix was satisfied.
    #[error("short read decoding {what}: need {expected} bytes, have {actual}")]
    DecodeShort {
        /// The field being decoded.
        what: &'static str,
        /// Bytes the length prefix announced.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The binary decoder encountered a negative length prefix.
    #[error("invalid length prefix for {what}: {len}")]
    InvalidLength {
        /// The field being decoded.
        what: &'static str,
        /// The announced length.
        len: i32,
    },

    /// A bucket tree failed its structural invariants.
    #[error("bucket tree invariant violated under {key}:{value}")]
    InvariantViolated {
        /// Key of the offending bucket.
        key: String,
        /// Value of the offending bucket.
        value: String,
    },
}
