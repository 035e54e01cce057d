//! Errors raised while combining intermediate records.
//!
//! The emitter never fails on bad input (it drops and counts), so every
//! variant here belongs to the reduce side or to I/O.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The count column was not a decimal integer.
    #[error("line {line}: invalid count `{value}`")]
    InvalidCount { line: u64, value: String },

    /// No tab separated the key from the count.
    #[error("line {line}: missing tab-separated count")]
    MissingCount { line: u64 },

    /// The key did not decode into the six request fields.
    #[error("malformed key `{key}`: expected {expected} fields, found {found}")]
    MalformedKey {
        key: String,
        expected: usize,
        found: usize,
    },

    /// A key arrived after a key that sorts after it, so the input was not
    /// grouped by key.
    #[error("input is not sorted by key: `{key}` arrived after `{previous}`")]
    OutOfOrder { previous: String, key: String },

    #[error("count overflow while accumulating `{key}`")]
    CountOverflow { key: String },

    #[error("combiner was already flushed")]
    CombinerFlushed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

