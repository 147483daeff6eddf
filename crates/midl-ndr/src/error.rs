//! NDR error types

use thiserror::Error;

/// NDR encoding/decoding errors
///
/// Every variant is structural: the stub could not be produced or consumed,
/// so the call it belongs to cannot complete. Business failures travel as
/// return codes inside a well-formed stub and never show up here.
#[derive(Debug, Error)]
pub enum NdrError {
    /// Not enough bytes left in the stub
    #[error("truncated input: needed {needed} bytes, have {have}")]
    TruncatedInput { needed: usize, have: usize },

    /// A declared length cannot possibly fit in what is left of the stub
    #[error(
        "oversized length: {declared} elements of at least {element_size} bytes, \
         {remaining} bytes remaining"
    )]
    OversizedLength {
        declared: usize,
        element_size: usize,
        remaining: usize,
    },

    /// A declared length exceeds the configured element ceiling
    #[error("allocation limit exceeded: requested {requested}, limit {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },

    /// Conformance and variance disagree (`offset + actual > max`)
    #[error("conformance mismatch: max_count={max_count}, offset={offset}, actual_count={actual_count}")]
    ConformanceMismatch {
        max_count: u32,
        offset: u32,
        actual_count: u32,
    },

    /// Fixed-size array received the wrong number of elements
    #[error("array size mismatch: expected {expected}, got {got}")]
    ArraySizeMismatch { expected: usize, got: usize },

    /// String header or terminator is malformed
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// A `[ref]` slot was handed an absent value
    #[error("pointer contract mismatch: `{0}` is a ref pointer and cannot be null")]
    PointerContractMismatch(&'static str),

    /// A pointer was encoded or resolved before its referent was decoded
    #[error("unresolved referent: ID {0:#010x}")]
    UnresolvedReferent(u32),

    /// Pointer bodies nest deeper than the context allows
    #[error("pointer nesting too deep: depth {depth}, limit {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    /// The writer ran out of nonzero referent IDs
    #[error("referent IDs exhausted")]
    ReferentIdsExhausted,

    /// Length did not fit the wire integer type
    #[error("integer overflow: {0} does not fit in an NDR count")]
    IntegerOverflow(usize),

    /// ANSI string bytes were not UTF-8
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
