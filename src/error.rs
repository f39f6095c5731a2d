// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// Failure reported by analysis or line formatting.
///
/// Contract violations by internal invariants (sorted interval lists,
/// non-null expected spans) are debug assertions, not variants here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormatError {
    /// Allocation failure, fatal to the operation.
    OutOfMemory,
    /// The line-breaking engine reported a failure.
    Formatting(&'static str),
    /// Unexpected internal engine state.
    Internal(&'static str),
    /// Caller passed an out-of-range position or length.
    InvalidParameter(&'static str),
    /// Operation not valid in the line's current state, such as caret
    /// navigation on a collapsed line.
    InvalidOperation(&'static str),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Formatting(msg) => write!(f, "formatting failed: {}", msg),
            Self::Internal(msg) => write!(f, "internal formatting error: {}", msg),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}

pub type Result<T> = core::result::Result<T, FormatError>;
