//! Error types and error code constants for xref.
//!
//! Only conditions that stop a whole run are errors here. Everything a run can
//! survive (a malformed stream, a fact outside the source root, a duplicate
//! definition, a dangling edge, a lexical error) is a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Resolution errors (symbol not found in the index)
//! - `4`: Input errors (source root unreadable, no usable fact streams, bad index file)
//! - `5`: Output errors (cannot write the output directory)
//! - `10`: Internal errors (bugs, unexpected state, cancellation)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Symbol or file not found in the index.
    ResolutionError = 3,
    /// Unusable input.
    InputError = 4,
    /// Failed to write output.
    OutputError = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Fatal error for a run or a query.
#[derive(Debug, Error)]
pub enum XrefError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The source root itself cannot be read.
    #[error("cannot read source root {}: {source}", path.display())]
    SourceRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required input (fact directory, order file, grammar file, index) cannot be read.
    #[error("cannot read {}: {message}", path.display())]
    Input { path: PathBuf, message: String },

    /// Every fact stream was missing, empty, or failed to decode.
    #[error("no usable fact streams ({attempted} attempted, {failed} failed)")]
    NoUsableStreams { attempted: usize, failed: usize },

    /// Failed to write an output file.
    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Symbol not found in the index.
    #[error("symbol not found: {query}")]
    SymbolNotFound { query: String },

    /// File not known to the index or the source tree.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// The run was cancelled between files.
    #[error("run cancelled")]
    Cancelled,

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&XrefError> for OutputErrorCode {
    fn from(err: &XrefError) -> Self {
        match err {
            XrefError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            XrefError::SourceRoot { .. } => OutputErrorCode::InputError,
            XrefError::Input { .. } => OutputErrorCode::InputError,
            XrefError::NoUsableStreams { .. } => OutputErrorCode::InputError,
            XrefError::Output { .. } => OutputErrorCode::OutputError,
            XrefError::SymbolNotFound { .. } => OutputErrorCode::ResolutionError,
            XrefError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            XrefError::Cancelled => OutputErrorCode::InternalError,
            XrefError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<XrefError> for OutputErrorCode {
    fn from(err: XrefError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl XrefError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        XrefError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an input error.
    pub fn input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        XrefError::Input {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an output error.
    pub fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        XrefError::Output {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(query: impl Into<String>) -> Self {
        XrefError::SymbolNotFound {
            query: query.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        XrefError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        XrefError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
