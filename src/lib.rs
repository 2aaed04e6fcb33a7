//! xreftool - cross-referenced, syntax-highlighted source browsing.
//!
//! This crate provides the `xref` binary on top of `xreftool-core`.
//!
//! ## Modules
//!
//! - `cli` - CLI command implementations

pub mod cli;

// Re-export core types for convenience
pub use xreftool_core::error::{OutputErrorCode, XrefError};
pub use xreftool_core::output::{ErrorInfo, ErrorResponse, SCHEMA_VERSION};
pub use xreftool_core::pipeline::{BuildConfig, CancelFlag, StreamOrder};
pub use xreftool_core::Index;
