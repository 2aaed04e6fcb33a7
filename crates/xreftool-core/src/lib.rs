//! Core of xreftool.
//!
//! This crate turns compiler fact streams into a browsable cross-reference:
//! - Fact stream decoding with per-fact validation
//! - Global symbol identity and cross-unit merging
//! - The frozen, queryable cross-reference index
//! - Grammar-driven lexical highlighting
//! - Link injection and HTML rendering
//! - Relationship graph export (DOT and JSON)
//! - Build orchestration, diagnostics and JSON output types

pub mod diagnostics;
pub mod error;
pub mod facts;
pub mod graph;
pub mod highlight;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod text;
pub mod types;
pub mod workspace;

pub use diagnostics::{Diagnostic, DiagnosticsReport};
pub use error::{OutputErrorCode, XrefError};
pub use index::Index;
pub use pipeline::{BuildConfig, CancelFlag, RunOutput};
pub use types::{Location, Span, SymbolId};
