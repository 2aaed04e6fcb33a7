//! Non-fatal diagnostics collected during a run.
//!
//! Every condition a run survives is recorded here instead of aborting:
//! malformed streams, facts outside the source root, duplicate definitions,
//! dangling relationship targets, overlapping occurrences, lexical recoveries
//! and render mismatches.
//! The pipeline aggregates them into a [`DiagnosticsReport`] written next to
//! the index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::index::{EdgeKind, OccurrenceRole, OverlapResolution};
use crate::types::{Location, SymbolId};
use crate::workspace::PathRejection;

// ============================================================================
// Diagnostic
// ============================================================================

/// A non-fatal condition observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A fact stream failed to decode and was skipped.
    DecodeError {
        stream: String,
        offset: u64,
        reason: String,
    },
    /// A fact referenced a path outside the source root or not in the inventory.
    PathViolation {
        stream: String,
        path: String,
        reason: PathRejection,
    },
    /// A fact's byte span is inverted or runs past the end of its file.
    InvalidLocation {
        stream: String,
        file: String,
        start: u64,
        end: u64,
        file_len: u64,
    },
    /// A second definition of an already-defined symbol.
    MergeConflict {
        symbol: SymbolId,
        qualified_name: String,
        kept: Location,
        rejected: Location,
        stream: String,
    },
    /// A relationship edge whose target was never declared or defined.
    UnresolvedReference {
        source: SymbolId,
        target: SymbolId,
        edge: EdgeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// An occurrence enclosing or crossing a narrower one of another symbol.
    OccurrenceOverlap {
        file: String,
        symbol: SymbolId,
        role: OccurrenceRole,
        start: u64,
        end: u64,
        kept: SymbolId,
        resolution: OverlapResolution,
    },
    /// The highlighter recovered from a lexical error.
    TokenizeRecovery {
        file: String,
        offset: u64,
        construct: String,
    },
    /// A file could not be rendered faithfully.
    RenderFailed { file: String, reason: String },
}

impl Diagnostic {
    /// Stable kind name (matches the serialized `kind` tag).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Diagnostic::DecodeError { .. } => "decode_error",
            Diagnostic::PathViolation { .. } => "path_violation",
            Diagnostic::InvalidLocation { .. } => "invalid_location",
            Diagnostic::MergeConflict { .. } => "merge_conflict",
            Diagnostic::UnresolvedReference { .. } => "unresolved_reference",
            Diagnostic::OccurrenceOverlap { .. } => "occurrence_overlap",
            Diagnostic::TokenizeRecovery { .. } => "tokenize_recovery",
            Diagnostic::RenderFailed { .. } => "render_failed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DecodeError {
                stream,
                offset,
                reason,
            } => write!(f, "{}: byte {}: {}", stream, offset, reason),
            Diagnostic::PathViolation {
                stream,
                path,
                reason,
            } => write!(f, "{}: path '{}' rejected: {}", stream, path, reason),
            Diagnostic::InvalidLocation {
                stream,
                file,
                start,
                end,
                file_len,
            } => write!(
                f,
                "{}: span [{}, {}) invalid for {} ({} bytes)",
                stream, start, end, file, file_len
            ),
            Diagnostic::MergeConflict {
                qualified_name,
                kept,
                rejected,
                stream,
                ..
            } => write!(
                f,
                "{}: duplicate definition of {} at {} (kept {})",
                stream, qualified_name, rejected, kept
            ),
            Diagnostic::UnresolvedReference {
                source,
                target,
                edge,
                name,
            } => match name {
                Some(name) => write!(
                    f,
                    "{} {} {}: target {} is not in the index",
                    source, edge, target, name
                ),
                None => write!(
                    f,
                    "{} {} {}: target is not in the index",
                    source, edge, target
                ),
            },
            Diagnostic::OccurrenceOverlap {
                file,
                symbol,
                start,
                end,
                kept,
                resolution,
                ..
            } => {
                let action = match resolution {
                    OverlapResolution::Split => "split around",
                    OverlapResolution::Dropped => "hidden by",
                };
                write!(
                    f,
                    "{}: occurrence of {} at [{}, {}) {} {}",
                    file, symbol, start, end, action, kept
                )
            }
            Diagnostic::TokenizeRecovery {
                file,
                offset,
                construct,
            } => write!(f, "{}: byte {}: unterminated {}", file, offset, construct),
            Diagnostic::RenderFailed { file, reason } => {
                write!(f, "{}: render failed: {}", file, reason)
            }
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// All diagnostics of a run, with per-kind counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    /// Total number of diagnostics.
    pub total: usize,
    /// Count per kind name, sorted by name.
    pub counts: BTreeMap<String, usize>,
    /// Diagnostics in the order they were produced.
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsReport {
    /// Build a report from collected diagnostics.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let mut counts = BTreeMap::new();
        for diagnostic in &diagnostics {
            *counts.entry(diagnostic.kind_name().to_string()).or_insert(0) += 1;
        }
        DiagnosticsReport {
            total: diagnostics.len(),
            counts,
            diagnostics,
        }
    }

    /// Number of diagnostics of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    fn conflict() -> Diagnostic {
        Diagnostic::MergeConflict {
            symbol: SymbolId::new(7),
            qualified_name: "foo".to_string(),
            kept: Location::new("a.c", Span::new(4, 7), 1, 5),
            rejected: Location::new("b.c", Span::new(4, 7), 1, 5),
            stream: "b.facts".to_string(),
        }
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(conflict()).unwrap();
        assert_eq!(json["kind"], "merge_conflict");
        assert_eq!(json["symbol"], "0000000000000007");
        assert_eq!(json["kept"]["file"], "a.c");
    }

    #[test]
    fn kind_name_matches_serde_tag() {
        let diagnostics = vec![
            conflict(),
            Diagnostic::PathViolation {
                stream: "s".into(),
                path: "../x".into(),
                reason: PathRejection::OutsideRoot,
            },
            Diagnostic::TokenizeRecovery {
                file: "a.c".into(),
                offset: 3,
                construct: "string".into(),
            },
            Diagnostic::UnresolvedReference {
                source: SymbolId::new(1),
                target: SymbolId::new(2),
                edge: EdgeKind::InheritsFrom,
                name: Some("Base".into()),
            },
            Diagnostic::OccurrenceOverlap {
                file: "m.c".into(),
                symbol: SymbolId::new(1),
                role: OccurrenceRole::MacroExpansion,
                start: 0,
                end: 9,
                kept: SymbolId::new(2),
                resolution: OverlapResolution::Split,
            },
        ];
        for diagnostic in diagnostics {
            let json = serde_json::to_value(&diagnostic).unwrap();
            assert_eq!(json["kind"], diagnostic.kind_name());
        }
    }

    #[test]
    fn report_counts_by_kind() {
        let report = DiagnosticsReport::new(vec![
            conflict(),
            conflict(),
            Diagnostic::RenderFailed {
                file: "a.c".into(),
                reason: "coverage".into(),
            },
        ]);
        assert_eq!(report.total, 3);
        assert_eq!(report.count("merge_conflict"), 2);
        assert_eq!(report.count("render_failed"), 1);
        assert_eq!(report.count("decode_error"), 0);
        assert!(!report.is_empty());
    }

    #[test]
    fn display_mentions_locations() {
        let text = conflict().to_string();
        assert!(text.contains("b.c:1:5"));
        assert!(text.contains("kept a.c:1:5"));
    }
}
