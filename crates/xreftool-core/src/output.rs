//! JSON output types and serialization for CLI responses.
//!
//! These types form the **agent contract** of the `xref` binary.
//!
//! ## Design Principles
//!
//! 1. **Structured JSON:** All CLI output is valid JSON, except `xref graph`
//!    which prints plain DOT unless asked for JSON
//! 2. **Status first:** Every response has `status` as first field
//! 3. **Deterministic:** Same input -> same output (field order, array ordering)
//! 4. **Nullable vs absent:** Explicit `null` for "no value"; absent field means "not applicable"
//! 5. **Versioned:** Schema version in response enables forward compatibility

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, XrefError};
use crate::facts::SymbolKind;
use crate::graph::Graph;
use crate::highlight::{HighlightSpan, Highlighted, Recovery};
use crate::index::{DefinitionConflict, Index, OccurrenceRole, ReferenceKind, Symbol};
use crate::pipeline::RunStats;
use crate::types::{Location, SymbolId};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Shared Types
// ============================================================================

/// One use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    pub location: Location,
    pub kind: ReferenceKind,
}

/// One end of a relationship, as seen from the queried symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// `inherits_from`, `overrides`, `calls` for outgoing edges;
    /// `derived_by`, `overridden_by`, `called_by` for incoming ones.
    pub kind: String,
    /// The symbol at the other end.
    pub symbol: SymbolId,
    /// Qualified name of the other end, null when unknown.
    pub name: Option<String>,
    /// False when the other end is not in the index.
    pub resolved: bool,
}

/// Short description of a symbol, used in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// `file:line` of the definition, null when the symbol is only declared.
    pub definition: Option<String>,
}

impl SymbolSummary {
    pub fn from_symbol(symbol: &Symbol) -> Self {
        SymbolSummary {
            id: symbol.id,
            name: symbol.qualified_name.clone(),
            kind: symbol.kind,
            definition: symbol
                .definition
                .as_ref()
                .map(|d| format!("{}:{}", d.file, d.line)),
        }
    }
}

/// Full description of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub definition: Option<Location>,
    pub declarations: Vec<Location>,
    pub references: Vec<ReferenceInfo>,
    /// Definitions that lost to the canonical one.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub conflicts: Vec<DefinitionConflict>,
    pub edges: Vec<EdgeInfo>,
    pub incoming: Vec<EdgeInfo>,
}

impl SymbolInfo {
    /// Describe `symbol`, resolving edge endpoints against `index`.
    pub fn from_symbol(index: &Index, symbol: &Symbol) -> Self {
        let name_of = |id: SymbolId| {
            index
                .symbol(id)
                .map(|s| s.qualified_name.clone())
                .or_else(|| index.unresolved(id).map(|k| k.qualified_name.clone()))
        };

        let edges = symbol
            .edges
            .iter()
            .map(|e| EdgeInfo {
                kind: e.kind.as_str().to_string(),
                symbol: e.target,
                name: name_of(e.target),
                resolved: index.symbol(e.target).is_some(),
            })
            .collect();
        let incoming = index
            .incoming_edges(symbol.id)
            .into_iter()
            .map(|e| EdgeInfo {
                kind: e.kind.inverse_name().to_string(),
                symbol: e.source,
                name: name_of(e.source),
                resolved: true,
            })
            .collect();

        SymbolInfo {
            id: symbol.id,
            name: symbol.qualified_name.clone(),
            kind: symbol.kind,
            signature: symbol.signature.clone(),
            definition: symbol.definition.clone(),
            declarations: symbol.declarations.clone(),
            references: symbol
                .references
                .iter()
                .map(|r| ReferenceInfo {
                    location: r.location.clone(),
                    kind: r.kind,
                })
                .collect(),
            conflicts: symbol.conflicts.clone(),
            edges,
            incoming,
        }
    }
}

/// The occurrence found at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceInfo {
    pub start: u64,
    pub end: u64,
    pub role: OccurrenceRole,
    pub symbol: SymbolSummary,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
///
/// - `code`: Numeric error code (required)
/// - `message`: Human-readable message (required)
/// - `details`: Error-specific structured data (optional)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (see [`OutputErrorCode`]).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from an XrefError.
    pub fn from_error(err: &XrefError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let details = match err {
            XrefError::SymbolNotFound { query } => Some(serde_json::json!({ "query": query })),
            XrefError::FileNotFound { path } => Some(serde_json::json!({ "path": path })),
            XrefError::SourceRoot { path, .. }
            | XrefError::Input { path, .. }
            | XrefError::Output { path, .. } => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            XrefError::NoUsableStreams { attempted, failed } => Some(serde_json::json!({
                "attempted": attempted,
                "failed": failed
            })),
            _ => None,
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from an XrefError.
    pub fn from_error(err: &XrefError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }

    /// Create an error response with just code and message.
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo {
                code,
                message: message.into(),
                details: None,
            },
        }
    }
}

// ============================================================================
// Response Structs
// ============================================================================

/// Response for `xref build`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// ISO 8601 completion time.
    pub timestamp: String,
    /// Output directory, absent when nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    pub files_written: usize,
    pub stats: RunStats,
    /// Diagnostic counts per kind.
    pub diagnostics: BTreeMap<String, usize>,
}

impl BuildResponse {
    pub fn new(
        timestamp: impl Into<String>,
        out_dir: Option<String>,
        files_written: usize,
        stats: RunStats,
        diagnostics: BTreeMap<String, usize>,
    ) -> Self {
        BuildResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: timestamp.into(),
            out_dir,
            files_written,
            stats,
            diagnostics,
        }
    }
}

/// Response for `xref query symbol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolResponse {
    pub status: String,
    pub schema_version: String,
    /// Every symbol matching the query, sorted by id.
    pub symbols: Vec<SymbolInfo>,
}

impl SymbolResponse {
    pub fn new(symbols: Vec<SymbolInfo>) -> Self {
        SymbolResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            symbols,
        }
    }
}

/// Response for `xref query at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceResponse {
    pub status: String,
    pub schema_version: String,
    pub file: String,
    pub offset: u64,
    /// Null when no linkable span covers the offset.
    pub occurrence: Option<OccurrenceInfo>,
}

impl OccurrenceResponse {
    pub fn new(file: impl Into<String>, offset: u64, occurrence: Option<OccurrenceInfo>) -> Self {
        OccurrenceResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            offset,
            occurrence,
        }
    }
}

/// Response for `xref query search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    pub schema_version: String,
    pub query: String,
    pub symbols: Vec<SymbolSummary>,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, symbols: Vec<SymbolSummary>) -> Self {
        SearchResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            query: query.into(),
            symbols,
        }
    }
}

/// Response for `xref graph --format json`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub status: String,
    pub schema_version: String,
    pub graph: Graph,
}

impl GraphResponse {
    pub fn new(graph: Graph) -> Self {
        GraphResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            graph,
        }
    }
}

/// Response for `xref highlight`.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightResponse {
    pub status: String,
    pub schema_version: String,
    pub file: String,
    /// Name of the grammar used.
    pub grammar: String,
    pub spans: Vec<HighlightSpan>,
    pub recoveries: Vec<Recovery>,
}

impl HighlightResponse {
    pub fn new(
        file: impl Into<String>,
        grammar: impl Into<String>,
        highlighted: Highlighted,
    ) -> Self {
        HighlightResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            grammar: grammar.into(),
            spans: highlighted.spans,
            recoveries: highlighted.recoveries,
        }
    }
}

// ============================================================================
// Response Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
///
/// This is the single output path for CLI, ensuring consistency.
/// The output is deterministic: same input produces identical bytes.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::SymbolKey;
    use crate::index::{Edge, EdgeKind, Reference};
    use crate::types::Span;

    fn sample_index() -> Index {
        let key = SymbolKey::new("ns::foo", SymbolKind::Function);
        let mut foo = Symbol::new(SymbolId::new(2), &key);
        foo.definition = Some(Location::new("b.c", Span::new(20, 23), 2, 6));
        foo.references.push(Reference {
            location: Location::new("b.c", Span::new(46, 49), 3, 14),
            kind: ReferenceKind::Use,
        });
        let key = SymbolKey::new("main", SymbolKind::Function);
        let mut main = Symbol::new(SymbolId::new(1), &key);
        main.edges.insert(Edge {
            kind: EdgeKind::Calls,
            target: SymbolId::new(2),
        });
        main.edges.insert(Edge {
            kind: EdgeKind::Calls,
            target: SymbolId::new(7),
        });
        Index::new(vec![], vec![foo, main], Default::default(), Default::default())
    }

    mod symbol_info_tests {
        use super::*;

        #[test]
        fn outgoing_edges_mark_dangling_targets() {
            let index = sample_index();
            let main = index.symbol(SymbolId::new(1)).unwrap();
            let info = SymbolInfo::from_symbol(&index, main);
            assert_eq!(info.edges.len(), 2);
            assert_eq!(info.edges[0].name.as_deref(), Some("ns::foo"));
            assert!(info.edges[0].resolved);
            assert!(!info.edges[1].resolved);
            assert_eq!(info.edges[1].name, None);
        }

        #[test]
        fn incoming_edges_use_inverse_names() {
            let index = sample_index();
            let foo = index.symbol(SymbolId::new(2)).unwrap();
            let info = SymbolInfo::from_symbol(&index, foo);
            assert_eq!(info.incoming.len(), 1);
            assert_eq!(info.incoming[0].kind, "called_by");
            assert_eq!(info.incoming[0].name.as_deref(), Some("main"));
            assert_eq!(info.references.len(), 1);
        }

        #[test]
        fn summary_formats_definition() {
            let index = sample_index();
            let summary = SymbolSummary::from_symbol(index.symbol(SymbolId::new(2)).unwrap());
            assert_eq!(summary.definition.as_deref(), Some("b.c:2"));
            let summary = SymbolSummary::from_symbol(index.symbol(SymbolId::new(1)).unwrap());
            assert_eq!(summary.definition, None);
        }

        #[test]
        fn empty_conflicts_are_omitted() {
            let index = sample_index();
            let info = SymbolInfo::from_symbol(&index, index.symbol(SymbolId::new(2)).unwrap());
            let json = serde_json::to_string(&info).unwrap();
            assert!(!json.contains("conflicts"));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn error_response_carries_code_and_details() {
            let err = XrefError::SymbolNotFound {
                query: "bar".to_string(),
            };
            let response = ErrorResponse::from_error(&err);
            assert_eq!(response.status, "error");
            assert_eq!(response.error.code, 3);
            assert_eq!(response.error.details.unwrap()["query"], "bar");
        }

        #[test]
        fn no_usable_streams_details() {
            let err = XrefError::NoUsableStreams {
                attempted: 2,
                failed: 2,
            };
            let info = ErrorInfo::from_error(&err);
            assert_eq!(info.code, 4);
            assert_eq!(info.details.unwrap()["failed"], 2);
        }

        #[test]
        fn cancelled_has_no_details() {
            let info = ErrorInfo::from_error(&XrefError::Cancelled);
            assert_eq!(info.code, 10);
            assert!(info.details.is_none());
        }
    }

    mod emit_tests {
        use super::*;

        #[test]
        fn status_is_first_field() {
            let mut out = Vec::new();
            emit_response(&SearchResponse::new("fo", vec![]), &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert!(text.starts_with("{\n  \"status\": \"ok\",\n  \"schema_version\": \"1\""));
            assert!(text.ends_with("}\n"));
        }

        #[test]
        fn compact_is_single_line() {
            let mut out = Vec::new();
            emit_response_compact(&ErrorResponse::new(2, "bad"), &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert_eq!(text.lines().count(), 1);
            assert!(text.starts_with("{\"status\":\"error\""));
        }

        #[test]
        fn missing_occurrence_is_explicit_null() {
            let response = OccurrenceResponse::new("b.c", 0, None);
            let json = serde_json::to_value(&response).unwrap();
            assert!(json["occurrence"].is_null());
        }
    }
}
