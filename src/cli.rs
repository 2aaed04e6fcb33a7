//! CLI front door.
//!
//! Command implementations for the `xref` binary:
//! - `build` - Decode fact streams, build the index, render pages, export the graph
//! - `query symbol|at|search` - Look things up in a saved `index.json`
//! - `graph` - Export the relationship graph of a saved index
//! - `highlight` - Lexically classify one file
//!
//! Every function returns a response struct (or plain text for DOT) and
//! leaves printing to the caller. Failures are `XrefError`s with stable
//! exit codes.

use std::fs;
use std::path::Path;

use xreftool_core::error::XrefError;
use xreftool_core::facts::SymbolKind;
use xreftool_core::graph::{export_with, Graph, GraphOptions};
use xreftool_core::highlight::grammar::GrammarSet;
use xreftool_core::highlight::highlight;
use xreftool_core::index::{EdgeKind, Index};
use xreftool_core::output::{
    BuildResponse, HighlightResponse, OccurrenceInfo, OccurrenceResponse, SearchResponse,
    SymbolInfo, SymbolResponse, SymbolSummary,
};
use xreftool_core::pipeline::{run, write_outputs, BuildConfig, CancelFlag};
use xreftool_core::types::SymbolId;

// ============================================================================
// Build
// ============================================================================

/// Run a build and, when `out_dir` is given, write its outputs.
pub fn run_build(
    config: &BuildConfig,
    out_dir: Option<&Path>,
    cancel: &CancelFlag,
) -> Result<BuildResponse, XrefError> {
    let output = run(config, cancel)?;
    let files_written = match out_dir {
        Some(dir) => write_outputs(&output, dir)?,
        None => 0,
    };
    Ok(BuildResponse::new(
        chrono::Utc::now().to_rfc3339(),
        out_dir.map(|d| d.display().to_string()),
        files_written,
        output.stats,
        output.diagnostics.counts,
    ))
}

/// Parse a definition preference in `<prefix>=<weight>` format.
pub fn parse_preference(s: &str) -> Result<(String, i32), String> {
    let (prefix, weight) = s.rsplit_once('=').ok_or_else(|| {
        format!(
            "invalid preference '{}', expected '<prefix>=<weight>' (e.g., 'src/=10')",
            s
        )
    })?;
    let weight = weight
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("invalid weight '{}' in preference '{}'", weight, s))?;
    Ok((prefix.to_string(), weight))
}

// ============================================================================
// Queries
// ============================================================================

/// Load a saved index.
pub fn load_index(path: &Path) -> Result<Index, XrefError> {
    let json = fs::read_to_string(path).map_err(|e| XrefError::input(path, e.to_string()))?;
    Index::from_json(&json).map_err(|e| XrefError::input(path, format!("invalid index: {}", e)))
}

/// Symbols matching `query`: a 16-digit id, or an exact qualified or simple name.
pub fn query_symbol(index: &Index, query: &str) -> Result<SymbolResponse, XrefError> {
    let by_id = SymbolId::parse(query).and_then(|id| index.symbol(id));
    let matches = match by_id {
        Some(symbol) => vec![symbol],
        None => index.symbols_named(query),
    };
    if matches.is_empty() {
        return Err(XrefError::symbol_not_found(query));
    }
    Ok(SymbolResponse::new(
        matches
            .into_iter()
            .map(|s| SymbolInfo::from_symbol(index, s))
            .collect(),
    ))
}

/// The occurrence covering byte `offset` of `file`.
pub fn query_at(index: &Index, file: &str, offset: u64) -> Result<OccurrenceResponse, XrefError> {
    if !index.files().any(|f| f == file) {
        return Err(XrefError::file_not_found(file));
    }
    let occurrence = match index.occurrence_at(file, offset) {
        Some(occurrence) => {
            let symbol = index.symbol(occurrence.symbol).ok_or_else(|| {
                XrefError::internal(format!(
                    "occurrence in {} points at unknown symbol {}",
                    file, occurrence.symbol
                ))
            })?;
            Some(OccurrenceInfo {
                start: occurrence.start,
                end: occurrence.end,
                role: occurrence.role,
                symbol: SymbolSummary::from_symbol(symbol),
            })
        }
        None => None,
    };
    Ok(OccurrenceResponse::new(file, offset, occurrence))
}

/// Symbols whose qualified or simple name starts with `prefix`.
pub fn query_search(
    index: &Index,
    prefix: &str,
    kind: Option<SymbolKind>,
    limit: Option<usize>,
) -> SearchResponse {
    let symbols = index
        .symbols_with_prefix(prefix)
        .into_iter()
        .filter(|s| kind.is_none_or(|k| s.kind == k))
        .take(limit.unwrap_or(usize::MAX))
        .map(SymbolSummary::from_symbol)
        .collect();
    SearchResponse::new(prefix, symbols)
}

// ============================================================================
// Graph
// ============================================================================

/// Export the graph of a saved index, optionally limited to some edge kinds.
pub fn run_graph(index: &Index, kinds: &[EdgeKind]) -> Graph {
    export_with(
        index,
        &GraphOptions {
            kinds: kinds.to_vec(),
        },
    )
}

// ============================================================================
// Highlight
// ============================================================================

/// Highlight one file with the grammar its extension selects.
pub fn run_highlight(path: &Path, grammars: &GrammarSet) -> Result<HighlightResponse, XrefError> {
    let text = fs::read(path).map_err(|e| XrefError::input(path, e.to_string()))?;
    let name = path.to_string_lossy().replace('\\', "/");
    let grammar = grammars.for_path_or_plain(&name);
    let highlighted = highlight(&text, grammar);
    Ok(HighlightResponse::new(name, grammar.name.clone(), highlighted))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use xreftool_core::facts::SymbolKey;
    use xreftool_core::index::{FileTable, Occurrence, OccurrenceRole, Symbol};
    use xreftool_core::types::{Location, Span};

    fn sample_index() -> Index {
        let key = SymbolKey::new("ns::foo", SymbolKind::Function);
        let mut foo = Symbol::new(SymbolId::new(2), &key);
        foo.definition = Some(Location::new("b.c", Span::new(20, 23), 2, 6));
        let key = SymbolKey::new("ns::foobar", SymbolKind::Type);
        let widget = Symbol::new(SymbolId::new(5), &key);
        let mut files = BTreeMap::new();
        files.insert(
            "b.c".to_string(),
            FileTable::new(
                vec![Occurrence {
                    start: 20,
                    end: 23,
                    symbol: SymbolId::new(2),
                    role: OccurrenceRole::Definition,
                }],
                vec![],
            ),
        );
        Index::new(vec!["b.c".to_string()], vec![foo, widget], files, BTreeMap::new())
    }

    mod preference_parsing {
        use super::*;

        #[test]
        fn parses_prefix_and_weight() {
            assert_eq!(parse_preference("src/=10"), Ok(("src/".to_string(), 10)));
            assert_eq!(parse_preference("a=b/=-3"), Ok(("a=b/".to_string(), -3)));
        }

        #[test]
        fn rejects_bad_input() {
            assert!(parse_preference("src/").is_err());
            assert!(parse_preference("src/=high").is_err());
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn symbol_by_name_and_id() {
            let index = sample_index();
            let by_name = query_symbol(&index, "foo").unwrap();
            assert_eq!(by_name.symbols.len(), 1);
            let by_id = query_symbol(&index, "0000000000000002").unwrap();
            assert_eq!(by_id.symbols[0].name, "ns::foo");
        }

        #[test]
        fn unknown_symbol_is_resolution_error() {
            let err = query_symbol(&sample_index(), "bar").unwrap_err();
            assert!(matches!(err, XrefError::SymbolNotFound { .. }));
        }

        #[test]
        fn at_finds_occurrence_or_null() {
            let index = sample_index();
            let hit = query_at(&index, "b.c", 21).unwrap();
            assert_eq!(hit.occurrence.unwrap().symbol.name, "ns::foo");
            let miss = query_at(&index, "b.c", 0).unwrap();
            assert!(miss.occurrence.is_none());
        }

        #[test]
        fn at_unknown_file() {
            let err = query_at(&sample_index(), "zzz.c", 0).unwrap_err();
            assert!(matches!(err, XrefError::FileNotFound { .. }));
        }

        #[test]
        fn search_filters_by_kind_and_limit() {
            let index = sample_index();
            assert_eq!(query_search(&index, "foo", None, None).symbols.len(), 2);
            assert_eq!(
                query_search(&index, "foo", Some(SymbolKind::Type), None).symbols[0].name,
                "ns::foobar"
            );
            assert_eq!(query_search(&index, "foo", None, Some(1)).symbols.len(), 1);
        }
    }

    mod loading {
        use super::*;

        #[test]
        fn load_round_trips_saved_index() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("index.json");
            let index = sample_index();
            fs::write(&path, index.to_json().unwrap()).unwrap();
            assert_eq!(load_index(&path).unwrap(), index);
        }

        #[test]
        fn load_rejects_garbage() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("index.json");
            fs::write(&path, "[]").unwrap();
            assert!(matches!(load_index(&path), Err(XrefError::Input { .. })));
        }
    }
}
