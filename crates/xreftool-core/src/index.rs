//! Cross-reference index: the frozen result of merging all fact streams.
//!
//! The [`Index`] is read-only after construction (see
//! [`Resolver::finish`](crate::resolve::Resolver::finish)). It holds:
//! - all [`Symbol`]s, sorted by global id
//! - a per-file [`FileTable`] of sorted, non-overlapping [`Occurrence`]s and
//!   the file's include list
//! - the ordered list of merged translation units
//! - a name for every dangling relationship target
//!
//! Symmetric relationships (called-by, derived-by, overridden-by) are never
//! stored; [`Index::incoming_edges`] derives them by scanning.
//!
//! The index serializes to JSON with deterministic field and array order, so
//! identical input produces byte-identical output. Lookup tables are skipped
//! during serialization and rebuilt by [`Index::from_json`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::facts::{FactKind, SymbolKey, SymbolKind};
use crate::types::{Location, SymbolId};

// ============================================================================
// Occurrence Roles
// ============================================================================

/// Role of an occurrence. Variant order is overlap priority among equal widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceRole {
    Definition,
    Declaration,
    Reference,
    MacroExpansion,
}

/// Kind of reference recorded on a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Plain use of the symbol.
    Use,
    /// A macro expansion site.
    MacroExpansion,
}

impl ReferenceKind {
    /// Occurrence role of a reference of this kind.
    pub fn role(self) -> OccurrenceRole {
        match self {
            ReferenceKind::Use => OccurrenceRole::Reference,
            ReferenceKind::MacroExpansion => OccurrenceRole::MacroExpansion,
        }
    }
}

/// A reference location with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub location: Location,
    pub kind: ReferenceKind,
}

// ============================================================================
// Edges
// ============================================================================

/// Kind of relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    InheritsFrom,
    Overrides,
    Calls,
}

impl EdgeKind {
    /// Edge kind for a relationship fact kind.
    pub fn from_fact(kind: FactKind) -> Option<Self> {
        match kind {
            FactKind::InheritsFrom => Some(EdgeKind::InheritsFrom),
            FactKind::Overrides => Some(EdgeKind::Overrides),
            FactKind::Calls => Some(EdgeKind::Calls),
            _ => None,
        }
    }

    /// Stable name of the stored direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::InheritsFrom => "inherits_from",
            EdgeKind::Overrides => "overrides",
            EdgeKind::Calls => "calls",
        }
    }

    /// Name of the derived reverse direction.
    pub fn inverse_name(&self) -> &'static str {
        match self {
            EdgeKind::InheritsFrom => "derived_by",
            EdgeKind::Overrides => "overridden_by",
            EdgeKind::Calls => "called_by",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing relationship edge stored on its source symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub target: SymbolId,
}

/// An edge seen from its target: `source` relates to the queried symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncomingEdge {
    pub source: SymbolId,
    pub kind: EdgeKind,
}

// ============================================================================
// Symbol
// ============================================================================

/// A definition that lost to the canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionConflict {
    pub location: Location,
    /// Stream that contributed the losing definition.
    pub stream: String,
}

/// Global, deduplicated symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub qualified_name: String,
    pub signature: String,
    /// Canonical definition, if any stream defined the symbol.
    pub definition: Option<Location>,
    pub declarations: Vec<Location>,
    pub references: Vec<Reference>,
    pub edges: BTreeSet<Edge>,
    #[serde(default)]
    pub conflicts: Vec<DefinitionConflict>,
}

impl Symbol {
    /// Create an empty symbol for a key.
    pub fn new(id: SymbolId, key: &SymbolKey) -> Self {
        Symbol {
            id,
            kind: key.kind,
            qualified_name: key.qualified_name.clone(),
            signature: key.signature.clone(),
            definition: None,
            declarations: Vec::new(),
            references: Vec::new(),
            edges: BTreeSet::new(),
            conflicts: Vec::new(),
        }
    }

    /// Last component of the qualified name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }
}

/// Last component of a `::`- or `.`-qualified name.
pub fn simple_name(qualified: &str) -> &str {
    let after_colons = qualified.rsplit("::").next().unwrap_or(qualified);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

// ============================================================================
// Occurrences
// ============================================================================

/// One linkable span in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: u64,
    pub end: u64,
    pub symbol: SymbolId,
    pub role: OccurrenceRole,
}

impl Occurrence {
    /// True when `offset` falls inside `[start, end)`.
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// How an overlapping occurrence was resolved against a narrower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapResolution {
    /// The occurrence keeps the bytes outside the narrower ones.
    Split,
    /// Narrower occurrences cover every byte; nothing is kept.
    Dropped,
}

/// An occurrence that lost bytes to a narrower occurrence of another symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceOverlap {
    pub displaced: Occurrence,
    /// Symbol of the first narrower occurrence inside `displaced`.
    pub kept: SymbolId,
    pub resolution: OverlapResolution,
}

/// Per-file tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTable {
    /// Sorted by start, non-overlapping, no empty spans.
    pub occurrences: Vec<Occurrence>,
    /// Files this file includes, in first-seen order.
    pub includes: Vec<String>,
}

impl FileTable {
    /// Build a table from raw occurrences, resolving overlaps.
    pub fn new(raw: Vec<Occurrence>, includes: Vec<String>) -> Self {
        Self::with_overlaps(raw, includes).0
    }

    /// Build a table and report every occurrence displaced by another symbol.
    ///
    /// The innermost occurrence wins each byte. Candidates claim bytes
    /// narrowest first, then by role priority, symbol id and start; a wider
    /// occurrence keeps only the bytes no narrower one claimed, so it may be
    /// split into several fragments around nested occurrences.
    pub fn with_overlaps(
        mut raw: Vec<Occurrence>,
        includes: Vec<String>,
    ) -> (Self, Vec<OccurrenceOverlap>) {
        raw.retain(|o| o.start < o.end);
        raw.sort_by(|a, b| {
            (a.end - a.start)
                .cmp(&(b.end - b.start))
                .then_with(|| a.role.cmp(&b.role))
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.start.cmp(&b.start))
        });
        raw.dedup();

        // start -> claimed fragment
        let mut claimed: BTreeMap<u64, Occurrence> = BTreeMap::new();
        let mut overlaps = Vec::new();
        for candidate in raw {
            let mut inside: Vec<Occurrence> = claimed
                .range(..candidate.end)
                .rev()
                .map(|(_, o)| *o)
                .take_while(|o| o.end > candidate.start)
                .collect();
            inside.reverse();

            let mut gaps = Vec::new();
            let mut cursor = candidate.start;
            for fragment in &inside {
                if fragment.start > cursor {
                    gaps.push((cursor, fragment.start));
                }
                cursor = cursor.max(fragment.end);
            }
            if cursor < candidate.end {
                gaps.push((cursor, candidate.end));
            }

            if let Some(other) = inside.iter().find(|o| o.symbol != candidate.symbol) {
                overlaps.push(OccurrenceOverlap {
                    displaced: candidate,
                    kept: other.symbol,
                    resolution: if gaps.is_empty() {
                        OverlapResolution::Dropped
                    } else {
                        OverlapResolution::Split
                    },
                });
            }
            for (start, end) in gaps {
                claimed.insert(
                    start,
                    Occurrence {
                        start,
                        end,
                        ..candidate
                    },
                );
            }
        }

        let table = FileTable {
            occurrences: claimed.into_values().collect(),
            includes,
        };
        (table, overlaps)
    }

    /// Occurrence covering `offset`, by binary search.
    pub fn occurrence_at(&self, offset: u64) -> Option<&Occurrence> {
        let idx = self.occurrences.partition_point(|o| o.end <= offset);
        self.occurrences.get(idx).filter(|o| o.contains(offset))
    }
}

// ============================================================================
// Index
// ============================================================================

/// Summary counts for an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub units: usize,
    pub symbols: usize,
    pub files: usize,
    pub occurrences: usize,
    pub edges: usize,
    pub dangling_edges: usize,
    pub conflicts: usize,
}

/// Frozen cross-reference index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Index {
    /// Merged translation units, in merge order.
    units: Vec<String>,
    /// All symbols, sorted by id.
    symbols: Vec<Symbol>,
    /// Per-file occurrence and include tables.
    files: BTreeMap<String, FileTable>,
    /// Keys of relationship targets that no stream declared or defined.
    unresolved: BTreeMap<SymbolId, SymbolKey>,
    #[serde(skip)]
    by_id: HashMap<SymbolId, usize>,
    #[serde(skip)]
    by_name: BTreeMap<String, BTreeSet<usize>>,
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.units == other.units
            && self.symbols == other.symbols
            && self.files == other.files
            && self.unresolved == other.unresolved
    }
}

impl Index {
    /// Assemble an index. Symbols are sorted by id.
    pub fn new(
        units: Vec<String>,
        mut symbols: Vec<Symbol>,
        files: BTreeMap<String, FileTable>,
        unresolved: BTreeMap<SymbolId, SymbolKey>,
    ) -> Self {
        symbols.sort_by_key(|s| s.id);
        let mut index = Index {
            units,
            symbols,
            files,
            unresolved,
            by_id: HashMap::new(),
            by_name: BTreeMap::new(),
        };
        index.rebuild_lookups();
        index
    }

    fn rebuild_lookups(&mut self) {
        self.by_id = self
            .symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        self.by_name.clear();
        for (i, symbol) in self.symbols.iter().enumerate() {
            self.by_name
                .entry(symbol.qualified_name.clone())
                .or_default()
                .insert(i);
            self.by_name
                .entry(symbol.simple_name().to_string())
                .or_default()
                .insert(i);
        }
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Symbol by global id.
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.by_id.get(&id).map(|&i| &self.symbols[i])
    }

    /// All symbols, sorted by id.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Merged translation units.
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Files with a table, in path order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Occurrence covering `(file, offset)`; `None` between occurrences.
    pub fn occurrence_at(&self, file: &str, offset: u64) -> Option<&Occurrence> {
        self.files.get(file)?.occurrence_at(offset)
    }

    /// The whole sorted occurrence table of a file (empty when unknown).
    pub fn occurrences_in(&self, file: &str) -> &[Occurrence] {
        self.files
            .get(file)
            .map(|t| t.occurrences.as_slice())
            .unwrap_or(&[])
    }

    /// Files included by `file`.
    pub fn includes_of(&self, file: &str) -> &[String] {
        self.files
            .get(file)
            .map(|t| t.includes.as_slice())
            .unwrap_or(&[])
    }

    /// Symbols of one kind, sorted by id.
    pub fn symbols_of_kind(&self, kind: SymbolKind) -> Vec<&Symbol> {
        self.symbols.iter().filter(|s| s.kind == kind).collect()
    }

    /// Symbols whose qualified or simple name starts with `prefix`, sorted by id.
    pub fn symbols_with_prefix(&self, prefix: &str) -> Vec<&Symbol> {
        let matches: BTreeSet<usize> = self
            .by_name
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .flat_map(|(_, indexes)| indexes.iter().copied())
            .collect();
        matches.into_iter().map(|i| &self.symbols[i]).collect()
    }

    /// Symbols whose qualified or simple name is exactly `name`, sorted by id.
    pub fn symbols_named(&self, name: &str) -> Vec<&Symbol> {
        self.by_name
            .get(name)
            .map(|indexes| indexes.iter().map(|&i| &self.symbols[i]).collect())
            .unwrap_or_default()
    }

    /// Edges pointing at `id`, derived by scanning, sorted by (source, kind).
    pub fn incoming_edges(&self, id: SymbolId) -> Vec<IncomingEdge> {
        let mut incoming: Vec<IncomingEdge> = self
            .symbols
            .iter()
            .flat_map(|s| {
                s.edges
                    .iter()
                    .filter(move |e| e.target == id)
                    .map(move |e| IncomingEdge {
                        source: s.id,
                        kind: e.kind,
                    })
            })
            .collect();
        incoming.sort();
        incoming
    }

    /// Edges whose target is not a symbol of this index, as (source, edge).
    pub fn dangling_edges(&self) -> Vec<(SymbolId, Edge)> {
        self.symbols
            .iter()
            .flat_map(|s| s.edges.iter().map(move |e| (s.id, *e)))
            .filter(|(_, e)| !self.by_id.contains_key(&e.target))
            .collect()
    }

    /// Key recorded for a dangling target.
    pub fn unresolved(&self, id: SymbolId) -> Option<&SymbolKey> {
        self.unresolved.get(&id)
    }

    /// Summary counts.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            units: self.units.len(),
            symbols: self.symbols.len(),
            files: self.files.len(),
            occurrences: self.files.values().map(|t| t.occurrences.len()).sum(),
            edges: self.symbols.iter().map(|s| s.edges.len()).sum(),
            dangling_edges: self.dangling_edges().len(),
            conflicts: self.symbols.iter().map(|s| s.conflicts.len()).sum(),
        }
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON and rebuild lookup tables.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut index: Index = serde_json::from_str(json)?;
        index.symbols.sort_by_key(|s| s.id);
        index.rebuild_lookups();
        Ok(index)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Span;

    fn occ(start: u64, end: u64, symbol: u64, role: OccurrenceRole) -> Occurrence {
        Occurrence {
            start,
            end,
            symbol: SymbolId::new(symbol),
            role,
        }
    }

    fn symbol(id: u64, name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(SymbolId::new(id), &SymbolKey::new(name, kind))
    }

    mod occurrence_table {
        use super::*;

        #[test]
        fn sorted_and_searchable() {
            let table = FileTable::new(
                vec![
                    occ(20, 23, 2, OccurrenceRole::Reference),
                    occ(5, 8, 1, OccurrenceRole::Definition),
                ],
                vec![],
            );
            assert_eq!(table.occurrences[0].start, 5);
            assert_eq!(table.occurrence_at(5).map(|o| o.symbol.0), Some(1));
            assert_eq!(table.occurrence_at(7).map(|o| o.symbol.0), Some(1));
            assert!(table.occurrence_at(8).is_none());
            assert!(table.occurrence_at(12).is_none());
            assert_eq!(table.occurrence_at(22).map(|o| o.symbol.0), Some(2));
            assert!(table.occurrence_at(23).is_none());
        }

        fn bounds(table: &FileTable) -> Vec<(u64, u64, u64)> {
            table
                .occurrences
                .iter()
                .map(|o| (o.start, o.end, o.symbol.0))
                .collect()
        }

        #[test]
        fn overlaps_prefer_narrower_then_role() {
            let (table, overlaps) = FileTable::with_overlaps(
                vec![
                    occ(0, 10, 1, OccurrenceRole::Reference),
                    occ(0, 3, 2, OccurrenceRole::Reference),
                    occ(0, 3, 3, OccurrenceRole::Definition),
                    occ(2, 6, 4, OccurrenceRole::Reference),
                    occ(6, 9, 5, OccurrenceRole::MacroExpansion),
                ],
                vec![],
            );
            assert_eq!(
                bounds(&table),
                vec![(0, 3, 3), (3, 6, 4), (6, 9, 5), (9, 10, 1)]
            );
            for pair in table.occurrences.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }

            let displaced: Vec<(u64, OverlapResolution)> = overlaps
                .iter()
                .map(|o| (o.displaced.symbol.0, o.resolution))
                .collect();
            assert_eq!(
                displaced,
                vec![
                    (2, OverlapResolution::Dropped),
                    (4, OverlapResolution::Split),
                    (1, OverlapResolution::Split),
                ]
            );
        }

        #[test]
        fn nested_occurrences_split_the_enclosing_one() {
            // MAX(a, b): the expansion spans 0..9, the arguments 4..5 and 7..8.
            let (table, overlaps) = FileTable::with_overlaps(
                vec![
                    occ(0, 9, 1, OccurrenceRole::MacroExpansion),
                    occ(4, 5, 2, OccurrenceRole::Reference),
                    occ(7, 8, 3, OccurrenceRole::Reference),
                ],
                vec![],
            );
            assert_eq!(
                bounds(&table),
                vec![(0, 4, 1), (4, 5, 2), (5, 7, 1), (7, 8, 3), (8, 9, 1)]
            );
            assert!(table
                .occurrences
                .iter()
                .filter(|o| o.symbol.0 == 1)
                .all(|o| o.role == OccurrenceRole::MacroExpansion));
            assert_eq!(table.occurrence_at(4).map(|o| o.symbol.0), Some(2));
            assert_eq!(table.occurrence_at(7).map(|o| o.symbol.0), Some(3));
            assert_eq!(table.occurrence_at(6).map(|o| o.symbol.0), Some(1));

            assert_eq!(overlaps.len(), 1);
            assert_eq!(overlaps[0].displaced.start, 0);
            assert_eq!(overlaps[0].displaced.end, 9);
            assert_eq!(overlaps[0].kept, SymbolId::new(2));
            assert_eq!(overlaps[0].resolution, OverlapResolution::Split);
        }

        #[test]
        fn same_symbol_duplicates_are_not_reported() {
            let (table, overlaps) = FileTable::with_overlaps(
                vec![
                    occ(5, 8, 1, OccurrenceRole::Reference),
                    occ(5, 8, 1, OccurrenceRole::Definition),
                    occ(5, 8, 1, OccurrenceRole::Definition),
                ],
                vec![],
            );
            assert_eq!(table.occurrences.len(), 1);
            assert_eq!(table.occurrences[0].role, OccurrenceRole::Definition);
            assert!(overlaps.is_empty());
        }

        #[test]
        fn empty_spans_are_skipped() {
            let table = FileTable::new(vec![occ(4, 4, 1, OccurrenceRole::Reference)], vec![]);
            assert!(table.occurrences.is_empty());
        }
    }

    mod queries {
        use super::*;

        fn sample() -> Index {
            let mut base = symbol(3, "ns::Base", SymbolKind::Type);
            base.definition = Some(Location::new("a.h", Span::new(10, 14), 1, 11));
            let mut derived = symbol(1, "ns::Derived", SymbolKind::Type);
            derived.edges.insert(Edge {
                kind: EdgeKind::InheritsFrom,
                target: SymbolId::new(3),
            });
            derived.edges.insert(Edge {
                kind: EdgeKind::InheritsFrom,
                target: SymbolId::new(99),
            });
            let helper = symbol(2, "helper", SymbolKind::Function);

            let mut files = BTreeMap::new();
            files.insert(
                "a.h".to_string(),
                FileTable::new(
                    vec![occ(10, 14, 3, OccurrenceRole::Definition)],
                    vec!["b.h".to_string()],
                ),
            );
            let mut unresolved = BTreeMap::new();
            unresolved.insert(SymbolId::new(99), SymbolKey::new("Other", SymbolKind::Type));

            Index::new(
                vec!["a.c".to_string()],
                vec![base, derived, helper],
                files,
                unresolved,
            )
        }

        #[test]
        fn symbols_are_sorted_by_id() {
            let index = sample();
            let ids: Vec<u64> = index.symbols().iter().map(|s| s.id.0).collect();
            assert_eq!(ids, vec![1, 2, 3]);
            assert_eq!(
                index.symbol(SymbolId::new(3)).map(|s| s.qualified_name.as_str()),
                Some("ns::Base")
            );
            assert!(index.symbol(SymbolId::new(4)).is_none());
        }

        #[test]
        fn prefix_matches_qualified_and_simple_names() {
            let index = sample();
            let names: Vec<&str> = index
                .symbols_with_prefix("ns::")
                .iter()
                .map(|s| s.qualified_name.as_str())
                .collect();
            assert_eq!(names, vec!["ns::Derived", "ns::Base"]);

            let names: Vec<&str> = index
                .symbols_with_prefix("Ba")
                .iter()
                .map(|s| s.qualified_name.as_str())
                .collect();
            assert_eq!(names, vec!["ns::Base"]);
            assert!(index.symbols_with_prefix("zzz").is_empty());
        }

        #[test]
        fn kind_filter() {
            let index = sample();
            assert_eq!(index.symbols_of_kind(SymbolKind::Type).len(), 2);
            assert_eq!(index.symbols_of_kind(SymbolKind::Macro).len(), 0);
        }

        #[test]
        fn incoming_edges_are_derived() {
            let index = sample();
            assert_eq!(
                index.incoming_edges(SymbolId::new(3)),
                vec![IncomingEdge {
                    source: SymbolId::new(1),
                    kind: EdgeKind::InheritsFrom
                }]
            );
            assert!(index.incoming_edges(SymbolId::new(2)).is_empty());
        }

        #[test]
        fn dangling_edges_name_missing_targets() {
            let index = sample();
            let dangling = index.dangling_edges();
            assert_eq!(dangling.len(), 1);
            assert_eq!(dangling[0].1.target, SymbolId::new(99));
            assert_eq!(
                index.unresolved(SymbolId::new(99)).map(|k| k.qualified_name.as_str()),
                Some("Other")
            );
        }

        #[test]
        fn file_lookups() {
            let index = sample();
            assert_eq!(index.occurrences_in("a.h").len(), 1);
            assert!(index.occurrences_in("nope.c").is_empty());
            assert_eq!(index.includes_of("a.h"), &["b.h".to_string()]);
            assert!(index.occurrence_at("a.h", 12).is_some());
            assert!(index.occurrence_at("nope.c", 0).is_none());
        }

        #[test]
        fn json_roundtrip_rebuilds_lookups() {
            let index = sample();
            let json = index.to_json().unwrap();
            let loaded = Index::from_json(&json).unwrap();
            assert_eq!(loaded, index);
            assert!(loaded.symbol(SymbolId::new(2)).is_some());
            assert_eq!(loaded.symbols_with_prefix("help").len(), 1);
            assert_eq!(loaded.to_json().unwrap(), json);
        }

        #[test]
        fn stats_count_everything() {
            let stats = sample().stats();
            assert_eq!(stats.symbols, 3);
            assert_eq!(stats.edges, 2);
            assert_eq!(stats.dangling_edges, 1);
            assert_eq!(stats.occurrences, 1);
        }
    }

    #[test]
    fn simple_name_strips_qualifiers() {
        assert_eq!(simple_name("ns::Class::method"), "method");
        assert_eq!(simple_name("pkg.mod.func"), "func");
        assert_eq!(simple_name("plain"), "plain");
    }

    #[test]
    fn inverse_edge_names() {
        assert_eq!(EdgeKind::Calls.inverse_name(), "called_by");
        assert_eq!(EdgeKind::InheritsFrom.inverse_name(), "derived_by");
        assert_eq!(EdgeKind::Overrides.inverse_name(), "overridden_by");
    }
}
