//! Symbol identity resolution: merging decoded streams into one index.
//!
//! Global identity is content-derived ([`global_id`]), so the same logical
//! entity seen by many translation units collapses to one [`Symbol`] no matter
//! which compiler-local ids each unit used.
//!
//! Merge rules, applied per fact in stream order:
//! - `defines`: the first definition wins unless the configured
//!   [`DefinitionPrecedence`] says a candidate displaces it. The loser is
//!   recorded as a conflict on the symbol and reported; an identical location
//!   is a no-op.
//! - `declares`, `references`, `expands_macro`: appended, deduplicated only on
//!   byte-identical location.
//! - `inherits_from`, `overrides`, `calls`: outgoing edges with set semantics.
//!   Targets need not exist.
//! - `includes`: recorded on the including file.
//!
//! Merging the same stream twice leaves the result unchanged.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

use crate::diagnostics::Diagnostic;
use crate::facts::{DecodedStream, FactKind, FactPayload, SymbolKey, TargetRef};
use crate::index::{
    DefinitionConflict, Edge, EdgeKind, FileTable, Index, Occurrence, OccurrenceRole, Reference,
    ReferenceKind, Symbol,
};
use crate::types::{Location, SymbolId};

// ============================================================================
// Global Identity
// ============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Normalize a signature for hashing.
///
/// Whitespace runs collapse to one space between word characters and vanish
/// next to punctuation, so `int ( * )( char )` and `int(*)(char)` agree.
pub fn normalize_signature(signature: &str) -> String {
    let mut out = String::with_capacity(signature.len());
    let mut pending_space = false;
    for c in signature.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && out.chars().next_back().is_some_and(is_word_char) && is_word_char(c) {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Stable global id of a symbol key.
///
/// SHA-256 over the length-prefixed qualified name, kind name and normalized
/// signature; the first 8 bytes, big-endian.
pub fn global_id(key: &SymbolKey) -> SymbolId {
    let signature = normalize_signature(&key.signature);
    let mut hasher = Sha256::new();
    for field in [
        key.qualified_name.as_str(),
        key.kind.as_str(),
        signature.as_str(),
    ] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    SymbolId::new(u64::from_be_bytes(prefix))
}

// ============================================================================
// Definition Precedence
// ============================================================================

/// Decides whether a newly seen definition displaces the current canonical one.
pub trait DefinitionPrecedence: Send + Sync + fmt::Debug {
    fn displaces(&self, current: &Location, candidate: &Location) -> bool;
}

/// The first definition in stream order is canonical.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSeen;

impl DefinitionPrecedence for FirstSeen {
    fn displaces(&self, _current: &Location, _candidate: &Location) -> bool {
        false
    }
}

/// Definitions under higher-weighted path prefixes win.
///
/// A path's weight is that of the longest configured prefix it starts with,
/// or 0. A candidate displaces only on strictly higher weight, so ties keep
/// first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PathWeighted {
    weights: Vec<(String, i32)>,
}

impl PathWeighted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a prefix weight.
    pub fn with(mut self, prefix: impl Into<String>, weight: i32) -> Self {
        self.weights.push((prefix.into(), weight));
        self
    }

    /// Weight of a path.
    pub fn weight(&self, path: &str) -> i32 {
        self.weights
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, weight)| *weight)
            .unwrap_or(0)
    }
}

impl DefinitionPrecedence for PathWeighted {
    fn displaces(&self, current: &Location, candidate: &Location) -> bool {
        self.weight(&candidate.file) > self.weight(&current.file)
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Debug, PartialEq, Eq, Hash)]
struct PlaceKey {
    symbol: SymbolId,
    role: OccurrenceRole,
    file: String,
    start: u64,
    end: u64,
}

impl PlaceKey {
    fn new(symbol: SymbolId, role: OccurrenceRole, location: &Location) -> Self {
        PlaceKey {
            symbol,
            role,
            file: location.file.clone(),
            start: location.start,
            end: location.end,
        }
    }
}

/// Incremental merger of decoded streams.
#[derive(Debug)]
pub struct Resolver {
    precedence: Box<dyn DefinitionPrecedence>,
    units: Vec<String>,
    symbols: BTreeMap<SymbolId, Symbol>,
    /// Key of every id seen, including relationship targets.
    keys: HashMap<SymbolId, SymbolKey>,
    /// Stream that contributed each canonical definition.
    definition_streams: HashMap<SymbolId, String>,
    seen: HashSet<PlaceKey>,
    includes: BTreeMap<String, Vec<String>>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Create a resolver with first-seen definition precedence.
    pub fn new() -> Self {
        Self::with_precedence(Box::new(FirstSeen))
    }

    /// Create a resolver with a custom definition precedence.
    pub fn with_precedence(precedence: Box<dyn DefinitionPrecedence>) -> Self {
        Resolver {
            precedence,
            units: Vec::new(),
            symbols: BTreeMap::new(),
            keys: HashMap::new(),
            definition_streams: HashMap::new(),
            seen: HashSet::new(),
            includes: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Merge one decoded stream.
    pub fn merge(&mut self, stream: &DecodedStream) {
        let unit = stream.unit.clone().unwrap_or_else(|| stream.name.clone());
        if !self.units.contains(&unit) {
            self.units.push(unit);
        }

        for fact in &stream.facts {
            if let FactPayload::Include(included) = &fact.payload {
                let list = self.includes.entry(fact.location.file.clone()).or_default();
                if !list.contains(included) {
                    list.push(included.clone());
                }
                continue;
            }

            let Some(key) = fact.symbol.and_then(|local| stream.symbol(local)) else {
                continue;
            };
            let id = self.intern(key);

            match fact.kind {
                FactKind::Defines => self.define(id, &fact.location, &stream.name),
                FactKind::Declares => {
                    if self.first_time(id, OccurrenceRole::Declaration, &fact.location) {
                        self.symbol_mut(id, key)
                            .declarations
                            .push(fact.location.clone());
                    }
                }
                FactKind::References | FactKind::ExpandsMacro => {
                    let kind = if fact.kind == FactKind::ExpandsMacro {
                        ReferenceKind::MacroExpansion
                    } else {
                        ReferenceKind::Use
                    };
                    if self.first_time(id, kind.role(), &fact.location) {
                        self.symbol_mut(id, key).references.push(Reference {
                            location: fact.location.clone(),
                            kind,
                        });
                    }
                }
                FactKind::InheritsFrom | FactKind::Overrides | FactKind::Calls => {
                    let FactPayload::Target(target) = &fact.payload else {
                        continue;
                    };
                    let target_key = match target {
                        TargetRef::Local(local) => match stream.symbol(*local) {
                            Some(target_key) => target_key,
                            None => continue,
                        },
                        TargetRef::Named(target_key) => target_key,
                    };
                    let target = self.intern(target_key);
                    if let Some(kind) = EdgeKind::from_fact(fact.kind) {
                        self.symbol_mut(id, key).edges.insert(Edge { kind, target });
                    }
                }
                FactKind::Includes => {}
            }
        }

        debug!(
            stream = stream.name.as_str(),
            facts = stream.facts.len(),
            symbols = self.symbols.len(),
            "merged stream"
        );
    }

    fn intern(&mut self, key: &SymbolKey) -> SymbolId {
        let id = global_id(key);
        self.keys.entry(id).or_insert_with(|| key.clone());
        id
    }

    fn symbol_mut(&mut self, id: SymbolId, key: &SymbolKey) -> &mut Symbol {
        self.symbols
            .entry(id)
            .or_insert_with(|| Symbol::new(id, key))
    }

    fn first_time(&mut self, id: SymbolId, role: OccurrenceRole, location: &Location) -> bool {
        self.seen.insert(PlaceKey::new(id, role, location))
    }

    fn define(&mut self, id: SymbolId, location: &Location, stream: &str) {
        let key = match self.keys.get(&id) {
            Some(key) => key.clone(),
            None => return,
        };
        let symbol = self
            .symbols
            .entry(id)
            .or_insert_with(|| Symbol::new(id, &key));

        let Some(current) = symbol.definition.clone() else {
            symbol.definition = Some(location.clone());
            self.definition_streams.insert(id, stream.to_string());
            return;
        };
        if current.same_place(location)
            || symbol
                .conflicts
                .iter()
                .any(|c| c.location.same_place(location))
        {
            return;
        }

        let current_stream = self
            .definition_streams
            .get(&id)
            .cloned()
            .unwrap_or_default();

        let (kept, rejected, rejected_stream) = if self.precedence.displaces(&current, location) {
            symbol.definition = Some(location.clone());
            self.definition_streams.insert(id, stream.to_string());
            (location.clone(), current, current_stream)
        } else {
            (current, location.clone(), stream.to_string())
        };

        symbol.conflicts.push(DefinitionConflict {
            location: rejected.clone(),
            stream: rejected_stream.clone(),
        });
        self.diagnostics.push(Diagnostic::MergeConflict {
            symbol: id,
            qualified_name: key.qualified_name,
            kept,
            rejected,
            stream: rejected_stream,
        });
    }

    /// Freeze the merged state into an [`Index`].
    ///
    /// Dangling relationship targets stay as edges; each is reported once per
    /// edge and its key recorded for placeholder rendering.
    pub fn finish(self) -> (Index, Vec<Diagnostic>) {
        let Resolver {
            units,
            symbols,
            keys,
            includes,
            mut diagnostics,
            ..
        } = self;

        let mut unresolved = BTreeMap::new();
        for symbol in symbols.values() {
            for edge in &symbol.edges {
                if symbols.contains_key(&edge.target) {
                    continue;
                }
                let key = keys.get(&edge.target);
                diagnostics.push(Diagnostic::UnresolvedReference {
                    source: symbol.id,
                    target: edge.target,
                    edge: edge.kind,
                    name: key.map(|k| k.qualified_name.clone()),
                });
                if let Some(key) = key {
                    unresolved.insert(edge.target, key.clone());
                }
            }
        }

        let mut raw: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();
        let mut push = |location: &Location, symbol: SymbolId, role: OccurrenceRole| {
            raw.entry(location.file.clone()).or_default().push(Occurrence {
                start: location.start,
                end: location.end,
                symbol,
                role,
            });
        };

        let mut finished = Vec::with_capacity(symbols.len());
        for (id, mut symbol) in symbols {
            symbol.declarations.sort();
            symbol.references.sort();
            if let Some(definition) = &symbol.definition {
                push(definition, id, OccurrenceRole::Definition);
            }
            for conflict in &symbol.conflicts {
                push(&conflict.location, id, OccurrenceRole::Definition);
            }
            for declaration in &symbol.declarations {
                push(declaration, id, OccurrenceRole::Declaration);
            }
            for reference in &symbol.references {
                push(&reference.location, id, reference.kind.role());
            }
            finished.push(symbol);
        }

        let mut files: BTreeMap<String, FileTable> = BTreeMap::new();
        let mut includes = includes;
        for (file, occurrences) in raw {
            let file_includes = includes.remove(&file).unwrap_or_default();
            let (table, overlaps) = FileTable::with_overlaps(occurrences, file_includes);
            for overlap in overlaps {
                let displaced = overlap.displaced;
                debug!(
                    file = %file,
                    symbol = %displaced.symbol,
                    kept = %overlap.kept,
                    "overlapping occurrence resolved"
                );
                diagnostics.push(Diagnostic::OccurrenceOverlap {
                    file: file.clone(),
                    symbol: displaced.symbol,
                    role: displaced.role,
                    start: displaced.start,
                    end: displaced.end,
                    kept: overlap.kept,
                    resolution: overlap.resolution,
                });
            }
            files.insert(file, table);
        }
        for (file, file_includes) in includes {
            files.insert(file, FileTable::new(Vec::new(), file_includes));
        }

        let index = Index::new(units, finished, files, unresolved);
        let stats = index.stats();
        info!(
            units = stats.units,
            symbols = stats.symbols,
            occurrences = stats.occurrences,
            conflicts = stats.conflicts,
            dangling = stats.dangling_edges,
            "index finalized"
        );
        (index, diagnostics)
    }
}

// ============================================================================
// Tests
// ============================================================================
