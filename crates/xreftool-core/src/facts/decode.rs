//! Fact stream decoder.
//!
//! A stream is JSON Lines, one record per line, tagged by `"record"`:
//!
//! ```text
//! {"record":"header","format":"xref-facts","version":1,"unit":"src/b.c"}
//! {"record":"symbol","id":1,"name":"foo","kind":"function","signature":"void ()"}
//! {"record":"fact","kind":"defines","symbol":1,"loc":{"file":"src/b.c","start":5,"end":8}}
//! {"record":"end","facts":1}
//! ```
//!
//! Structural problems (bad header, unparseable line, undeclared local id,
//! missing payload, missing or disagreeing `end` record) reject the whole
//! stream with a [`DecodeError`]. Problems with a single fact's location are
//! not structural: the fact is dropped and a [`Diagnostic`] is attached to the
//! decoded stream.
//!
//! Symbol records must precede the facts that use them.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::{
    Fact, FactKind, FactPayload, LocalSymbolId, SymbolKey, SymbolKind, SymbolTable, TargetRef,
    FACTS_FORMAT, FACTS_VERSION,
};
use crate::diagnostics::Diagnostic;
use crate::text::LineIndex;
use crate::types::{Location, Span};
use crate::workspace::SourceTree;

// ============================================================================
// Errors
// ============================================================================

/// Why a stream was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorReason {
    #[error("stream does not start with a header record")]
    MissingHeader,
    #[error("unsupported stream format '{format}' version {version}")]
    UnsupportedFormat { format: String, version: u32 },
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("fact uses undeclared local symbol {0}")]
    UndeclaredSymbol(LocalSymbolId),
    #[error("local symbol {0} declared twice with different identities")]
    ConflictingSymbol(LocalSymbolId),
    #[error("{kind:?} fact is missing its '{field}'")]
    MissingField { kind: FactKind, field: &'static str },
    #[error("stream is truncated (no end record)")]
    Truncated,
    #[error("end record declares {declared} facts, stream has {actual}")]
    CountMismatch { declared: u64, actual: u64 },
    #[error("data after end record")]
    TrailingData,
    #[error("read failed: {0}")]
    Io(String),
}

/// A stream that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stream}: byte {offset}: {reason}")]
pub struct DecodeError {
    /// Stream name (usually its path).
    pub stream: String,
    /// Byte offset of the offending record.
    pub offset: u64,
    /// What went wrong.
    pub reason: DecodeErrorReason,
}

impl DecodeError {
    fn new(stream: &str, offset: usize, reason: DecodeErrorReason) -> Self {
        DecodeError {
            stream: stream.to_string(),
            offset: offset as u64,
            reason,
        }
    }
}

impl From<&DecodeError> for Diagnostic {
    fn from(err: &DecodeError) -> Self {
        Diagnostic::DecodeError {
            stream: err.stream.clone(),
            offset: err.offset,
            reason: err.reason.to_string(),
        }
    }
}

// ============================================================================
// Decoded Stream
// ============================================================================

/// The result of decoding one stream.
#[derive(Debug, Clone, Default)]
pub struct DecodedStream {
    /// Stream name (usually its path).
    pub name: String,
    /// Translation unit named in the header, if any.
    pub unit: Option<String>,
    /// Local symbol table.
    pub symbols: SymbolTable,
    /// Surviving facts in stream order.
    pub facts: Vec<Fact>,
    /// Facts dropped during decoding.
    pub warnings: Vec<Diagnostic>,
}

impl DecodedStream {
    /// Look up a local symbol's key.
    pub fn symbol(&self, id: LocalSymbolId) -> Option<&SymbolKey> {
        self.symbols.get(&id)
    }
}

// ============================================================================
// Wire Records
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum WireRecord {
    Header {
        format: String,
        version: u32,
        #[serde(default)]
        unit: Option<String>,
    },
    Symbol {
        id: u32,
        name: String,
        kind: SymbolKind,
        #[serde(default)]
        signature: String,
    },
    Fact {
        kind: FactKind,
        #[serde(default)]
        symbol: Option<u32>,
        loc: WireLocation,
        #[serde(default)]
        target: Option<WireTarget>,
        #[serde(default)]
        path: Option<String>,
    },
    End {
        facts: u64,
    },
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    file: String,
    start: u64,
    end: u64,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    col: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTarget {
    Local {
        id: u32,
    },
    Named {
        name: String,
        kind: SymbolKind,
        #[serde(default)]
        signature: String,
    },
}

// ============================================================================
// Decoding
// ============================================================================

/// Read and decode a stream file.
pub fn decode_file(path: &Path, tree: &SourceTree) -> Result<DecodedStream, DecodeError> {
    let name = path.display().to_string();
    let bytes = fs::read(path)
        .map_err(|e| DecodeError::new(&name, 0, DecodeErrorReason::Io(e.to_string())))?;
    decode_stream(&name, &bytes, tree)
}

/// Decode one serialized fact stream against the run's source tree.
pub fn decode_stream(
    name: &str,
    bytes: &[u8],
    tree: &SourceTree,
) -> Result<DecodedStream, DecodeError> {
    let mut decoder = Decoder {
        name,
        tree,
        stream: DecodedStream {
            name: name.to_string(),
            ..DecodedStream::default()
        },
        line_indexes: HashMap::new(),
    };

    let mut header_seen = false;
    let mut end_seen = false;
    let mut fact_records = 0u64;
    let mut offset = 0usize;

    for raw_line in bytes.split(|&b| b == b'\n') {
        let line_offset = offset;
        offset += raw_line.len() + 1;

        if raw_line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if end_seen {
            return Err(DecodeError::new(
                name,
                line_offset,
                DecodeErrorReason::TrailingData,
            ));
        }

        let record: WireRecord = serde_json::from_slice(raw_line).map_err(|e| {
            DecodeError::new(name, line_offset, DecodeErrorReason::Malformed(e.to_string()))
        })?;

        if !header_seen {
            let WireRecord::Header {
                format,
                version,
                unit,
            } = record
            else {
                return Err(DecodeError::new(
                    name,
                    line_offset,
                    DecodeErrorReason::MissingHeader,
                ));
            };
            if format != FACTS_FORMAT || version != FACTS_VERSION {
                return Err(DecodeError::new(
                    name,
                    line_offset,
                    DecodeErrorReason::UnsupportedFormat { format, version },
                ));
            }
            decoder.stream.unit = unit;
            header_seen = true;
            continue;
        }

        match record {
            WireRecord::Header { .. } => {
                return Err(DecodeError::new(
                    name,
                    line_offset,
                    DecodeErrorReason::Malformed("duplicate header record".to_string()),
                ));
            }
            WireRecord::Symbol {
                id,
                name: qualified_name,
                kind,
                signature,
            } => {
                let id = LocalSymbolId::new(id);
                let key = SymbolKey::new(qualified_name, kind).with_signature(signature);
                if let Some(existing) = decoder.stream.symbols.get(&id) {
                    if *existing != key {
                        return Err(DecodeError::new(
                            name,
                            line_offset,
                            DecodeErrorReason::ConflictingSymbol(id),
                        ));
                    }
                } else {
                    decoder.stream.symbols.insert(id, key);
                }
            }
            WireRecord::Fact {
                kind,
                symbol,
                loc,
                target,
                path,
            } => {
                fact_records += 1;
                decoder
                    .fact(kind, symbol, loc, target, path)
                    .map_err(|reason| DecodeError::new(name, line_offset, reason))?;
            }
            WireRecord::End { facts } => {
                if facts != fact_records {
                    return Err(DecodeError::new(
                        name,
                        line_offset,
                        DecodeErrorReason::CountMismatch {
                            declared: facts,
                            actual: fact_records,
                        },
                    ));
                }
                end_seen = true;
            }
        }
    }

    if !header_seen {
        return Err(DecodeError::new(name, 0, DecodeErrorReason::MissingHeader));
    }
    if !end_seen {
        return Err(DecodeError::new(
            name,
            bytes.len(),
            DecodeErrorReason::Truncated,
        ));
    }

    debug!(
        stream = name,
        symbols = decoder.stream.symbols.len(),
        facts = decoder.stream.facts.len(),
        dropped = decoder.stream.warnings.len(),
        "decoded stream"
    );
    Ok(decoder.stream)
}

struct Decoder<'a> {
    name: &'a str,
    tree: &'a SourceTree,
    stream: DecodedStream,
    line_indexes: HashMap<String, LineIndex>,
}

impl Decoder<'_> {
    /// Validate one fact record and append it, or drop it with a warning.
    fn fact(
        &mut self,
        kind: FactKind,
        symbol: Option<u32>,
        loc: WireLocation,
        target: Option<WireTarget>,
        path: Option<String>,
    ) -> Result<(), DecodeErrorReason> {
        let tree = self.tree;
        let symbol = if kind.has_subject() {
            let id = LocalSymbolId::new(symbol.ok_or(DecodeErrorReason::MissingField {
                kind,
                field: "symbol",
            })?);
            if !self.stream.symbols.contains_key(&id) {
                return Err(DecodeErrorReason::UndeclaredSymbol(id));
            }
            Some(id)
        } else {
            None
        };

        let payload = if kind.is_relationship() {
            let target = target.ok_or(DecodeErrorReason::MissingField {
                kind,
                field: "target",
            })?;
            let target = match target {
                WireTarget::Local { id } => {
                    let id = LocalSymbolId::new(id);
                    if !self.stream.symbols.contains_key(&id) {
                        return Err(DecodeErrorReason::UndeclaredSymbol(id));
                    }
                    TargetRef::Local(id)
                }
                WireTarget::Named {
                    name,
                    kind,
                    signature,
                } => TargetRef::Named(SymbolKey::new(name, kind).with_signature(signature)),
            };
            FactPayload::Target(target)
        } else if kind == FactKind::Includes {
            let raw = path.ok_or(DecodeErrorReason::MissingField {
                kind,
                field: "path",
            })?;
            match tree.resolve(&raw) {
                Ok(file) => FactPayload::Include(file.path.clone()),
                Err(reason) => {
                    self.stream.warnings.push(Diagnostic::PathViolation {
                        stream: self.name.to_string(),
                        path: raw,
                        reason,
                    });
                    return Ok(());
                }
            }
        } else {
            FactPayload::None
        };

        if let Some(location) = self.location(loc) {
            self.stream.facts.push(Fact {
                kind,
                symbol,
                location,
                payload,
            });
        }
        Ok(())
    }

    /// Normalize and bounds-check a wire location. `None` means dropped.
    fn location(&mut self, loc: WireLocation) -> Option<Location> {
        let tree = self.tree;
        let file = match tree.resolve(&loc.file) {
            Ok(file) => file,
            Err(reason) => {
                self.stream.warnings.push(Diagnostic::PathViolation {
                    stream: self.name.to_string(),
                    path: loc.file,
                    reason,
                });
                return None;
            }
        };

        let span = match Span::checked(loc.start, loc.end) {
            Some(span) if span.end <= file.size_bytes => span,
            _ => {
                self.stream.warnings.push(Diagnostic::InvalidLocation {
                    stream: self.name.to_string(),
                    file: file.path.clone(),
                    start: loc.start,
                    end: loc.end,
                    file_len: file.size_bytes,
                });
                return None;
            }
        };

        let (line, col) = match (loc.line, loc.col) {
            (Some(line), Some(col)) => (line, col),
            _ => self
                .line_indexes
                .entry(file.path.clone())
                .or_insert_with(|| LineIndex::new(file.content()))
                .position(span.start as usize),
        };

        Some(Location::new(file.path.clone(), span, line, col))
    }
}

// ============================================================================
// Tests
// ============================================================================
