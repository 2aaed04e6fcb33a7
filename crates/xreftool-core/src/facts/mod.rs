//! Facts model: the flattened observations emitted by the extraction collaborator.
//!
//! One fact stream is produced per translation unit. It carries:
//! - a local symbol table ([`SymbolRecord`]) mapping compiler-local ids to a
//!   [`SymbolKey`] (qualified name, kind, signature)
//! - an ordered sequence of [`Fact`]s, each tagged with a [`Location`]
//!
//! Facts are immutable once decoded (see [`decode`]), consumed once by the
//! resolver, then dropped. Nothing in this module knows about global ids; that
//! mapping is the resolver's job.
//!
//! # Schema Versioning
//!
//! [`FACTS_FORMAT`] and [`FACTS_VERSION`] identify the wire format accepted by
//! the decoder. Streams declaring any other format or version are rejected.

pub mod decode;

use crate::types::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use decode::{decode_stream, DecodeError, DecodedStream};

// ============================================================================
// Schema Version
// ============================================================================

/// Format tag expected in a fact stream header.
pub const FACTS_FORMAT: &str = "xref-facts";

/// Wire format version expected in a fact stream header.
pub const FACTS_VERSION: u32 = 1;

// ============================================================================
// ID Types
// ============================================================================

/// Compiler-local symbol identifier, meaningful only within one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct LocalSymbolId(pub u32);

impl LocalSymbolId {
    /// Create a new local symbol ID.
    pub fn new(id: u32) -> Self {
        LocalSymbolId(id)
    }
}

impl fmt::Display for LocalSymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kind of symbol, as reported by extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Typedef,
    Variable,
    Field,
    Parameter,
    EnumConstant,
    Macro,
    Namespace,
    Label,
}

impl SymbolKind {
    /// Stable lowercase name, used in hashing and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
            SymbolKind::Typedef => "typedef",
            SymbolKind::Variable => "variable",
            SymbolKind::Field => "field",
            SymbolKind::Parameter => "parameter",
            SymbolKind::EnumConstant => "enum_constant",
            SymbolKind::Macro => "macro",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Label => "label",
        }
    }

    /// Parse the lowercase name produced by [`SymbolKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "type" => SymbolKind::Type,
            "typedef" => SymbolKind::Typedef,
            "variable" => SymbolKind::Variable,
            "field" => SymbolKind::Field,
            "parameter" => SymbolKind::Parameter,
            "enum_constant" => SymbolKind::EnumConstant,
            "macro" => SymbolKind::Macro,
            "namespace" => SymbolKind::Namespace,
            "label" => SymbolKind::Label,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    /// A declaration without a body (prototype, `extern`, forward decl).
    Declares,
    /// The definition (body) of a symbol.
    Defines,
    /// A use of a symbol.
    References,
    /// Type inheritance: subject derives from target.
    InheritsFrom,
    /// Method override: subject overrides target.
    Overrides,
    /// Call relationship: subject calls target.
    Calls,
    /// File inclusion: the fact's file includes `path`.
    Includes,
    /// A macro expansion site of the subject macro.
    ExpandsMacro,
}

impl FactKind {
    /// True for relationship kinds that carry a target symbol.
    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            FactKind::InheritsFrom | FactKind::Overrides | FactKind::Calls
        )
    }

    /// True for kinds that name a subject symbol.
    pub fn has_subject(&self) -> bool {
        !matches!(self, FactKind::Includes)
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// The content that determines a symbol's global identity.
///
/// Two local symbols from different streams with equal keys (after signature
/// normalization) are the same logical entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    /// Fully qualified name (`ns::Class::method`).
    pub qualified_name: String,
    /// Kind of symbol.
    pub kind: SymbolKind,
    /// Signature as spelled by extraction (normalized before hashing).
    #[serde(default)]
    pub signature: String,
}

impl SymbolKey {
    /// Create a new symbol key.
    pub fn new(qualified_name: impl Into<String>, kind: SymbolKind) -> Self {
        SymbolKey {
            qualified_name: qualified_name.into(),
            kind,
            signature: String::new(),
        }
    }

    /// Set the signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }
}

/// Local symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub local_id: LocalSymbolId,
    pub key: SymbolKey,
}

// ============================================================================
// Facts
// ============================================================================

/// Target of a relationship fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    /// A symbol from the same stream's symbol table.
    Local(LocalSymbolId),
    /// A symbol named directly (e.g. a base class the unit never declares).
    Named(SymbolKey),
}

/// Kind-specific payload of a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactPayload {
    /// Declares, defines, references, expands-macro.
    None,
    /// Relationship target.
    Target(TargetRef),
    /// Normalized, source-root-relative path of an included file.
    Include(String),
}

/// One observation from extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    /// Kind of fact.
    pub kind: FactKind,
    /// Subject symbol. `None` only for [`FactKind::Includes`].
    pub symbol: Option<LocalSymbolId>,
    /// Where the fact was observed.
    pub location: Location,
    /// Kind-specific payload.
    pub payload: FactPayload,
}

impl Fact {
    /// Create a fact without payload.
    pub fn new(kind: FactKind, symbol: LocalSymbolId, location: Location) -> Self {
        Fact {
            kind,
            symbol: Some(symbol),
            location,
            payload: FactPayload::None,
        }
    }

    /// Create a relationship fact.
    pub fn relationship(
        kind: FactKind,
        symbol: LocalSymbolId,
        location: Location,
        target: TargetRef,
    ) -> Self {
        Fact {
            kind,
            symbol: Some(symbol),
            location,
            payload: FactPayload::Target(target),
        }
    }

    /// Create an include fact.
    pub fn include(location: Location, path: impl Into<String>) -> Self {
        Fact {
            kind: FactKind::Includes,
            symbol: None,
            location,
            payload: FactPayload::Include(path.into()),
        }
    }
}

/// Local symbol table of one stream, keyed by local id (deterministic order).
pub type SymbolTable = BTreeMap<LocalSymbolId, SymbolKey>;

// ============================================================================
// Tests
// ============================================================================
