//! Common types shared across the decoder, resolver, index and renderer.
//!
//! This module contains the small value types every stage agrees on,
//! avoiding circular dependencies between the larger modules:
//! - [`Span`]: half-open byte range
//! - [`Location`]: source-root-relative file plus byte range and line/column
//! - [`SymbolId`]: content-derived global symbol identity

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Create a span, returning `None` when `start > end`.
    pub fn checked(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Span { start, end })
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Location
// ============================================================================

/// A position in the source tree.
///
/// - `file`: source-root-relative path, forward slashes
/// - `start`/`end`: byte range, end exclusive
/// - `line`/`col`: 1-indexed, columns count bytes
///
/// Two locations denote the same place when file and byte range agree;
/// line and column are derived data carried for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path (source-root-relative).
    pub file: String,
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, bytes).
    pub col: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(file: impl Into<String>, span: Span, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            start: span.start,
            end: span.end,
            line,
            col,
        }
    }

    /// True when both locations cover the same bytes of the same file.
    pub fn same_place(&self, other: &Location) -> bool {
        self.file == other.file && self.start == other.start && self.end == other.end
    }

    /// Comparison key for deterministic sorting: (file, start, end).
    fn sort_key(&self) -> (&str, u64, u64) {
        (&self.file, self.start, self.end)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| (self.line, self.col).cmp(&(other.line, other.col)))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

// ============================================================================
// Global Symbol Identity
// ============================================================================

/// Global, content-derived symbol identity.
///
/// Derived from the symbol's qualified name, kind and normalized signature
/// (see [`crate::resolve::global_id`]), never from a compiler-local number, so
/// independent runs over the same tree agree. Serialized as 16 lowercase hex
/// digits so JSON consumers never lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolId(pub u64);

impl SymbolId {
    /// Create a symbol ID from its raw value.
    pub fn new(id: u64) -> Self {
        SymbolId(id)
    }

    /// Parse the 16-digit hex form.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 16 {
            return None;
        }
        u64::from_str_radix(s, 16).ok().map(SymbolId)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<SymbolId> for String {
    fn from(id: SymbolId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SymbolId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SymbolId::parse(&value).ok_or_else(|| format!("invalid symbol id '{}'", value))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod span_tests {
        use super::*;

        #[test]
        fn checked_rejects_inverted_range() {
            assert!(Span::checked(7, 3).is_none());
            assert_eq!(Span::checked(3, 3), Some(Span::new(3, 3)));
        }
    }

    mod location_tests {
        use super::*;

        #[test]
        fn same_place_ignores_line_and_col() {
            let a = Location::new("a.c", Span::new(4, 7), 1, 5);
            let b = Location::new("a.c", Span::new(4, 7), 9, 9);
            assert!(a.same_place(&b));
            assert!(!a.same_place(&Location::new("b.c", Span::new(4, 7), 1, 5)));
        }

        #[test]
        fn ordering_is_file_then_offset() {
            let mut locs = vec![
                Location::new("b.c", Span::new(0, 1), 1, 1),
                Location::new("a.c", Span::new(10, 12), 2, 1),
                Location::new("a.c", Span::new(3, 4), 1, 4),
            ];
            locs.sort();
            assert_eq!(locs[0].start, 3);
            assert_eq!(locs[1].start, 10);
            assert_eq!(locs[2].file, "b.c");
        }

        #[test]
        fn display_is_path_line_col() {
            let loc = Location::new("src/main.c", Span::new(0, 3), 12, 5);
            assert_eq!(loc.to_string(), "src/main.c:12:5");
        }
    }

    mod symbol_id_tests {
        use super::*;

        #[test]
        fn serializes_as_hex_string() {
            let id = SymbolId::new(0xdead_beef);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"00000000deadbeef\"");
            let back: SymbolId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }

        #[test]
        fn parse_rejects_wrong_length() {
            assert!(SymbolId::parse("abc").is_none());
            assert!(SymbolId::parse("zzzzzzzzzzzzzzzz").is_none());
        }
    }
}
