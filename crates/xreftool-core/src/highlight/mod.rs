//! Lexical syntax highlighting.
//!
//! [`highlight`] classifies every byte of a file using a [`Grammar`] table.
//! It never parses: keywords, comments, strings, numbers and punctuation are
//! recognized token by token. The result is a list of [`HighlightSpan`]s that
//! are sorted, non-overlapping and cover `[0, len)` without gaps.
//!
//! Lexical errors never fail: an unterminated string or char literal ends at
//! the end of its line, an unterminated block comment runs to the end of the
//! file, and each such recovery is reported.

pub mod grammar;

pub use grammar::{Grammar, GrammarSet, StringDelimiter};

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::text::line_end;

// ============================================================================
// Output Types
// ============================================================================

/// Presentation class of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightClass {
    Keyword,
    Type,
    Literal,
    Identifier,
    Number,
    String,
    Char,
    Comment,
    Preprocessor,
    Punctuation,
    Whitespace,
    Text,
}

impl HighlightClass {
    /// CSS class name used by the renderer.
    pub fn css_class(&self) -> &'static str {
        match self {
            HighlightClass::Keyword => "kw",
            HighlightClass::Type => "type",
            HighlightClass::Literal => "lit",
            HighlightClass::Identifier => "id",
            HighlightClass::Number => "num",
            HighlightClass::String => "str",
            HighlightClass::Char => "chr",
            HighlightClass::Comment => "com",
            HighlightClass::Preprocessor => "pp",
            HighlightClass::Punctuation => "punct",
            HighlightClass::Whitespace => "ws",
            HighlightClass::Text => "text",
        }
    }

    /// Classes whose adjacent spans are merged.
    fn merges(&self) -> bool {
        matches!(
            self,
            HighlightClass::Punctuation | HighlightClass::Whitespace | HighlightClass::Text
        )
    }
}

/// A classified byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub class: HighlightClass,
}

/// A lexical error the highlighter recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recovery {
    /// Offset where the unterminated construct starts.
    pub offset: usize,
    /// `string`, `char` or `block comment`.
    pub construct: &'static str,
}

/// Highlighter output for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlighted {
    pub spans: Vec<HighlightSpan>,
    pub recoveries: Vec<Recovery>,
}

impl Highlighted {
    /// Recoveries as diagnostics for `file`.
    pub fn diagnostics(&self, file: &str) -> Vec<Diagnostic> {
        self.recoveries
            .iter()
            .map(|r| Diagnostic::TokenizeRecovery {
                file: file.to_string(),
                offset: r.offset as u64,
                construct: r.construct.to_string(),
            })
            .collect()
    }
}

// ============================================================================
// Lexer
// ============================================================================

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

struct Lexer<'a> {
    text: &'a [u8],
    grammar: &'a Grammar,
    pos: usize,
    at_line_start: bool,
    out: Highlighted,
}

impl Lexer<'_> {
    fn starts_with(&self, at: usize, marker: &str) -> bool {
        !marker.is_empty() && self.text[at..].starts_with(marker.as_bytes())
    }

    fn push(&mut self, end: usize, class: HighlightClass) {
        let start = self.pos;
        debug_assert!(end > start);
        match self.out.spans.last_mut() {
            Some(last) if class.merges() && last.class == class && last.end == start => {
                last.end = end;
            }
            _ => self.out.spans.push(HighlightSpan { start, end, class }),
        }
        if class != HighlightClass::Whitespace {
            self.at_line_start = false;
        }
        self.pos = end;
    }

    fn recover(&mut self, offset: usize, construct: &'static str) {
        self.out.recoveries.push(Recovery { offset, construct });
    }

    /// End of a preprocessor line, following backslash continuations.
    fn preprocessor_end(&self) -> usize {
        let mut end = line_end(self.text, self.pos);
        while end < self.text.len() && end > self.pos && self.text[end - 1] == b'\\' {
            end = line_end(self.text, end + 1);
        }
        end
    }

    /// Scan a delimited literal whose opening delimiter starts at `pos`.
    ///
    /// Returns the end offset and whether the literal was terminated.
    fn delimited(&self, open: &str, close: &str, multiline: bool) -> (usize, bool) {
        let text = self.text;
        let mut i = self.pos + open.len();
        let escape = self.grammar.escape.and_then(|c| u8::try_from(c).ok());
        while i < text.len() {
            if Some(text[i]) == escape {
                if i + 1 < text.len() && (multiline || text[i + 1] != b'\n') {
                    i += 2;
                    continue;
                }
                i += 1;
                continue;
            }
            if self.starts_with(i, close) {
                return (i + close.len(), true);
            }
            if text[i] == b'\n' && !multiline {
                return (i, false);
            }
            i += 1;
        }
        (text.len(), false)
    }

    /// Length of a Rust-style lifetime at `pos`, if one starts there.
    fn lifetime_end(&self) -> Option<usize> {
        let text = self.text;
        let first = *text.get(self.pos + 1)?;
        if !is_ident_start(first) {
            return None;
        }
        let mut j = self.pos + 2;
        while j < text.len() && is_ident_continue(text[j]) {
            j += 1;
        }
        (text.get(j) != Some(&b'\'')).then_some(j)
    }

    fn next_token(&mut self) {
        let text = self.text;
        let grammar = self.grammar;
        let pos = self.pos;
        let b = text[pos];

        if b.is_ascii_whitespace() {
            let mut end = pos;
            while end < text.len() && text[end].is_ascii_whitespace() {
                end += 1;
            }
            let saw_newline = text[pos..end].contains(&b'\n');
            self.push(end, HighlightClass::Whitespace);
            if saw_newline {
                self.at_line_start = true;
            }
            return;
        }

        if self.at_line_start {
            if let Some(marker) = &grammar.preprocessor {
                if self.starts_with(pos, marker) {
                    let end = self.preprocessor_end();
                    self.push(end, HighlightClass::Preprocessor);
                    return;
                }
            }
        }

        if grammar.line_comments.iter().any(|m| self.starts_with(pos, m)) {
            let end = line_end(text, pos);
            self.push(end, HighlightClass::Comment);
            return;
        }

        for (open, close) in &grammar.block_comments {
            if self.starts_with(pos, open) {
                let search_from = pos + open.len();
                let end = text[search_from..]
                    .windows(close.len().max(1))
                    .position(|w| w == close.as_bytes())
                    .map(|p| search_from + p + close.len());
                match end {
                    Some(end) if !close.is_empty() => self.push(end, HighlightClass::Comment),
                    _ => {
                        self.recover(pos, "block comment");
                        self.push(text.len(), HighlightClass::Comment);
                    }
                }
                return;
            }
        }

        for delimiter in &grammar.strings {
            if self.starts_with(pos, &delimiter.open) {
                let (end, terminated) =
                    self.delimited(&delimiter.open, &delimiter.close, delimiter.multiline);
                if !terminated {
                    self.recover(pos, "string");
                }
                self.push(end, HighlightClass::String);
                return;
            }
        }

        for delimiter in &grammar.chars {
            if self.starts_with(pos, delimiter) {
                if grammar.lifetimes && delimiter == "'" {
                    if let Some(end) = self.lifetime_end() {
                        self.push(end, HighlightClass::Identifier);
                        return;
                    }
                }
                let (end, terminated) = self.delimited(delimiter, delimiter, false);
                if !terminated {
                    self.recover(pos, "char");
                }
                self.push(end, HighlightClass::Char);
                return;
            }
        }

        if b.is_ascii_digit()
            || (b == b'.' && text.get(pos + 1).is_some_and(u8::is_ascii_digit))
        {
            let mut end = pos + 1;
            while end < text.len() && (is_ident_continue(text[end]) || text[end] == b'.') {
                end += 1;
            }
            self.push(end, HighlightClass::Number);
            return;
        }

        if is_ident_start(b) {
            let mut end = pos + 1;
            while end < text.len() && is_ident_continue(text[end]) {
                end += 1;
            }
            let word = String::from_utf8_lossy(&text[pos..end]);
            let word: &str = &word;
            let class = if grammar.keywords.contains(word) {
                HighlightClass::Keyword
            } else if grammar.types.contains(word) {
                HighlightClass::Type
            } else if grammar.literals.contains(word) {
                HighlightClass::Literal
            } else {
                HighlightClass::Identifier
            };
            self.push(end, class);
            return;
        }

        let class = if b.is_ascii_punctuation() {
            HighlightClass::Punctuation
        } else {
            HighlightClass::Text
        };
        self.push(pos + 1, class);
    }
}

/// Classify every byte of `text`.
pub fn highlight(text: &[u8], grammar: &Grammar) -> Highlighted {
    let mut lexer = Lexer {
        text,
        grammar,
        pos: 0,
        at_line_start: true,
        out: Highlighted::default(),
    };
    while lexer.pos < text.len() {
        lexer.next_token();
    }
    lexer.out
}

// ============================================================================
// Tests
// ============================================================================
