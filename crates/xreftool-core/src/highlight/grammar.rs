//! Grammar tables for the lexical highlighter.
//!
//! A [`Grammar`] is plain data: keyword lists, comment markers, string and
//! char delimiters, an escape byte and an optional preprocessor marker. The
//! built-in set covers C/C++, Rust, Python and plain text; additional tables
//! are loaded from JSON and replace built-ins for the extensions they claim.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::XrefError;

// ============================================================================
// Grammar
// ============================================================================

/// Opening and closing delimiter of a string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDelimiter {
    pub open: String,
    pub close: String,
    /// Whether the literal may span lines.
    #[serde(default)]
    pub multiline: bool,
}

impl StringDelimiter {
    fn single_line(delimiter: &str) -> Self {
        StringDelimiter {
            open: delimiter.to_string(),
            close: delimiter.to_string(),
            multiline: false,
        }
    }

    fn multi_line(delimiter: &str) -> Self {
        StringDelimiter {
            open: delimiter.to_string(),
            close: delimiter.to_string(),
            multiline: true,
        }
    }
}

/// Lexical description of one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub name: String,
    /// File extensions (without dot, lowercase) this grammar claims.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Builtin type names (`int`, `u32`, ...).
    #[serde(default)]
    pub types: BTreeSet<String>,
    /// Literal keywords (`true`, `nullptr`, `None`, ...).
    #[serde(default)]
    pub literals: BTreeSet<String>,
    #[serde(default)]
    pub line_comments: Vec<String>,
    /// (open, close) pairs.
    #[serde(default)]
    pub block_comments: Vec<(String, String)>,
    /// Tried in order; list longer delimiters first.
    #[serde(default)]
    pub strings: Vec<StringDelimiter>,
    #[serde(default)]
    pub chars: Vec<String>,
    #[serde(default)]
    pub escape: Option<char>,
    /// Marker that starts a preprocessor line when first on the line.
    #[serde(default)]
    pub preprocessor: Option<String>,
    /// `'ident` without a closing quote is a lifetime, not a char literal.
    #[serde(default)]
    pub lifetimes: bool,
}

fn words(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Grammar {
    /// Grammar with no tokens beyond identifiers, numbers and punctuation.
    pub fn plain_text() -> Self {
        Grammar {
            name: "text".to_string(),
            extensions: vec!["txt".to_string()],
            keywords: BTreeSet::new(),
            types: BTreeSet::new(),
            literals: BTreeSet::new(),
            line_comments: Vec::new(),
            block_comments: Vec::new(),
            strings: Vec::new(),
            chars: Vec::new(),
            escape: None,
            preprocessor: None,
            lifetimes: false,
        }
    }

    /// C and C++.
    pub fn c_family() -> Self {
        Grammar {
            name: "c".to_string(),
            extensions: ["c", "h", "cc", "cpp", "cxx", "hh", "hpp", "hxx", "inl"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            keywords: words(&[
                "alignas", "alignof", "auto", "break", "case", "catch", "class", "const",
                "constexpr", "const_cast", "continue", "decltype", "default", "delete", "do",
                "dynamic_cast", "else", "enum", "explicit", "export", "extern", "final", "for",
                "friend", "goto", "if", "inline", "mutable", "namespace", "new", "noexcept",
                "operator", "override", "private", "protected", "public", "register",
                "reinterpret_cast", "restrict", "return", "sizeof", "static", "static_assert",
                "static_cast", "struct", "switch", "template", "this", "throw", "try",
                "typedef", "typeid", "typename", "union", "using", "virtual", "volatile",
                "while",
            ]),
            types: words(&[
                "bool", "char", "char16_t", "char32_t", "double", "float", "int", "int8_t",
                "int16_t", "int32_t", "int64_t", "long", "ptrdiff_t", "short", "signed",
                "size_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "unsigned", "void",
                "wchar_t",
            ]),
            literals: words(&["true", "false", "nullptr", "NULL"]),
            line_comments: vec!["//".to_string()],
            block_comments: vec![("/*".to_string(), "*/".to_string())],
            strings: vec![StringDelimiter::single_line("\"")],
            chars: vec!["'".to_string()],
            escape: Some('\\'),
            preprocessor: Some("#".to_string()),
            lifetimes: false,
        }
    }

    /// Rust.
    pub fn rust() -> Self {
        Grammar {
            name: "rust".to_string(),
            extensions: vec!["rs".to_string()],
            keywords: words(&[
                "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
                "enum", "extern", "fn", "for", "if", "impl", "in", "let", "loop", "match",
                "mod", "move", "mut", "pub", "ref", "return", "self", "Self", "static",
                "struct", "super", "trait", "type", "unsafe", "use", "where", "while",
            ]),
            types: words(&[
                "bool", "char", "f32", "f64", "i8", "i16", "i32", "i64", "i128", "isize", "str",
                "u8", "u16", "u32", "u64", "u128", "usize", "String", "Vec", "Option", "Result",
                "Box",
            ]),
            literals: words(&["true", "false", "None", "Some", "Ok", "Err"]),
            line_comments: vec!["//".to_string()],
            block_comments: vec![("/*".to_string(), "*/".to_string())],
            strings: vec![StringDelimiter::multi_line("\"")],
            chars: vec!["'".to_string()],
            escape: Some('\\'),
            preprocessor: None,
            lifetimes: true,
        }
    }

    /// Python.
    pub fn python() -> Self {
        Grammar {
            name: "python".to_string(),
            extensions: vec!["py".to_string(), "pyi".to_string()],
            keywords: words(&[
                "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
                "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
                "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
                "return", "try", "while", "with", "yield",
            ]),
            types: words(&[
                "bool", "bytes", "dict", "float", "int", "list", "object", "set", "str",
                "tuple",
            ]),
            literals: words(&["True", "False", "None"]),
            line_comments: vec!["#".to_string()],
            block_comments: Vec::new(),
            strings: vec![
                StringDelimiter::multi_line("\"\"\""),
                StringDelimiter::multi_line("'''"),
                StringDelimiter::single_line("\""),
                StringDelimiter::single_line("'"),
            ],
            chars: Vec::new(),
            escape: Some('\\'),
            preprocessor: None,
            lifetimes: false,
        }
    }
}

// ============================================================================
// Grammar Set
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum GrammarFile {
    One(Grammar),
    Many(Vec<Grammar>),
}

/// Grammars keyed by file extension.
#[derive(Debug, Clone)]
pub struct GrammarSet {
    grammars: Vec<Grammar>,
    by_extension: BTreeMap<String, usize>,
    plain: Grammar,
}

impl Default for GrammarSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GrammarSet {
    /// An empty set (only the plain text fallback).
    pub fn empty() -> Self {
        GrammarSet {
            grammars: Vec::new(),
            by_extension: BTreeMap::new(),
            plain: Grammar::plain_text(),
        }
    }

    /// The built-in grammars.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(Grammar::c_family());
        set.insert(Grammar::rust());
        set.insert(Grammar::python());
        set.insert(Grammar::plain_text());
        set
    }

    /// Add a grammar; it replaces earlier grammars for every extension it claims.
    pub fn insert(&mut self, grammar: Grammar) {
        let idx = self.grammars.len();
        for extension in &grammar.extensions {
            self.by_extension
                .insert(extension.trim_start_matches('.').to_ascii_lowercase(), idx);
        }
        self.grammars.push(grammar);
    }

    /// Parse grammar tables from JSON (one object or an array of objects).
    pub fn parse_json(json: &str) -> Result<Vec<Grammar>, serde_json::Error> {
        Ok(match serde_json::from_str(json)? {
            GrammarFile::One(grammar) => vec![grammar],
            GrammarFile::Many(grammars) => grammars,
        })
    }

    /// Load grammar tables from a JSON file and add them.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, XrefError> {
        let json = fs::read_to_string(path).map_err(|e| XrefError::input(path, e.to_string()))?;
        let grammars =
            Self::parse_json(&json).map_err(|e| XrefError::input(path, e.to_string()))?;
        let count = grammars.len();
        for grammar in grammars {
            self.insert(grammar);
        }
        Ok(count)
    }

    /// Grammar claiming the path's extension, if any.
    pub fn for_path(&self, path: &str) -> Option<&Grammar> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, extension) = file_name.rsplit_once('.')?;
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(|&i| &self.grammars[i])
    }

    /// Grammar for the path, falling back to plain text.
    pub fn for_path_or_plain(&self, path: &str) -> &Grammar {
        self.for_path(path).unwrap_or(&self.plain)
    }
}

// ============================================================================
// Tests
// ============================================================================
