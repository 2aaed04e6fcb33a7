//! Link injection and annotated markup.
//!
//! [`render_file`] overlays two independent interval sets over the original
//! bytes of a file: the highlighter's spans and the index's occurrence table.
//! Both are sorted, so a single forward pass cuts the file at the union of
//! their boundaries (and at line starts, for line anchors). Each resulting
//! [`Segment`] keeps its highlight class and, if it lies inside an
//! occurrence, the index of that occurrence's [`Link`].
//!
//! Markup nests as `<a>` (one per occurrence) outside `<span class>` (one per
//! segment). Text is escaped, so [`strip_markup`] recovers the original bytes
//! exactly; [`verify_markup`] performs that check.

use serde::Serialize;
use std::io::Write as _;
use thiserror::Error;

use crate::highlight::{HighlightClass, Highlighted};
use crate::index::{Index, OccurrenceRole};
use crate::text::LineIndex;
use crate::types::{Location, SymbolId};

// ============================================================================
// Errors
// ============================================================================

/// Why a file could not be rendered faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Highlight spans do not tile the file.
    #[error("highlight spans cover [0, {covered}) with gaps or overlaps, file has {len} bytes")]
    Coverage { covered: usize, len: usize },
    /// An occurrence lies past the end of the file.
    #[error("occurrence [{start}, {end}) lies outside the file ({len} bytes)")]
    OccurrenceOutOfBounds { start: u64, end: u64, len: usize },
    /// Stripping the markup did not reproduce the input.
    #[error("markup does not round-trip to the original bytes (first difference at byte {offset})")]
    Mismatch { offset: usize },
}

// ============================================================================
// Segments and Links
// ============================================================================

/// Where an occurrence points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkTarget {
    /// Link to the canonical definition.
    Definition { file: String, line: u32 },
    /// The canonical definition itself: an anchor, no href.
    SelfAnchor,
    /// Symbol without definition: link to its first declaration.
    Declaration { file: String },
    /// The first declaration of a symbol without definition: an anchor.
    DeclarationAnchor,
    /// Symbol only ever referenced: link to its first reference.
    Undefined { file: String },
    /// The first reference of a symbol only ever referenced: an anchor.
    UndefinedAnchor,
}

/// One occurrence with its resolved target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub start: usize,
    pub end: usize,
    pub symbol: SymbolId,
    pub role: OccurrenceRole,
    pub target: LinkTarget,
}

/// A maximal run of bytes with one class and one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub class: HighlightClass,
    /// Index into [`RenderedFile::links`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<usize>,
    /// 1-indexed line number when this segment starts a line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A file split into segments, ready for markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    pub path: String,
    pub len: usize,
    pub segments: Vec<Segment>,
    pub links: Vec<Link>,
}

// ============================================================================
// Rendering
// ============================================================================

/// Resolve the link for an occurrence starting at `start` in `path`.
///
/// A split occurrence keeps the anchor on the fragment that starts where the
/// symbol's location starts; later fragments link to it.
fn link_target(index: &Index, path: &str, symbol: SymbolId, start: u64) -> Option<LinkTarget> {
    let symbol = index.symbol(symbol)?;
    let starts_at = |location: &Location| location.file == path && location.start == start;

    if let Some(definition) = &symbol.definition {
        if starts_at(definition) {
            return Some(LinkTarget::SelfAnchor);
        }
        return Some(LinkTarget::Definition {
            file: definition.file.clone(),
            line: definition.line,
        });
    }
    if let Some(first) = symbol.declarations.first() {
        if starts_at(first) {
            return Some(LinkTarget::DeclarationAnchor);
        }
        return Some(LinkTarget::Declaration {
            file: first.file.clone(),
        });
    }
    let first = &symbol.references.first()?.location;
    if starts_at(first) {
        Some(LinkTarget::UndefinedAnchor)
    } else {
        Some(LinkTarget::Undefined {
            file: first.file.clone(),
        })
    }
}

/// Split `text` into segments at highlight, occurrence and line boundaries.
pub fn render_file(
    path: &str,
    text: &[u8],
    highlighted: &Highlighted,
    index: &Index,
) -> Result<RenderedFile, RenderError> {
    let len = text.len();

    let mut links = Vec::new();
    for occurrence in index.occurrences_in(path) {
        if occurrence.end > len as u64 {
            return Err(RenderError::OccurrenceOutOfBounds {
                start: occurrence.start,
                end: occurrence.end,
                len,
            });
        }
        if let Some(target) = link_target(index, path, occurrence.symbol, occurrence.start) {
            links.push(Link {
                start: occurrence.start as usize,
                end: occurrence.end as usize,
                symbol: occurrence.symbol,
                role: occurrence.role,
                target,
            });
        }
    }

    let line_index = LineIndex::new(text);
    let line_starts = line_index.line_starts();

    let mut segments = Vec::with_capacity(highlighted.spans.len() + 2 * links.len());
    let mut li = 0usize;
    let mut ls = 0usize;
    let mut covered = 0usize;

    for span in &highlighted.spans {
        if span.start != covered || span.end <= span.start || span.end > len {
            return Err(RenderError::Coverage { covered, len });
        }
        let mut pos = span.start;
        while pos < span.end {
            while li < links.len() && links[li].end <= pos {
                li += 1;
            }
            while ls < line_starts.len() && line_starts[ls] < pos {
                ls += 1;
            }

            let (mut end, link) = match links.get(li) {
                Some(link) if link.start <= pos => (span.end.min(link.end), Some(li)),
                Some(link) if link.start < span.end => (link.start, None),
                _ => (span.end, None),
            };
            let line = match line_starts.get(ls) {
                Some(&start) if start == pos => {
                    if let Some(&next) = line_starts.get(ls + 1) {
                        end = end.min(next);
                    }
                    Some(ls as u32 + 1)
                }
                Some(&start) => {
                    end = end.min(start);
                    None
                }
                None => None,
            };

            segments.push(Segment {
                start: pos,
                end,
                class: span.class,
                link,
                line,
            });
            pos = end;
        }
        covered = span.end;
    }

    if covered != len {
        return Err(RenderError::Coverage { covered, len });
    }

    Ok(RenderedFile {
        path: path.to_string(),
        len,
        segments,
        links,
    })
}

// ============================================================================
// Markup
// ============================================================================

fn escape_text(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            _ => out.push(b),
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Relative URL of `to`'s page as seen from `from`'s page.
pub fn relative_page(from: &str, to: &str) -> String {
    let mut from_dirs: Vec<&str> = from.split('/').collect();
    from_dirs.pop();
    let to_parts: Vec<&str> = to.split('/').collect();
    let to_dirs = &to_parts[..to_parts.len().saturating_sub(1)];

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut url = "../".repeat(from_dirs.len() - common);
    url.push_str(&to_parts[common..].join("/"));
    url.push_str(".html");
    url
}

impl RenderedFile {
    fn href(&self, file: &str, fragment: &str) -> String {
        if file == self.path {
            format!("#{}", fragment)
        } else {
            format!("{}#{}", relative_page(&self.path, file), fragment)
        }
    }

    fn open_tag(&self, link: &Link) -> String {
        let attr = match &link.target {
            LinkTarget::Definition { file, line } => {
                format!("href=\"{}\"", escape_attr(&self.href(file, &format!("L{}", line))))
            }
            LinkTarget::SelfAnchor => format!("id=\"sym-{}\"", link.symbol),
            LinkTarget::Declaration { file } => format!(
                "href=\"{}\"",
                escape_attr(&self.href(file, &format!("decl-{}", link.symbol)))
            ),
            LinkTarget::DeclarationAnchor => format!("id=\"decl-{}\"", link.symbol),
            LinkTarget::Undefined { file } => format!(
                "href=\"{}\"",
                escape_attr(&self.href(file, &format!("undef-{}", link.symbol)))
            ),
            LinkTarget::UndefinedAnchor => {
                format!("id=\"undef-{}\" class=\"undefined\"", link.symbol)
            }
        };
        format!("<a {} data-symbol=\"{}\">", attr, link.symbol)
    }

    /// Annotated markup for `text` (the bytes this file was rendered from).
    pub fn to_markup(&self, text: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 2);
        let mut open: Option<usize> = None;

        for segment in &self.segments {
            if segment.link != open && open.is_some() {
                out.extend_from_slice(b"</a>");
            }
            if let Some(line) = segment.line {
                write!(out, "<span id=\"L{}\"></span>", line).ok();
            }
            if segment.link != open {
                if let Some(link) = segment.link.and_then(|i| self.links.get(i)) {
                    out.extend_from_slice(self.open_tag(link).as_bytes());
                }
                open = segment.link;
            }

            write!(out, "<span class=\"{}\">", segment.class.css_class()).ok();
            escape_text(&mut out, &text[segment.start..segment.end]);
            out.extend_from_slice(b"</span>");
        }
        if open.is_some() {
            out.extend_from_slice(b"</a>");
        }
        out
    }

    /// Markup wrapped in a standalone HTML page.
    pub fn to_page(&self, text: &[u8]) -> Vec<u8> {
        wrap_page(&self.path, &self.to_markup(text))
    }
}

/// Wrap markup for `path` in a standalone HTML page.
pub fn wrap_page(path: &str, markup: &[u8]) -> Vec<u8> {
    let mut page = Vec::with_capacity(markup.len() + 256);
    write!(
        page,
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
         <body>\n<pre class=\"source\">",
        escape_attr(path)
    )
    .ok();
    page.extend_from_slice(markup);
    page.extend_from_slice(b"</pre>\n</body>\n</html>\n");
    page
}

/// Escaped text without classes or links.
pub fn plain_markup(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    escape_text(&mut out, text);
    out
}

/// Remove tags and decode entities, recovering the original bytes.
pub fn strip_markup(markup: &[u8]) -> Vec<u8> {
    const ENTITIES: &[(&[u8], u8)] = &[
        (b"&amp;", b'&'),
        (b"&lt;", b'<'),
        (b"&gt;", b'>'),
        (b"&quot;", b'"'),
    ];

    let mut out = Vec::with_capacity(markup.len());
    let mut i = 0;
    while i < markup.len() {
        match markup[i] {
            b'<' => {
                i = markup[i..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| i + p + 1)
                    .unwrap_or(markup.len());
            }
            b'&' => {
                match ENTITIES
                    .iter()
                    .find(|(entity, _)| markup[i..].starts_with(entity))
                {
                    Some((entity, byte)) => {
                        out.push(*byte);
                        i += entity.len();
                    }
                    None => {
                        out.push(b'&');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Check that `markup` strips back to exactly `text`.
pub fn verify_markup(text: &[u8], markup: &[u8]) -> Result<(), RenderError> {
    let stripped = strip_markup(markup);
    if stripped == text {
        return Ok(());
    }
    let offset = stripped
        .iter()
        .zip(text.iter())
        .position(|(a, b)| a != b)
        .unwrap_or(stripped.len().min(text.len()));
    Err(RenderError::Mismatch { offset })
}

// ============================================================================
// Tests
// ============================================================================
