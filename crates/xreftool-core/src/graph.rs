//! Relationship graph export.
//!
//! Projects the index's stored edges (inherits-from, overrides, calls) into a
//! standalone graph: one node per symbol that takes part in at least one
//! edge, one dashed placeholder node per dangling target, and the edges
//! themselves. Nodes are sorted by id and edges by (source, kind, target), so
//! the same index always produces byte-identical DOT and JSON.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::facts::SymbolKind;
use crate::index::{EdgeKind, Index};
use crate::types::SymbolId;

// ============================================================================
// Graph Types
// ============================================================================

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Node key: the symbol id, or `unresolved-<id>` for placeholders.
    pub key: String,
    pub symbol: SymbolId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SymbolKind>,
    pub resolved: bool,
    /// `file:line` of the canonical definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// A directed edge between node keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// Exported relationship graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Which edges to export.
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    /// Edge kinds to keep; empty keeps all.
    pub kinds: Vec<EdgeKind>,
}

fn placeholder_key(id: SymbolId) -> String {
    format!("unresolved-{}", id)
}

// ============================================================================
// Export
// ============================================================================

/// Export every edge of the index.
pub fn export(index: &Index) -> Graph {
    export_with(index, &GraphOptions::default())
}

/// Export the edges selected by `options`.
pub fn export_with(index: &Index, options: &GraphOptions) -> Graph {
    let keep = |kind: EdgeKind| options.kinds.is_empty() || options.kinds.contains(&kind);

    let mut edges: Vec<(SymbolId, EdgeKind, SymbolId)> = index
        .symbols()
        .iter()
        .flat_map(|s| s.edges.iter().map(move |e| (s.id, e.kind, e.target)))
        .filter(|(_, kind, _)| keep(*kind))
        .collect();
    edges.sort();

    let mut participating = BTreeSet::new();
    let mut dangling = BTreeSet::new();
    for (source, _, target) in &edges {
        participating.insert(*source);
        if index.symbol(*target).is_some() {
            participating.insert(*target);
        } else {
            dangling.insert(*target);
        }
    }

    let mut nodes: Vec<GraphNode> = participating
        .into_iter()
        .filter_map(|id| index.symbol(id))
        .map(|symbol| GraphNode {
            key: symbol.id.to_string(),
            symbol: symbol.id,
            label: symbol.qualified_name.clone(),
            kind: Some(symbol.kind),
            resolved: true,
            definition: symbol.definition.as_ref().map(|d| format!("{}:{}", d.file, d.line)),
        })
        .collect();
    nodes.extend(dangling.iter().map(|&id| {
        let key = index.unresolved(id);
        GraphNode {
            key: placeholder_key(id),
            symbol: id,
            label: key
                .map(|k| k.qualified_name.clone())
                .unwrap_or_else(|| id.to_string()),
            kind: key.map(|k| k.kind),
            resolved: false,
            definition: None,
        }
    }));

    let edges = edges
        .into_iter()
        .map(|(source, kind, target)| GraphEdge {
            source: source.to_string(),
            target: if dangling.contains(&target) {
                placeholder_key(target)
            } else {
                target.to_string()
            },
            kind,
        })
        .collect();

    Graph { nodes, edges }
}

// ============================================================================
// Serialization
// ============================================================================

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Graph {
    /// Graphviz DOT description.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph xref {\n");
        out.push_str("  rankdir=LR;\n");
        out.push_str("  node [shape=box, fontname=\"monospace\"];\n");
        for node in &self.nodes {
            let kind = node.kind.map(|k| k.as_str()).unwrap_or("unknown");
            write!(
                out,
                "  \"{}\" [label=\"{}\\n{}\"",
                node.key,
                dot_escape(&node.label),
                kind
            )
            .ok();
            if !node.resolved {
                out.push_str(", style=dashed");
            }
            out.push_str("];\n");
        }
        for edge in &self.edges {
            writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{}\"];",
                edge.source, edge.target, edge.kind
            )
            .ok();
        }
        out.push_str("}\n");
        out
    }

    /// Pretty JSON description.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::SymbolKey;
    use crate::index::{Edge, Symbol};
    use crate::types::{Location, Span};
    use std::collections::BTreeMap;

    fn sym(id: u64, name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(SymbolId::new(id), &SymbolKey::new(name, kind))
    }

    fn sample() -> Index {
        let mut main = sym(1, "main", SymbolKind::Function);
        main.edges.insert(Edge {
            kind: EdgeKind::Calls,
            target: SymbolId::new(2),
        });
        let mut derived = sym(3, "Derived", SymbolKind::Type);
        derived.definition = Some(Location::new("a.h", Span::new(6, 13), 1, 7));
        derived.edges.insert(Edge {
            kind: EdgeKind::InheritsFrom,
            target: SymbolId::new(9),
        });
        let foo = sym(2, "foo", SymbolKind::Function);
        let lonely = sym(4, "lonely", SymbolKind::Variable);

        let mut unresolved = BTreeMap::new();
        unresolved.insert(SymbolId::new(9), SymbolKey::new("Base", SymbolKind::Type));
        Index::new(vec![], vec![main, derived, foo, lonely], BTreeMap::new(), unresolved)
    }

    #[test]
    fn nodes_are_participants_plus_placeholders() {
        let graph = export(&sample());
        let keys: Vec<&str> = graph.nodes.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "0000000000000001",
                "0000000000000002",
                "0000000000000003",
                "unresolved-0000000000000009",
            ]
        );
        let placeholder = graph.nodes.last().unwrap();
        assert!(!placeholder.resolved);
        assert_eq!(placeholder.label, "Base");
        assert_eq!(graph.nodes[2].definition.as_deref(), Some("a.h:1"));
    }

    #[test]
    fn edges_are_sorted_and_point_at_placeholders() {
        let graph = export(&sample());
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].source, "0000000000000001");
        assert_eq!(graph.edges[0].kind, EdgeKind::Calls);
        assert_eq!(graph.edges[1].target, "unresolved-0000000000000009");
    }

    #[test]
    fn kind_filter_limits_edges_and_nodes() {
        let options = GraphOptions {
            kinds: vec![EdgeKind::Calls],
        };
        let graph = export_with(&sample(), &options);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn dot_output_is_deterministic() {
        let index = sample();
        let dot = export(&index).to_dot();
        assert_eq!(dot, export(&index).to_dot());
        assert!(dot.starts_with("digraph xref {\n"));
        assert!(dot.contains(
            "  \"0000000000000001\" -> \"0000000000000002\" [label=\"calls\"];\n"
        ));
        assert!(dot.contains("style=dashed"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn dot_escapes_labels() {
        assert_eq!(dot_escape(r#"operator"" _x"#), r#"operator\"\" _x"#);
    }

    #[test]
    fn json_output() {
        let json = export(&sample()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
        assert_eq!(value["edges"][1]["kind"], "inherits_from");
    }

    #[test]
    fn empty_index_exports_empty_graph() {
        let graph = export(&Index::default());
        assert!(graph.nodes.is_empty());
        assert_eq!(
            graph.to_dot(),
            "digraph xref {\n  rankdir=LR;\n  node [shape=box, fontname=\"monospace\"];\n}\n"
        );
    }
}
