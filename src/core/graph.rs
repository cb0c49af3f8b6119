//! In-memory relationship graph built from node declarations.
//!
//! Building never fails: dangling targets, asymmetric pairs and unknown
//! types are kept as declared and left for the checker to report.

use crate::core::node::Node;
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;

#[derive(Debug, Default, Clone)]
pub struct RelationshipGraph {
    /// Source id -> outgoing `(rel_type, target)` in declaration order.
    outgoing: FxHashMap<String, Vec<(String, String)>>,
    /// Target id -> incoming `(rel_type, source)`.
    incoming: FxHashMap<String, Vec<(String, String)>>,
    /// Ids of loaded nodes, sorted.
    ids: Vec<String>,
    edge_count: usize,
}

impl RelationshipGraph {
    pub fn build<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut graph = RelationshipGraph::default();
        let mut nodes: Vec<&Node> = nodes.into_iter().collect();
        // Incoming lists are filled in source order so they do not depend on load order.
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        for node in nodes {
            graph.ids.push(node.id.clone());
            let edges: Vec<(String, String)> = node
                .relationships
                .iter()
                .map(|r| (r.rel_type.clone(), r.target.clone()))
                .collect();
            for (rel_type, target) in &edges {
                graph
                    .incoming
                    .entry(target.clone())
                    .or_default()
                    .push((rel_type.clone(), node.id.clone()));
            }
            graph.edge_count += edges.len();
            graph.outgoing.insert(node.id.clone(), edges);
        }
        graph.ids.dedup();

        tracing::debug!(
            nodes = graph.ids.len(),
            edges = graph.edge_count,
            "built relationship graph"
        );
        graph
    }

    pub fn contains(&self, id: &str) -> bool {
        self.outgoing.contains_key(id)
    }

    pub fn node_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Declared outgoing edges of `id`, in declaration order.
    pub fn outgoing(&self, id: &str) -> &[(String, String)] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges declared by other nodes that point at `id`, ordered by source id.
    pub fn incoming(&self, id: &str) -> &[(String, String)] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Outgoing `(rel_type, target)` pairs, optionally restricted to the given types.
    pub fn neighbors(&self, id: &str, type_filter: Option<&[&str]>) -> Vec<(&str, &str)> {
        self.outgoing(id)
            .iter()
            .filter(|(t, _)| type_filter.is_none_or(|allowed| allowed.contains(&t.as_str())))
            .map(|(t, target)| (t.as_str(), target.as_str()))
            .collect()
    }

    /// Deterministic `{nodes, edges}` export.
    pub fn to_json(&self) -> JsonValue {
        let edges: Vec<JsonValue> = self
            .ids
            .iter()
            .flat_map(|source| {
                self.outgoing(source).iter().map(move |(rel_type, target)| {
                    serde_json::json!({
                        "source": source,
                        "target": target,
                        "type": rel_type,
                    })
                })
            })
            .collect();
        serde_json::json!({
            "nodes": self.ids,
            "edges": edges,
        })
    }
}
