//! Consistency Checker and the `contextnet validate` harness.
//!
//! `check` is a pure function over one loaded snapshot: it never errors,
//! never mutates, and returns every finding as data. Traversals use an
//! explicit work-list with a visited set, so cyclic graphs terminate.
//!
//! Defect kinds:
//! - `DanglingRelationship`: target id is not a loaded node (reported on the source).
//! - `MissingInverse`: target declares nothing back to the source (reported on the target).
//! - `WrongInverseType`: target points back with a type other than the inverse.
//! - `UnknownRelationshipType`: type absent from the inverse table; no inverse is guessed.
//! - `MalformedRelationship`: a relationship line the loader could not parse.
//! - `UnclassifiedNode`: one or more classification dimensions absent.
//! - `UnreachableNode`: not reachable from the root over edges taken in either direction.

use crate::core::error::ContextNetError;
use crate::core::graph::RelationshipGraph;
use crate::core::network::Network;
use crate::core::node::Node;
use crate::core::output;
use crate::core::relationship;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DefectKind {
    DanglingRelationship,
    MissingInverse,
    WrongInverseType,
    UnknownRelationshipType,
    MalformedRelationship,
    UnclassifiedNode,
    UnreachableNode,
}

impl DefectKind {
    pub const ALL: &'static [DefectKind] = &[
        DefectKind::DanglingRelationship,
        DefectKind::MissingInverse,
        DefectKind::WrongInverseType,
        DefectKind::UnknownRelationshipType,
        DefectKind::MalformedRelationship,
        DefectKind::UnclassifiedNode,
        DefectKind::UnreachableNode,
    ];
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Defect {
    pub kind: DefectKind,
    pub node_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub root: String,
    pub node_count: usize,
    pub edge_count: usize,
    /// SHA-256 over the canonical snapshot the report was computed from.
    pub snapshot: String,
    /// Sorted by kind, node id, detail; no duplicates.
    pub defects: Vec<Defect>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn of_kind(&self, kind: DefectKind) -> impl Iterator<Item = &Defect> {
        self.defects.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: DefectKind) -> usize {
        self.of_kind(kind).count()
    }
}

fn defect(kind: DefectKind, node_id: &str, detail: String) -> Defect {
    Defect {
        kind,
        node_id: node_id.to_string(),
        detail,
    }
}

fn snapshot_fingerprint(ids: &[String], nodes: &HashMap<String, Node>) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        if let Some(node) = nodes.get(id) {
            hasher.update(id.as_bytes());
            hasher.update([0u8]);
            hasher.update(serde_json::to_vec(node).unwrap_or_default());
            hasher.update([0u8]);
        }
    }
    format!("{:x}", hasher.finalize())
}

fn check_relationships(source: &Node, nodes: &HashMap<String, Node>, out: &mut Vec<Defect>) {
    for line in &source.malformed_relationships {
        out.push(defect(
            DefectKind::MalformedRelationship,
            &source.id,
            format!("cannot parse relationship line '{}'", line),
        ));
    }

    for rel in &source.relationships {
        let inverse = relationship::inverse_of(&rel.rel_type);
        if inverse.is_none() {
            out.push(defect(
                DefectKind::UnknownRelationshipType,
                &source.id,
                format!(
                    "'{}' -> '{}': type has no defined inverse",
                    rel.rel_type, rel.target
                ),
            ));
        }

        let Some(target) = nodes.get(&rel.target) else {
            out.push(defect(
                DefectKind::DanglingRelationship,
                &source.id,
                format!("'{}' -> '{}': target does not exist", rel.rel_type, rel.target),
            ));
            continue;
        };
        let Some(inverse) = inverse else {
            continue;
        };

        if target.declares(&source.id, inverse) {
            continue;
        }

        let back: Vec<&str> = target
            .relationships_to(&source.id)
            .map(|r| r.rel_type.as_str())
            .collect();
        if back.is_empty() {
            out.push(defect(
                DefectKind::MissingInverse,
                &target.id,
                format!(
                    "expected '{} {} {}' to mirror '{} {} {}'",
                    target.id, inverse, source.id, source.id, rel.rel_type, target.id
                ),
            ));
        } else {
            out.push(defect(
                DefectKind::WrongInverseType,
                &target.id,
                format!(
                    "declares '{}' back to '{}'; expected '{}' to mirror '{} {} {}'",
                    back.join(", "),
                    source.id,
                    inverse,
                    source.id,
                    rel.rel_type,
                    target.id
                ),
            ));
        }
    }
}

/// Ids reachable from `root`, treating every edge between loaded nodes as undirected.
fn reachable_from(root: &str, graph: &RelationshipGraph) -> HashSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    if !graph.contains(root) {
        return visited;
    }
    let mut work: VecDeque<&str> = VecDeque::new();
    visited.insert(root.to_string());
    work.push_back(root);

    while let Some(id) = work.pop_front() {
        let forward = graph.outgoing(id).iter().map(|(_, t)| t.as_str());
        let backward = graph.incoming(id).iter().map(|(_, s)| s.as_str());
        for next in forward.chain(backward) {
            if graph.contains(next) && visited.insert(next.to_string()) {
                work.push_back(next);
            }
        }
    }
    visited
}

/// Run every invariant over one snapshot. Deterministic for any load order.
pub fn check(graph: &RelationshipGraph, nodes: &HashMap<String, Node>, root_id: &str) -> Report {
    let mut ids: Vec<String> = nodes.keys().cloned().collect();
    ids.sort();

    let mut defects = Vec::new();
    for id in &ids {
        let node = &nodes[id];
        let missing = node.classification.missing_dimensions();
        if !missing.is_empty() {
            defects.push(defect(
                DefectKind::UnclassifiedNode,
                id,
                format!("missing classification: {}", missing.join(", ")),
            ));
        }
        check_relationships(node, nodes, &mut defects);
    }

    if !ids.is_empty() {
        let reachable = reachable_from(root_id, graph);
        let detail = if graph.contains(root_id) {
            format!("not reachable from root '{}'", root_id)
        } else {
            format!("root node '{}' does not exist", root_id)
        };
        for id in ids.iter().filter(|id| !reachable.contains(*id)) {
            defects.push(defect(DefectKind::UnreachableNode, id, detail.clone()));
        }
    }

    defects.sort();
    defects.dedup();

    tracing::debug!(
        nodes = ids.len(),
        defects = defects.len(),
        root = root_id,
        "consistency check complete"
    );

    Report {
        root: root_id.to_string(),
        node_count: ids.len(),
        edge_count: graph.edge_count(),
        snapshot: snapshot_fingerprint(&ids, nodes),
        defects,
    }
}

fn trace_gate(name: &str) {
    if std::env::var("CONTEXTNET_VALIDATE_TRACE").ok().as_deref() == Some("1") {
        println!("validate: trace {}", name);
    }
}

/// Load one snapshot of `network`, check it, and print the result.
/// Returns `ValidationError` when any defect is found.
pub fn run_validation(
    network: &Network,
    root_override: Option<&str>,
    json: bool,
) -> Result<Report, ContextNetError> {
    let snapshot = network.snapshot()?;
    let root = root_override.unwrap_or(network.config.root.as_str());
    let report = check(&snapshot.graph, &snapshot.nodes, root);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "load_failures": snapshot.failures,
            }))?
        );
    } else {
        println!("validate: running");
        println!("validate: location={}", network.location.display());
        println!(
            "validate: snapshot nodes={} edges={} fingerprint={}",
            report.node_count,
            report.edge_count,
            &report.snapshot[..12]
        );
        let mut pass_count = 0u32;
        let mut fail_count = 0u32;
        for kind in DefectKind::ALL {
            trace_gate(&kind.to_string());
            let n = report.count(*kind);
            if n == 0 {
                pass_count += 1;
            } else {
                fail_count += 1;
            }
            println!("{}", output::gate_line(&kind.to_string(), n));
        }
        for failure in &snapshot.failures {
            println!(
                "validate: warn unreadable {} ({})",
                failure.path.display(),
                failure.detail
            );
        }
        println!(
            "validate: summary pass={} fail={} warn={} defects={}",
            pass_count,
            fail_count,
            snapshot.failures.len(),
            report.defects.len()
        );
        if !report.is_clean() {
            let messages: Vec<String> = report
                .defects
                .iter()
                .map(|d| format!("{} {}: {}", d.kind, d.node_id, d.detail))
                .collect();
            println!(
                "validate: defects {}: {}",
                messages.len(),
                output::preview_messages(&messages, 3, 140)
            );
        }
    }

    if report.is_clean() {
        Ok(report)
    } else {
        Err(ContextNetError::ValidationError(format!(
            "{} defect(s) found.",
            report.defects.len()
        )))
    }
}
