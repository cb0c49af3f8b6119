//! Navigation Engine.
//!
//! Traversals are lazy iterators over node ids. Graph strategies follow
//! declared outgoing relationships in declaration order; the task strategy
//! replays a hand-curated sequence from `network.toml`. Every strategy keeps
//! a visited set, so no id is yielded twice and cyclic graphs terminate.
//! The graph is borrowed immutably for the lifetime of a traversal, so the
//! same arguments always reproduce the same sequence.

use crate::core::config::NetworkConfig;
use crate::core::error::ContextNetError;
use crate::core::graph::RelationshipGraph;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    BreadthFirst,
    DepthFirst,
    /// Configured sequence for the named task; the start id is not used.
    ByTask(String),
}

#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    /// Only follow relationships of these types. `None` follows all.
    pub type_filter: Option<Vec<String>>,
    /// Stop expanding past this many hops from the start.
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum Order {
    Breadth,
    Depth,
    Listed,
}

pub struct Traversal<'g> {
    graph: &'g RelationshipGraph,
    order: Order,
    /// Queue for breadth-first and listed orders, stack (back end) for depth-first.
    pending: VecDeque<(String, usize)>,
    visited: HashSet<String>,
    type_filter: Option<HashSet<String>>,
    max_depth: Option<usize>,
}

impl<'g> Traversal<'g> {
    fn follows(&self, rel_type: &str) -> bool {
        self.type_filter
            .as_ref()
            .is_none_or(|allowed| allowed.contains(rel_type))
    }

    fn expands(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth < max)
    }

    /// Targets of `id` this traversal may step to, in declaration order.
    fn successors(&self, id: &str) -> Vec<&'g str> {
        let graph = self.graph;
        graph
            .outgoing(id)
            .iter()
            .filter(|(t, target)| self.follows(t) && graph.contains(target))
            .map(|(_, target)| target.as_str())
            .collect()
    }
}

impl Iterator for Traversal<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let (id, depth) = match self.order {
                Order::Depth => self.pending.pop_back()?,
                Order::Breadth | Order::Listed => self.pending.pop_front()?,
            };
            match self.order {
                Order::Breadth => {
                    if self.expands(depth) {
                        for target in self.successors(&id) {
                            if self.visited.insert(target.to_string()) {
                                self.pending.push_back((target.to_string(), depth + 1));
                            }
                        }
                    }
                    return Some(id);
                }
                Order::Depth => {
                    if !self.visited.insert(id.clone()) {
                        continue;
                    }
                    if self.expands(depth) {
                        for target in self.successors(&id).into_iter().rev() {
                            if !self.visited.contains(target) {
                                self.pending.push_back((target.to_string(), depth + 1));
                            }
                        }
                    }
                    return Some(id);
                }
                Order::Listed => {
                    if self.visited.insert(id.clone()) {
                        return Some(id);
                    }
                }
            }
        }
    }
}

/// Start a traversal. Graph strategies fail with `NotFound` for an unknown
/// start id; `ByTask` fails with `UnknownTask` for an unconfigured tag.
pub fn traverse<'g>(
    graph: &'g RelationshipGraph,
    config: &NetworkConfig,
    start_id: &str,
    strategy: &Strategy,
    options: &TraversalOptions,
) -> Result<Traversal<'g>, ContextNetError> {
    let mut visited = HashSet::new();
    let (order, pending) = match strategy {
        Strategy::BreadthFirst | Strategy::DepthFirst => {
            if !graph.contains(start_id) {
                return Err(ContextNetError::NotFound(format!("node '{}'", start_id)));
            }
            let order = if *strategy == Strategy::BreadthFirst {
                // Breadth-first marks ids when queued, depth-first when popped.
                visited.insert(start_id.to_string());
                Order::Breadth
            } else {
                Order::Depth
            };
            (order, VecDeque::from([(start_id.to_string(), 0)]))
        }
        Strategy::ByTask(tag) => {
            let route = config.task(tag)?;
            let listed: VecDeque<(String, usize)> = route
                .sequence
                .iter()
                .filter(|id| {
                    let present = graph.contains(id);
                    if !present {
                        tracing::warn!(task = %tag, node = %id, "task route names a missing node");
                    }
                    present
                })
                .map(|id| (id.clone(), 0))
                .collect();
            (Order::Listed, listed)
        }
    };

    Ok(Traversal {
        graph,
        order,
        pending,
        visited,
        type_filter: options
            .type_filter
            .as_ref()
            .map(|types| types.iter().cloned().collect()),
        max_depth: options.max_depth,
    })
}
