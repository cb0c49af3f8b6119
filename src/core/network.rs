//! Handle on a resolved context network.
//!
//! A `Network` is what every command works against: the project root the
//! pointer was found in, the node root it resolves to, and the config read
//! from there. `snapshot` loads the store once and builds the graph over
//! that single load, so checks and traversals never see a store that
//! changes underneath them.

use crate::core::config::NetworkConfig;
use crate::core::discovery;
use crate::core::error::ContextNetError;
use crate::core::graph::RelationshipGraph;
use crate::core::ledger::ChangeLedger;
use crate::core::node::Node;
use crate::core::store::{LoadFailure, NodeStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Network {
    pub root_hint: PathBuf,
    pub location: PathBuf,
    pub config: NetworkConfig,
}

/// One immutable load of the node store plus the graph built from it.
#[derive(Debug)]
pub struct Snapshot {
    pub nodes: HashMap<String, Node>,
    pub failures: Vec<LoadFailure>,
    pub graph: RelationshipGraph,
}

impl Network {
    pub fn open(root_hint: &Path) -> Result<Self, ContextNetError> {
        let location = discovery::resolve(root_hint)?;
        let config = NetworkConfig::load(&location)?;
        Ok(Self {
            root_hint: root_hint.to_path_buf(),
            location,
            config,
        })
    }

    pub fn store(&self) -> NodeStore {
        NodeStore::open(&self.location)
    }

    pub fn ledger(&self) -> ChangeLedger {
        ChangeLedger::open(&self.location)
    }

    pub fn snapshot(&self) -> Result<Snapshot, ContextNetError> {
        let loaded = self.store().load_all()?;
        let graph = RelationshipGraph::build(loaded.nodes.values());
        Ok(Snapshot {
            nodes: loaded.nodes,
            failures: loaded.failures,
            graph,
        })
    }
}
