//! Well-known file names of a context network.
//!
//! A project root holds the discovery pointer; the pointer names the node
//! root, which holds the node files plus the ledger, config and derived
//! graph export.

/// Discovery pointer, relative to the project root (the root hint).
pub const POINTER_FILE_NAME: &str = ".context-network.md";

/// Default node root written by `contextnet init`.
pub const DEFAULT_LOCATION: &str = "./context-network";

/// Append-only change ledger, relative to the node root.
pub const LEDGER_FILE_NAME: &str = "_ledger.jsonl";

/// Navigation and verification config, relative to the node root.
pub const CONFIG_FILE_NAME: &str = "network.toml";

/// Derived graph export, relative to the node root.
pub const GRAPH_EXPORT_NAME: &str = "_graph.json";

/// Extension of node files.
pub const NODE_EXTENSION: &str = "md";

/// Root node used for reachability when the config names none.
pub const DEFAULT_ROOT_NODE: &str = "discovery";
