//! Node Store: one markdown file per node under the node root.
//!
//! Node ids are root-relative paths without the `.md` extension, always
//! `/`-separated. Loading is tolerant: unreadable files are reported as
//! `LoadFailure`s and every other node still loads. Writes go through a
//! temp file in the destination directory followed by a rename, so a reader
//! sees either the previous version of a node or the new one, never a mix.

use crate::core::error::ContextNetError;
use crate::core::markdown;
use crate::core::node::{ChangeRecord, NewNode, Node};
use crate::core::schemas;
use crate::core::time;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use ulid::Ulid;

#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub id: String,
    pub path: PathBuf,
    pub detail: String,
}

/// Result of `NodeStore::load_all`. Map iteration order is unspecified.
#[derive(Debug, Default)]
pub struct LoadedNodes {
    pub nodes: HashMap<String, Node>,
    pub failures: Vec<LoadFailure>,
}

#[derive(Debug, Clone)]
pub struct NodeStore {
    root: PathBuf,
}

/// Reject ids that are empty, absolute, escape the root, or point at hidden entries.
pub fn validate_node_id(id: &str) -> Result<(), ContextNetError> {
    if id.trim().is_empty() {
        return Err(ContextNetError::InvalidId("empty id".to_string()));
    }
    if id.contains('\\') || id.ends_with('/') {
        return Err(ContextNetError::InvalidId(format!(
            "'{}' must use '/' separators and name a file",
            id
        )));
    }
    let path = Path::new(id);
    for component in path.components() {
        match component {
            Component::Normal(seg) => {
                if seg.to_string_lossy().starts_with('.') {
                    return Err(ContextNetError::InvalidId(format!(
                        "'{}' contains a hidden segment",
                        id
                    )));
                }
            }
            _ => {
                return Err(ContextNetError::InvalidId(format!(
                    "'{}' must be a relative path inside the node root",
                    id
                )));
            }
        }
    }
    Ok(())
}

fn collect_node_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ContextNetError> {
    for entry in fs::read_dir(dir).map_err(ContextNetError::IoError)? {
        let entry = entry.map_err(ContextNetError::IoError)?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_node_files(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(schemas::NODE_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

/// Write `content` to `path` via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), ContextNetError> {
    let parent = path
        .parent()
        .ok_or_else(|| ContextNetError::InvalidId(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).map_err(ContextNetError::IoError)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Ulid::new()));

    let written = (|| -> Result<(), ContextNetError> {
        let mut f = File::create(&tmp)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

impl NodeStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_path(&self, id: &str) -> Result<PathBuf, ContextNetError> {
        validate_node_id(id)?;
        Ok(self
            .root
            .join(format!("{}.{}", id, schemas::NODE_EXTENSION)))
    }

    fn id_for_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let rel = rel.with_extension("");
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.node_path(id).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Parse every node file under the root. Only a missing or unreadable
    /// root directory is an error; per-file problems become `failures`.
    pub fn load_all(&self) -> Result<LoadedNodes, ContextNetError> {
        if !self.root.is_dir() {
            return Err(ContextNetError::NotFound(format!(
                "node root {}",
                self.root.display()
            )));
        }
        let mut files = Vec::new();
        collect_node_files(&self.root, &mut files)?;

        let parsed: Vec<Result<Node, LoadFailure>> = files
            .par_iter()
            .filter_map(|path| {
                let id = self.id_for_path(path)?;
                Some(match fs::read_to_string(path) {
                    Ok(text) => Ok(markdown::parse_node(&id, &text)),
                    Err(e) => Err(LoadFailure {
                        id,
                        path: path.clone(),
                        detail: e.to_string(),
                    }),
                })
            })
            .collect();

        let mut loaded = LoadedNodes::default();
        for result in parsed {
            match result {
                Ok(node) => {
                    loaded.nodes.insert(node.id.clone(), node);
                }
                Err(failure) => {
                    tracing::warn!(id = %failure.id, detail = %failure.detail, "node file not loaded");
                    loaded.failures.push(failure);
                }
            }
        }
        tracing::debug!(
            root = %self.root.display(),
            nodes = loaded.nodes.len(),
            failures = loaded.failures.len(),
            "loaded node store"
        );
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Result<Node, ContextNetError> {
        let path = self.node_path(id)?;
        if !path.is_file() {
            return Err(ContextNetError::NotFound(format!("node '{}'", id)));
        }
        let text = fs::read_to_string(&path).map_err(ContextNetError::IoError)?;
        Ok(markdown::parse_node(id, &text))
    }

    /// Persist `node`, appending a dated change-history entry. Returns the node as written.
    pub fn save(&self, node: &Node, change_description: &str) -> Result<Node, ContextNetError> {
        let path = self.node_path(&node.id)?;
        let mut persisted = node.clone();
        persisted.change_history.push(ChangeRecord {
            date: time::today(),
            description: change_description.trim().to_string(),
        });
        write_atomic(&path, &markdown::render_node(&persisted))?;
        tracing::debug!(id = %node.id, "saved node");
        Ok(persisted)
    }

    pub fn create(&self, id: &str, initial: NewNode) -> Result<Node, ContextNetError> {
        let path = self.node_path(id)?;
        if path.exists() {
            return Err(ContextNetError::DuplicateId(id.to_string()));
        }
        let today = time::today();
        let node = Node {
            id: id.to_string(),
            title: initial.title.trim().to_string(),
            purpose: initial.purpose.trim().to_string(),
            classification: initial.classification,
            content: initial.content.trim().to_string(),
            relationships: initial.relationships,
            metadata: crate::core::node::Metadata {
                created_at: today.clone(),
                updated_at: today,
                updated_by: initial.author,
            },
            change_history: Vec::new(),
            extra_sections: Vec::new(),
            malformed_relationships: Vec::new(),
        };
        self.save(&node, "Created")
    }

    /// Delete a node file and return what it held. Callers record the removal in the ledger.
    pub fn remove(&self, id: &str) -> Result<Node, ContextNetError> {
        let node = self.get(id)?;
        let path = self.node_path(id)?;
        fs::remove_file(&path).map_err(ContextNetError::IoError)?;
        tracing::debug!(id, "removed node");
        Ok(node)
    }
}
