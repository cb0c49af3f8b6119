//! `network.toml`: the designated root node and hand-curated task routes.
//!
//! Task routes are data: each names an ordered sequence of node ids that
//! `nav --task <name>` walks. A missing config file means defaults.

use crate::core::error::ContextNetError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRoute {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sequence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskRoute>,
}

fn default_root() -> String {
    schemas::DEFAULT_ROOT_NODE.to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            tasks: BTreeMap::new(),
        }
    }
}

pub fn config_path(location: &Path) -> PathBuf {
    location.join(schemas::CONFIG_FILE_NAME)
}

impl NetworkConfig {
    pub fn load(location: &Path) -> Result<Self, ContextNetError> {
        let path = config_path(location);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(ContextNetError::IoError)?;
        toml::from_str(&content)
            .map_err(|e| ContextNetError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, location: &Path) -> Result<(), ContextNetError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ContextNetError::ConfigError(e.to_string()))?;
        crate::core::store::write_atomic(&config_path(location), &content)
    }

    pub fn task(&self, name: &str) -> Result<&TaskRoute, ContextNetError> {
        self.tasks
            .get(name)
            .ok_or_else(|| ContextNetError::UnknownTask(name.to_string()))
    }
}
