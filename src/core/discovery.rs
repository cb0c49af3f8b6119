//! Discovery Resolver.
//!
//! A project root (the "root hint") carries a small pointer file whose
//! `Location` field names the node root. Everything else locates the
//! network through this indirection, so moving the node root only means
//! rewriting the pointer.

use crate::core::config::{self, NetworkConfig};
use crate::core::error::ContextNetError;
use crate::core::markdown::parse_field_line;
use crate::core::schemas;
use crate::core::store::write_atomic;
use crate::core::time;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPointer {
    pub location: String,
}

impl DiscoveryPointer {
    pub fn parse(text: &str) -> Result<Self, ContextNetError> {
        let location = text
            .lines()
            .filter_map(parse_field_line)
            .find(|(k, _)| k == "location")
            .map(|(_, v)| v.trim_matches('`').trim().to_string());
        match location {
            Some(l) if !l.is_empty() => Ok(Self { location: l }),
            Some(_) => Err(ContextNetError::MalformedPointer(
                "Location field is empty".to_string(),
            )),
            None => Err(ContextNetError::MalformedPointer(
                "no Location field".to_string(),
            )),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "# Context Network Discovery\n\n\
             - **Location**: {}\n\
             - **Updated**: {}\n\n\
             Node files, `{}` and `{}` live under the location above.\n",
            self.location,
            time::today(),
            schemas::CONFIG_FILE_NAME,
            schemas::LEDGER_FILE_NAME,
        )
    }

    /// The node root, with relative locations taken from `root_hint`.
    pub fn resolve_against(&self, root_hint: &Path) -> PathBuf {
        let loc = Path::new(&self.location);
        if loc.is_absolute() {
            loc.to_path_buf()
        } else {
            root_hint.join(loc)
        }
    }
}

pub fn pointer_path(root_hint: &Path) -> PathBuf {
    root_hint.join(schemas::POINTER_FILE_NAME)
}

pub fn read_pointer(root_hint: &Path) -> Result<DiscoveryPointer, ContextNetError> {
    let path = pointer_path(root_hint);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ContextNetError::MissingPointer(path));
        }
        Err(e) => return Err(ContextNetError::IoError(e)),
    };
    DiscoveryPointer::parse(&text)
}

pub fn resolve(root_hint: &Path) -> Result<PathBuf, ContextNetError> {
    let pointer = read_pointer(root_hint)?;
    Ok(pointer.resolve_against(root_hint))
}

/// Create the pointer, the node root and a default config. Refuses to touch an
/// existing pointer.
pub fn initialize(root_hint: &Path, default_location: &str) -> Result<PathBuf, ContextNetError> {
    let path = pointer_path(root_hint);
    if path.exists() {
        return Err(ContextNetError::AlreadyInitialized(path));
    }
    let pointer = DiscoveryPointer {
        location: default_location.trim().to_string(),
    };
    if pointer.location.is_empty() {
        return Err(ContextNetError::MalformedPointer(
            "Location field is empty".to_string(),
        ));
    }

    let location = pointer.resolve_against(root_hint);
    fs::create_dir_all(&location).map_err(ContextNetError::IoError)?;
    if !config::config_path(&location).exists() {
        NetworkConfig::default().save(&location)?;
    }

    fs::create_dir_all(root_hint).map_err(ContextNetError::IoError)?;
    let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(ContextNetError::AlreadyInitialized(path));
        }
        Err(e) => return Err(ContextNetError::IoError(e)),
    };
    f.write_all(pointer.render().as_bytes())
        .map_err(ContextNetError::IoError)?;
    f.sync_all().map_err(ContextNetError::IoError)?;

    tracing::info!(pointer = %path.display(), location = %location.display(), "initialized context network");
    Ok(location)
}

/// Point an initialized project at a new node root. Node files are not moved.
pub fn relocate(root_hint: &Path, new_location: &str) -> Result<PathBuf, ContextNetError> {
    let previous = read_pointer(root_hint)?;
    let pointer = DiscoveryPointer {
        location: new_location.trim().to_string(),
    };
    if pointer.location.is_empty() {
        return Err(ContextNetError::MalformedPointer(
            "Location field is empty".to_string(),
        ));
    }
    write_atomic(&pointer_path(root_hint), &pointer.render())?;
    tracing::info!(from = %previous.location, to = %pointer.location, "relocated context network");
    Ok(pointer.resolve_against(root_hint))
}

/// Walk up from `start` to the first directory holding a pointer file.
pub fn find_root_hint(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| pointer_path(dir).is_file())
        .map(Path::to_path_buf)
}
