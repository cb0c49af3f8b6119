use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextNetError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("No discovery pointer at {}. Run: contextnet init", .0.display())]
    MissingPointer(PathBuf),
    #[error("Malformed discovery pointer: {0}")]
    MalformedPointer(String),
    #[error("Context network already initialized (pointer exists at {})", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error("Node '{0}' already exists")]
    DuplicateId(String),
    #[error("Invalid node id: {0}")]
    InvalidId(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No task route named '{0}' in network.toml")]
    UnknownTask(String),
    #[error("Ledger error: {0}")]
    LedgerError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Rejected command line; the message is clap's rendered usage error.
    #[error("{0}")]
    UsageError(String),
}
