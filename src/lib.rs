//! contextnet: a typed, checked graph over a directory of markdown notes.
//!
//! A context network is a set of markdown *nodes* living under a node root
//! that a project-level pointer file (`.context-network.md`) names. Each node
//! carries a four-dimension classification and declares typed relationships
//! to other nodes. Every relationship type has a defined inverse, and the
//! network is consistent when every declared relationship is mirrored by its
//! inverse on the target.
//!
//! # Architecture
//!
//! - **Discovery** (`core::discovery`): pointer file -> node root.
//! - **Node Store** (`core::store`, `core::markdown`): load, save, create and
//!   remove node files. Parse problems become node flags, never load errors.
//! - **Relationship Graph** (`core::graph`, `core::relationship`): adjacency
//!   built from declarations, plus the static type/inverse table.
//! - **Consistency Checker** (`core::validate`): dangling targets, missing or
//!   wrong inverses, unclassified and unreachable nodes, as one report.
//! - **Navigation** (`core::navigate`): breadth-first, depth-first and
//!   task-route traversals as lazy iterators.
//! - **Change Ledger** (`core::ledger`): append-only JSONL record of edits.
//!
//! # Examples
//!
//! ```bash
//! contextnet init
//! contextnet node create --id discovery --title "Discovery" --domain meta \
//!     --stability static --abstraction conceptual --confidence established
//! contextnet node link --source discovery --target foundation/structure \
//!     --type is-parent-of --bidirectional
//! contextnet validate
//! contextnet nav --start discovery --strategy dfs
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: data model, storage, graph, checker, navigation, ledger
//! - [`plugins`]: CLI command groups (`node`, `nav`, `ledger`)

pub mod core;
pub mod plugins;

use crate::core::{discovery, error, network::Network, schemas, store, validate};
use plugins::{ledger, nav, node};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "contextnet",
    version = env!("CARGO_PKG_VERSION"),
    about = "Typed relationship graph and consistency checker for markdown context networks"
)]
struct Cli {
    /// Project directory holding the pointer file (defaults to the nearest
    /// ancestor of the working directory that has one).
    #[clap(long, global = true)]
    dir: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ValidateCli {
    /// Root node for reachability (defaults to `root` in network.toml).
    #[clap(long)]
    root: Option<String>,
    #[clap(long, value_enum, default_value = "text")]
    format: node::OutputFormat,
}

#[derive(clap::Args, Debug)]
struct GraphCli {
    #[clap(subcommand)]
    command: GraphCommand,
}

#[derive(Subcommand, Debug)]
enum GraphCommand {
    /// Write `{nodes, edges}` JSON to `<location>/_graph.json`.
    Export {
        /// Also print the export to stdout.
        #[clap(long)]
        stdout: bool,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the pointer file, node root and default config.
    Init {
        /// Node root recorded in the pointer, relative to the project directory.
        #[clap(long, default_value = schemas::DEFAULT_LOCATION)]
        location: String,
    },

    /// Point the project at a different node root. Files are not moved.
    Relocate {
        #[clap(long)]
        location: String,
    },

    /// Check the whole network and report every defect.
    Validate(ValidateCli),

    /// Traverse the network.
    Nav(nav::NavCli),

    /// Create, inspect, link and remove nodes.
    Node(node::NodeCli),

    /// Change ledger.
    Ledger(ledger::LedgerCli),

    /// Graph export.
    Graph(GraphCli),

    /// Print version.
    Version,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("CONTEXTNET_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // A second init (tests calling `run` in-process) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn project_dir(explicit: Option<PathBuf>) -> Result<PathBuf, error::ContextNetError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let cwd = std::env::current_dir()?;
    Ok(discovery::find_root_hint(&cwd).unwrap_or(cwd))
}

fn open_network(explicit: Option<PathBuf>) -> Result<Network, error::ContextNetError> {
    Network::open(&project_dir(explicit)?)
}

pub fn run() -> Result<(), error::ContextNetError> {
    run_with(Cli::parse())
}

/// Parse `args` (including the binary name) and run the command.
///
/// `--help` and `--version` print and succeed; any other parse failure is a
/// `UsageError`.
pub fn run_from<I, T>(args: I) -> Result<(), error::ContextNetError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    use clap::error::ErrorKind;

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                e.print()?;
                return Ok(());
            }
            _ => return Err(error::ContextNetError::UsageError(e.to_string())),
        },
    };
    run_with(cli)
}

fn run_with(cli: Cli) -> Result<(), error::ContextNetError> {
    init_tracing();

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init { location } => {
            let dir = match cli.dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let node_root = discovery::initialize(&dir, &location)?;
            println!("Context network initialized at {}", node_root.display());
            Ok(())
        }
        Command::Relocate { location } => {
            let dir = project_dir(cli.dir)?;
            let node_root = discovery::relocate(&dir, &location)?;
            println!("Context network now at {}", node_root.display());
            Ok(())
        }
        Command::Validate(v) => {
            let network = open_network(cli.dir)?;
            validate::run_validation(&network, v.root.as_deref(), v.format == node::OutputFormat::Json)?;
            Ok(())
        }
        Command::Nav(nav_cli) => {
            let network = open_network(cli.dir)?;
            nav::run_nav_cli(&network, nav_cli)?;
            Ok(())
        }
        Command::Node(node_cli) => node::run_node_cli(&open_network(cli.dir)?, node_cli),
        Command::Ledger(ledger_cli) => ledger::run_ledger_cli(&open_network(cli.dir)?, ledger_cli),
        Command::Graph(GraphCli {
            command: GraphCommand::Export { stdout },
        }) => {
            let network = open_network(cli.dir)?;
            let snapshot = network.snapshot()?;
            let rendered = serde_json::to_string_pretty(&snapshot.graph.to_json())?;
            let path = network.location.join(schemas::GRAPH_EXPORT_NAME);
            store::write_atomic(&path, &rendered)?;
            if stdout {
                println!("{}", rendered);
            } else {
                println!("Graph exported to {}", path.display());
            }
            Ok(())
        }
    }
}
