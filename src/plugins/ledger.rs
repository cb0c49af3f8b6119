//! `contextnet ledger`: read and append Change Ledger entries.

use crate::core::error::ContextNetError;
use crate::core::ledger::ChangeLedgerEntry;
use crate::core::network::Network;
use crate::core::output;
use crate::core::time;
use crate::plugins::node::OutputFormat;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "ledger", about = "Inspect and extend the change ledger.")]
pub struct LedgerCli {
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// List entries, oldest first.
    List {
        /// Only entries touching this node.
        #[clap(long)]
        node: Option<String>,
        /// Only the last N entries.
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Record a change made outside the node commands.
    Append {
        #[clap(long)]
        summary: String,
        /// Node modified by the change (repeatable).
        #[clap(long = "node")]
        nodes: Vec<String>,
        /// Follow-up to record (repeatable).
        #[clap(long = "follow-up")]
        follow_ups: Vec<String>,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
}

/// Entries touching `node` (or all), keeping only the last `limit`.
pub fn filter_entries(
    entries: Vec<ChangeLedgerEntry>,
    node: Option<&str>,
    limit: Option<usize>,
) -> Vec<ChangeLedgerEntry> {
    let mut selected: Vec<ChangeLedgerEntry> = entries
        .into_iter()
        .filter(|e| node.is_none_or(|id| e.nodes_modified.iter().any(|n| n == id)))
        .collect();
    if let Some(limit) = limit {
        let skip = selected.len().saturating_sub(limit);
        selected.drain(..skip);
    }
    selected
}

pub fn run_ledger_cli(network: &Network, cli: LedgerCli) -> Result<(), ContextNetError> {
    let ledger = network.ledger();
    let json = cli.format == OutputFormat::Json;
    match cli.command {
        LedgerCommand::List { node, limit } => {
            let entries = filter_entries(ledger.read_all()?, node.as_deref(), limit);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&time::command_envelope(
                        "ledger.list",
                        "ok",
                        serde_json::json!({ "entries": entries }),
                    ))?
                );
            } else if entries.is_empty() {
                println!("No ledger entries.");
            } else {
                for e in &entries {
                    println!(
                        "{} {} [{}] {}",
                        e.date,
                        e.actor,
                        e.nodes_modified.join(","),
                        output::compact_line(&e.summary, 100)
                    );
                    for f in &e.follow_ups {
                        println!("    follow-up: {}", f);
                    }
                }
            }
        }
        LedgerCommand::Append {
            summary,
            nodes,
            follow_ups,
            actor,
        } => {
            if summary.trim().is_empty() {
                return Err(ContextNetError::ValidationError(
                    "Ledger entry summary must not be empty".to_string(),
                ));
            }
            let mut entry = ChangeLedgerEntry::new(&actor, summary.trim());
            for id in &nodes {
                entry = entry.with_node(id);
            }
            for f in &follow_ups {
                entry = entry.with_follow_up(f);
            }
            ledger.append(&entry)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&time::command_envelope(
                        "ledger.append",
                        "ok",
                        serde_json::json!({ "entry": entry }),
                    ))?
                );
            } else {
                println!("Ledger entry recorded: {}", entry.entry_id);
            }
        }
    }
    Ok(())
}
