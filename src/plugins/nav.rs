//! `contextnet nav`: print a traversal of the network.

use crate::core::error::ContextNetError;
use crate::core::navigate::{self, Strategy, TraversalOptions};
use crate::core::network::Network;
use crate::core::time;
use crate::plugins::node::OutputFormat;
use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    Bfs,
    Dfs,
}

#[derive(Parser, Debug)]
#[clap(name = "nav", about = "Walk the network from a start node or along a task route.")]
pub struct NavCli {
    /// Start node id (defaults to the configured root).
    #[clap(long)]
    pub start: Option<String>,
    #[clap(long, value_enum, default_value = "bfs")]
    pub strategy: StrategyArg,
    /// Follow the configured route for this task instead of the graph.
    #[clap(long, conflicts_with_all = ["start", "rel_types", "max_depth"])]
    pub task: Option<String>,
    /// Only follow relationships of this type (repeatable).
    #[clap(long = "type")]
    pub rel_types: Vec<String>,
    #[clap(long)]
    pub max_depth: Option<usize>,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Resolve the CLI arguments into a strategy, start id and options.
pub fn plan(network: &Network, cli: &NavCli) -> (Strategy, String, TraversalOptions) {
    let strategy = match (&cli.task, cli.strategy) {
        (Some(task), _) => Strategy::ByTask(task.clone()),
        (None, StrategyArg::Bfs) => Strategy::BreadthFirst,
        (None, StrategyArg::Dfs) => Strategy::DepthFirst,
    };
    let start = cli
        .start
        .clone()
        .unwrap_or_else(|| network.config.root.clone());
    let options = TraversalOptions {
        type_filter: (!cli.rel_types.is_empty()).then(|| cli.rel_types.clone()),
        max_depth: cli.max_depth,
    };
    (strategy, start, options)
}

pub fn run_nav_cli(network: &Network, cli: NavCli) -> Result<Vec<String>, ContextNetError> {
    let snapshot = network.snapshot()?;
    let (strategy, start, options) = plan(network, &cli);
    let ids: Vec<String> =
        navigate::traverse(&snapshot.graph, &network.config, &start, &strategy, &options)?
            .collect();

    if cli.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&time::command_envelope(
                "nav",
                "ok",
                serde_json::json!({ "start": start, "visited": ids }),
            ))?
        );
    } else {
        for id in &ids {
            let title = snapshot
                .nodes
                .get(id)
                .map(|n| n.title.as_str())
                .unwrap_or_default();
            println!("{:<40} {}", id, title);
        }
    }
    Ok(ids)
}
