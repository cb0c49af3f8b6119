//! `contextnet node`: authoring commands over the Node Store.
//!
//! Every mutating command saves the affected node(s) and appends exactly one
//! ledger entry describing the edit. Relationships are only ever added or
//! removed as part of saving their declaring node.

use crate::core::error::ContextNetError;
use crate::core::ledger::{ChangeLedgerEntry, RelationshipRecord};
use crate::core::network::Network;
use crate::core::node::{Abstraction, Classification, Confidence, NewNode, Node, Stability};
use crate::core::output;
use crate::core::relationship::{self, Relationship, normalize_type_label};
use crate::core::time;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(name = "node", about = "Create, inspect and edit context network nodes.")]
pub struct NodeCli {
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: NodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Create a new node file.
    Create {
        /// Node id: path under the node root without `.md` (e.g. foundation/structure)
        #[clap(long)]
        id: String,
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        purpose: String,
        #[clap(long)]
        domain: String,
        /// static, semi-stable, dynamic
        #[clap(long)]
        stability: String,
        /// conceptual, structural, detailed
        #[clap(long)]
        abstraction: String,
        /// established, evolving, speculative
        #[clap(long)]
        confidence: String,
        #[clap(long, default_value = "")]
        content: String,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
    /// Show one node.
    Show {
        #[clap(long)]
        id: String,
    },
    /// List all nodes with their classification state.
    List,
    /// Edit free-text fields or classification of a node.
    Edit {
        #[clap(long)]
        id: String,
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        purpose: Option<String>,
        #[clap(long)]
        content: Option<String>,
        #[clap(long)]
        domain: Option<String>,
        #[clap(long)]
        stability: Option<String>,
        #[clap(long)]
        abstraction: Option<String>,
        #[clap(long)]
        confidence: Option<String>,
        /// Change history description
        #[clap(long, default_value = "Edited")]
        reason: String,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
    /// Declare a typed relationship from source to target.
    Link {
        #[clap(long)]
        source: String,
        #[clap(long)]
        target: String,
        /// Relationship type, e.g. is-parent-of, depends-on, relates-to
        #[clap(long = "type")]
        rel_type: String,
        #[clap(long, default_value = "")]
        description: String,
        /// Also declare the inverse relationship on the target.
        #[clap(long)]
        bidirectional: bool,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
    /// Remove relationships from source to target.
    Unlink {
        #[clap(long)]
        source: String,
        #[clap(long)]
        target: String,
        /// Only remove relationships of this type.
        #[clap(long = "type")]
        rel_type: Option<String>,
        /// Also remove the inverse relationship(s) on the target.
        #[clap(long)]
        bidirectional: bool,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
    /// Remove a node. The removal and any now-dangling references are recorded in the ledger.
    Remove {
        #[clap(long)]
        id: String,
        #[clap(long)]
        reason: String,
        #[clap(long, default_value = "contextnet")]
        actor: String,
    },
}

fn parse_label<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, ContextNetError> {
    raw.parse::<T>().map_err(ContextNetError::ValidationError)
}

pub fn create_node(
    network: &Network,
    id: &str,
    initial: NewNode,
) -> Result<Node, ContextNetError> {
    let node = network.store().create(id, initial)?;
    network.ledger().append(
        &ChangeLedgerEntry::new(&node.metadata.updated_by, &format!("Created node {}", id))
            .with_node(id),
    )?;
    Ok(node)
}

/// Declare `source rel_type target`, optionally mirroring the inverse on the target.
pub fn link_nodes(
    network: &Network,
    source: &str,
    target: &str,
    rel_type: &str,
    description: &str,
    bidirectional: bool,
    actor: &str,
) -> Result<ChangeLedgerEntry, ContextNetError> {
    let store = network.store();
    let rel = Relationship::new(target, rel_type, description);
    let inverse = relationship::inverse_of(&rel.rel_type);

    if bidirectional && inverse.is_none() {
        return Err(ContextNetError::ValidationError(format!(
            "Relationship type '{}' has no defined inverse. Known types: {}",
            rel.rel_type,
            relationship::known_type_names().join(", ")
        )));
    }

    let mut source_node = store.get(source)?;
    if !store.exists(target) {
        if bidirectional {
            return Err(ContextNetError::NotFound(format!("node '{}'", target)));
        }
        tracing::warn!(source, target, "linking to a node that does not exist yet");
    }

    if source_node.declares(target, &rel.rel_type) {
        return Err(ContextNetError::ValidationError(format!(
            "'{} {} {}' is already declared",
            source, rel.rel_type, target
        )));
    }

    let today = time::today();
    let mut entry = ChangeLedgerEntry::new(actor, &format!("Linked {} {} {}", source, rel.rel_type, target))
        .with_node(source)
        .with_relationship_added(RelationshipRecord::new(source, target, &rel.rel_type));

    source_node.relationships.push(rel.clone());
    source_node.touch(&today, actor);
    store.save(
        &source_node,
        &format!("Added relationship {} → {}", rel.rel_type, target),
    )?;

    match (bidirectional, inverse) {
        (true, Some(inverse)) => {
            // Source and target may be the same file.
            let mirrored = store.get(target).and_then(|mut target_node| {
                if target_node.declares(source, inverse) {
                    return Ok(false);
                }
                target_node
                    .relationships
                    .push(Relationship::new(source, inverse, description));
                target_node.touch(&today, actor);
                store.save(
                    &target_node,
                    &format!("Added relationship {} → {}", inverse, source),
                )?;
                Ok(true)
            });
            match mirrored {
                Ok(true) => {
                    entry = entry
                        .with_node(target)
                        .with_relationship_added(RelationshipRecord::new(target, source, inverse));
                }
                Ok(false) => {}
                Err(e) => {
                    // The source side is already on disk; record it before failing.
                    let entry = entry.with_follow_up(&format!(
                        "Declare '{} {} {}' by hand: updating the target failed: {}",
                        target, inverse, source, e
                    ));
                    network.ledger().append(&entry)?;
                    return Err(e);
                }
            }
        }
        (false, Some(inverse)) => {
            entry = entry.with_follow_up(&format!(
                "Declare '{} {} {}' to keep the pair consistent",
                target, inverse, source
            ));
        }
        _ => {
            entry = entry.with_follow_up(&format!(
                "'{}' has no defined inverse; review before validating",
                rel.rel_type
            ));
        }
    }

    network.ledger().append(&entry)?;
    Ok(entry)
}

/// Remove `source -> target` relationships (optionally of one type) and, with
/// `bidirectional`, the matching inverses on the target.
pub fn unlink_nodes(
    network: &Network,
    source: &str,
    target: &str,
    rel_type: Option<&str>,
    bidirectional: bool,
    actor: &str,
) -> Result<ChangeLedgerEntry, ContextNetError> {
    let store = network.store();
    let rel_type = rel_type.map(normalize_type_label);
    let matches = |r: &Relationship, to: &str, ty: Option<&str>| {
        r.target == to && ty.is_none_or(|t| r.rel_type == t)
    };

    let mut source_node = store.get(source)?;
    let removed: Vec<Relationship> = source_node
        .relationships
        .iter()
        .filter(|r| matches(r, target, rel_type.as_deref()))
        .cloned()
        .collect();
    if removed.is_empty() {
        return Err(ContextNetError::NotFound(format!(
            "relationship {} -> {}{}",
            source,
            target,
            rel_type
                .as_deref()
                .map(|t| format!(" ({})", t))
                .unwrap_or_default()
        )));
    }

    let today = time::today();
    source_node
        .relationships
        .retain(|r| !matches(r, target, rel_type.as_deref()));
    source_node.touch(&today, actor);
    store.save(&source_node, &format!("Removed relationship(s) → {}", target))?;

    let mut entry = ChangeLedgerEntry::new(actor, &format!("Unlinked {} -> {}", source, target))
        .with_node(source);
    for r in &removed {
        entry = entry.with_relationship_modified(RelationshipRecord::new(source, target, &r.rel_type));
    }

    let inverses: Vec<&str> = removed
        .iter()
        .filter_map(|r| relationship::inverse_of(&r.rel_type))
        .collect();
    if bidirectional && store.exists(target) {
        let mut target_node = store.get(target)?;
        let before = target_node.relationships.len();
        target_node
            .relationships
            .retain(|r| !(r.target == source && inverses.contains(&r.rel_type.as_str())));
        if target_node.relationships.len() != before {
            target_node.touch(&today, actor);
            store.save(&target_node, &format!("Removed relationship(s) → {}", source))?;
            entry = entry.with_node(target);
            for inverse in &inverses {
                entry = entry.with_relationship_modified(RelationshipRecord::new(target, source, inverse));
            }
        }
    } else {
        for inverse in &inverses {
            entry = entry.with_follow_up(&format!(
                "Remove '{} {} {}' if it is still declared",
                target, inverse, source
            ));
        }
    }

    network.ledger().append(&entry)?;
    Ok(entry)
}

/// Remove a node file. Nodes that still point at it are listed as follow-ups.
pub fn remove_node(
    network: &Network,
    id: &str,
    reason: &str,
    actor: &str,
) -> Result<ChangeLedgerEntry, ContextNetError> {
    if reason.trim().is_empty() {
        return Err(ContextNetError::ValidationError(
            "A reason is required to remove a node".to_string(),
        ));
    }
    let snapshot = network.snapshot()?;
    if !snapshot.nodes.contains_key(id) {
        return Err(ContextNetError::NotFound(format!("node '{}'", id)));
    }
    let mut referrers: Vec<(String, String)> = snapshot
        .graph
        .incoming(id)
        .iter()
        .filter(|(_, src)| src != id)
        .cloned()
        .collect();
    referrers.sort();
    referrers.dedup();

    network.store().remove(id)?;

    let mut entry = ChangeLedgerEntry::new(actor, &format!("Removed node {}: {}", id, reason.trim()))
        .with_node(id);
    for (rel_type, src) in &referrers {
        entry = entry.with_follow_up(&format!(
            "Remove or retarget '{} {} {}'",
            src, rel_type, id
        ));
    }
    network.ledger().append(&entry)?;
    Ok(entry)
}

fn print_node(node: &Node) {
    println!("ID:          {}", node.id);
    println!("Title:       {}", node.title);
    let c = &node.classification;
    println!(
        "Class:       {} / {} / {} / {}",
        c.domain.as_deref().unwrap_or("-"),
        c.stability.map(|s| s.as_str()).unwrap_or("-"),
        c.abstraction.map(|a| a.as_str()).unwrap_or("-"),
        c.confidence.map(|cf| cf.as_str()).unwrap_or("-"),
    );
    println!("Created:     {}", node.metadata.created_at);
    println!(
        "Updated:     {} by {}",
        node.metadata.updated_at, node.metadata.updated_by
    );
    if !node.purpose.is_empty() {
        println!("Purpose:     {}", output::compact_line(&node.purpose, 100));
    }
    if !node.relationships.is_empty() {
        println!("Relationships:");
        for r in &node.relationships {
            println!("  {} --[{}]--> {}", node.id, r.rel_type, r.target);
        }
    }
    for line in &node.malformed_relationships {
        println!("  (malformed) {}", line);
    }
}

fn print_json(cmd: &str, value: serde_json::Value) -> Result<(), ContextNetError> {
    println!(
        "{}",
        serde_json::to_string_pretty(&time::command_envelope(cmd, "ok", value))?
    );
    Ok(())
}

pub fn run_node_cli(network: &Network, cli: NodeCli) -> Result<(), ContextNetError> {
    let json = cli.format == OutputFormat::Json;
    match cli.command {
        NodeCommand::Create {
            id,
            title,
            purpose,
            domain,
            stability,
            abstraction,
            confidence,
            content,
            actor,
        } => {
            let classification = Classification::new(
                &domain,
                parse_label::<Stability>(&stability)?,
                parse_label::<Abstraction>(&abstraction)?,
                parse_label::<Confidence>(&confidence)?,
            );
            let node = create_node(
                network,
                &id,
                NewNode {
                    title,
                    purpose,
                    classification,
                    content,
                    relationships: Vec::new(),
                    author: actor,
                },
            )?;
            if json {
                print_json("node.create", serde_json::json!({ "node": node }))?;
            } else {
                println!("Node created: {} ({})", node.id, node.title);
            }
        }
        NodeCommand::Show { id } => {
            let node = network.store().get(&id)?;
            if json {
                print_json("node.show", serde_json::json!({ "node": node }))?;
            } else {
                print_node(&node);
            }
        }
        NodeCommand::List => {
            let snapshot = network.snapshot()?;
            let mut nodes: Vec<&Node> = snapshot.nodes.values().collect();
            nodes.sort_by(|a, b| a.id.cmp(&b.id));
            if json {
                let rows: Vec<_> = nodes
                    .iter()
                    .map(|n| {
                        serde_json::json!({
                            "id": n.id,
                            "title": n.title,
                            "classified": !n.is_unclassified(),
                            "relationships": n.relationships.len(),
                        })
                    })
                    .collect();
                print_json("node.list", serde_json::json!({ "nodes": rows }))?;
            } else {
                for n in nodes {
                    println!(
                        "{} {:<40} {}",
                        output::classification_marker(!n.is_unclassified()),
                        n.id,
                        output::compact_line(&n.title, 60)
                    );
                }
            }
        }
        NodeCommand::Edit {
            id,
            title,
            purpose,
            content,
            domain,
            stability,
            abstraction,
            confidence,
            reason,
            actor,
        } => {
            let store = network.store();
            let mut node = store.get(&id)?;
            if let Some(v) = title {
                node.title = v.trim().to_string();
            }
            if let Some(v) = purpose {
                node.purpose = v.trim().to_string();
            }
            if let Some(v) = content {
                node.content = v.trim().to_string();
            }
            if let Some(v) = domain {
                let v = v.trim().to_string();
                node.classification.domain = (!v.is_empty()).then_some(v);
            }
            if let Some(v) = stability {
                node.classification.stability = Some(parse_label(&v)?);
            }
            if let Some(v) = abstraction {
                node.classification.abstraction = Some(parse_label(&v)?);
            }
            if let Some(v) = confidence {
                node.classification.confidence = Some(parse_label(&v)?);
            }
            node.touch(&time::today(), &actor);
            let node = store.save(&node, &reason)?;
            network.ledger().append(
                &ChangeLedgerEntry::new(&actor, &format!("Edited node {}: {}", id, reason))
                    .with_node(&id),
            )?;
            if json {
                print_json("node.edit", serde_json::json!({ "node": node }))?;
            } else {
                println!("Node updated: {}", node.id);
            }
        }
        NodeCommand::Link {
            source,
            target,
            rel_type,
            description,
            bidirectional,
            actor,
        } => {
            let entry = link_nodes(
                network,
                &source,
                &target,
                &rel_type,
                &description,
                bidirectional,
                &actor,
            )?;
            if json {
                print_json("node.link", serde_json::json!({ "entry": entry }))?;
            } else {
                println!("{}", entry.summary);
                for f in &entry.follow_ups {
                    println!("  follow-up: {}", f);
                }
            }
        }
        NodeCommand::Unlink {
            source,
            target,
            rel_type,
            bidirectional,
            actor,
        } => {
            let entry = unlink_nodes(
                network,
                &source,
                &target,
                rel_type.as_deref(),
                bidirectional,
                &actor,
            )?;
            if json {
                print_json("node.unlink", serde_json::json!({ "entry": entry }))?;
            } else {
                println!("{}", entry.summary);
                for f in &entry.follow_ups {
                    println!("  follow-up: {}", f);
                }
            }
        }
        NodeCommand::Remove { id, reason, actor } => {
            let entry = remove_node(network, &id, &reason, &actor)?;
            if json {
                print_json("node.remove", serde_json::json!({ "entry": entry }))?;
            } else {
                println!("{}", entry.summary);
                for f in &entry.follow_ups {
                    println!("  follow-up: {}", f);
                }
            }
        }
    }
    Ok(())
}
