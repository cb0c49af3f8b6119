use contextnet::core::config::{NetworkConfig, TaskRoute};
use contextnet::core::discovery;
use contextnet::core::error::ContextNetError;
use contextnet::core::graph::RelationshipGraph;
use contextnet::core::ledger::{ChangeLedger, ChangeLedgerEntry, RelationshipRecord};
use contextnet::core::navigate::{Strategy, TraversalOptions, traverse};
use contextnet::core::network::Network;
use contextnet::core::node::{Abstraction, Classification, Confidence, NewNode, Node, Stability};
use contextnet::core::relationship::{self, RELATIONSHIP_TYPES, Relationship};
use contextnet::core::schemas;
use contextnet::core::store::NodeStore;
use contextnet::core::validate::{self, DefectKind};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn classified() -> Classification {
    Classification::new(
        "architecture",
        Stability::SemiStable,
        Abstraction::Structural,
        Confidence::Established,
    )
}

fn new_node(title: &str, rels: &[(&str, &str)]) -> NewNode {
    NewNode {
        title: title.to_string(),
        purpose: format!("Explains {}", title),
        classification: classified(),
        content: format!("Body of {}.", title),
        relationships: rels
            .iter()
            .map(|(target, ty)| Relationship::new(target, ty, ""))
            .collect(),
        author: "tester".to_string(),
    }
}

fn init_network(dir: &Path) -> Network {
    discovery::initialize(dir, schemas::DEFAULT_LOCATION).unwrap();
    Network::open(dir).unwrap()
}

fn report_for(network: &Network, root: &str) -> validate::Report {
    let snapshot = network.snapshot().unwrap();
    validate::check(&snapshot.graph, &snapshot.nodes, root)
}

#[test]
fn missing_inverse_is_reported_on_the_target() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    let store = network.store();
    store.create("a", new_node("A", &[("b", "is-parent-of")])).unwrap();
    store.create("b", new_node("B", &[])).unwrap();

    let report = report_for(&network, "a");
    assert_eq!(report.defects.len(), 1, "{:?}", report.defects);
    let d = &report.defects[0];
    assert_eq!(d.kind, DefectKind::MissingInverse);
    assert_eq!(d.node_id, "b");
    assert!(d.detail.contains("is-child-of"));
}

#[test]
fn dangling_target_is_reported_on_the_declaring_node() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    network
        .store()
        .create("a", new_node("A", &[("c", "depends-on")]))
        .unwrap();

    let report = report_for(&network, "a");
    assert_eq!(report.count(DefectKind::DanglingRelationship), 1);
    let d = report.of_kind(DefectKind::DanglingRelationship).next().unwrap();
    assert_eq!(d.node_id, "a");
    assert!(d.detail.contains("'c'"));
    assert_eq!(report.defects.len(), 1);
}

#[test]
fn chain_is_reachable_and_traversed_in_declaration_order() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    let store = network.store();
    store.create("a", new_node("A", &[("b", "relates-to")])).unwrap();
    store
        .create("b", new_node("B", &[("a", "relates-to"), ("c", "relates-to")]))
        .unwrap();
    store.create("c", new_node("C", &[("b", "relates-to")])).unwrap();

    let snapshot = network.snapshot().unwrap();
    let report = validate::check(&snapshot.graph, &snapshot.nodes, "a");
    assert_eq!(report.count(DefectKind::UnreachableNode), 0);
    assert!(report.is_clean(), "{:?}", report.defects);

    let visited: Vec<String> = traverse(
        &snapshot.graph,
        &network.config,
        "a",
        &Strategy::BreadthFirst,
        &TraversalOptions::default(),
    )
    .unwrap()
    .collect();
    assert_eq!(visited, vec!["a", "b", "c"]);
}

#[test]
fn initialize_twice_leaves_first_pointer_untouched() {
    let tmp = tempdir().unwrap();
    let first = discovery::initialize(tmp.path(), "./notes").unwrap();
    let pointer_before = fs::read_to_string(discovery::pointer_path(tmp.path())).unwrap();

    let second = discovery::initialize(tmp.path(), "./elsewhere");
    assert!(matches!(second, Err(ContextNetError::AlreadyInitialized(_))));

    let pointer_after = fs::read_to_string(discovery::pointer_path(tmp.path())).unwrap();
    assert_eq!(pointer_before, pointer_after);
    assert_eq!(discovery::resolve(tmp.path()).unwrap(), first);
    assert!(!tmp.path().join("elsewhere").exists());
}

#[test]
fn missing_stability_loads_but_is_unclassified() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    fs::write(
        network.location.join("a.md"),
        "# A\n\n## Classification\n- **Domain:** ops\n- **Abstraction:** detailed\n- **Confidence:** evolving\n",
    )
    .unwrap();

    let snapshot = network.snapshot().unwrap();
    assert!(snapshot.failures.is_empty());
    let node = &snapshot.nodes["a"];
    assert_eq!(node.classification.missing_dimensions(), vec!["stability"]);

    let report = validate::check(&snapshot.graph, &snapshot.nodes, "a");
    assert_eq!(report.count(DefectKind::UnclassifiedNode), 1);
    let d = report.of_kind(DefectKind::UnclassifiedNode).next().unwrap();
    assert_eq!(d.node_id, "a");
    assert!(d.detail.contains("stability"));
}

#[test]
fn missing_pointer_is_a_resolution_error() {
    let tmp = tempdir().unwrap();
    assert!(matches!(
        Network::open(tmp.path()),
        Err(ContextNetError::MissingPointer(_))
    ));

    fs::write(discovery::pointer_path(tmp.path()), "# Context Network Discovery\n\nnothing here\n").unwrap();
    assert!(matches!(
        discovery::resolve(tmp.path()),
        Err(ContextNetError::MalformedPointer(_))
    ));
}

#[test]
fn relocate_rewrites_pointer_only() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    network.store().create("a", new_node("A", &[])).unwrap();

    let moved = discovery::relocate(tmp.path(), "./docs/network").unwrap();
    assert_eq!(moved, tmp.path().join("./docs/network"));
    assert_eq!(discovery::resolve(tmp.path()).unwrap(), moved);
    assert!(network.location.join("a.md").is_file());

    let nested = tmp.path().join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();
    assert_eq!(discovery::find_root_hint(&nested).unwrap(), tmp.path());
}

#[test]
fn every_known_type_round_trips_through_its_inverse() {
    for t in RELATIONSHIP_TYPES {
        let inverse = relationship::inverse_of(t.name).unwrap();
        assert_eq!(relationship::inverse_of(inverse), Some(t.name), "{}", t.name);
        assert_eq!(
            relationship::lookup(inverse).map(|i| i.category),
            Some(t.category)
        );
    }
}

#[test]
fn check_is_independent_of_load_order() {
    let nodes = vec![
        node_record("x", &[("y", "depends-on"), ("ghost", "relates-to")]),
        node_record("y", &[("x", "relates-to")]),
        node_record("z", &[("x", "custom-link")]),
        node_record("w", &[]),
    ];
    let forward: HashMap<String, Node> = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
    let backward: HashMap<String, Node> = nodes
        .iter()
        .rev()
        .map(|n| (n.id.clone(), n.clone()))
        .collect();

    let a = validate::check(&RelationshipGraph::build(&nodes), &forward, "x");
    let reversed: Vec<Node> = nodes.iter().rev().cloned().collect();
    let b = validate::check(&RelationshipGraph::build(&reversed), &backward, "x");
    assert_eq!(a, b);
    assert!(a.count(DefectKind::WrongInverseType) >= 1);
    assert_eq!(a.count(DefectKind::UnknownRelationshipType), 1);
    assert_eq!(a.count(DefectKind::UnreachableNode), 1);
}

fn node_record(id: &str, rels: &[(&str, &str)]) -> Node {
    Node {
        id: id.to_string(),
        title: id.to_uppercase(),
        purpose: String::new(),
        classification: classified(),
        content: String::new(),
        relationships: rels
            .iter()
            .map(|(t, ty)| Relationship::new(t, ty, ""))
            .collect(),
        metadata: Default::default(),
        change_history: vec![],
        extra_sections: vec![],
        malformed_relationships: vec![],
    }
}

#[test]
fn traversal_never_repeats_on_dense_cycles() {
    let ids = ["n0", "n1", "n2", "n3", "n4"];
    let nodes: Vec<Node> = ids
        .iter()
        .map(|id| {
            let rels: Vec<(&str, &str)> = ids
                .iter()
                .filter(|other| *other != id)
                .map(|other| (*other, "relates-to"))
                .collect();
            node_record(id, &rels)
        })
        .collect();
    let graph = RelationshipGraph::build(&nodes);

    for strategy in [Strategy::BreadthFirst, Strategy::DepthFirst] {
        let seen: Vec<String> = traverse(
            &graph,
            &NetworkConfig::default(),
            "n3",
            &strategy,
            &TraversalOptions::default(),
        )
        .unwrap()
        .collect();
        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(seen.len(), unique.len());
        assert_eq!(seen.len(), ids.len());
        assert_eq!(seen[0], "n3");
    }
}

#[test]
fn task_route_comes_from_network_config() {
    let tmp = tempdir().unwrap();
    discovery::initialize(tmp.path(), schemas::DEFAULT_LOCATION).unwrap();
    let location = discovery::resolve(tmp.path()).unwrap();
    let mut config = NetworkConfig::load(&location).unwrap();
    config.tasks.insert(
        "onboarding".to_string(),
        TaskRoute {
            description: "First read".to_string(),
            sequence: vec!["b".to_string(), "a".to_string(), "missing".to_string()],
        },
    );
    config.save(&location).unwrap();

    let network = Network::open(tmp.path()).unwrap();
    let store = network.store();
    store.create("a", new_node("A", &[])).unwrap();
    store.create("b", new_node("B", &[])).unwrap();

    let snapshot = network.snapshot().unwrap();
    let route: Vec<String> = traverse(
        &snapshot.graph,
        &network.config,
        "",
        &Strategy::ByTask("onboarding".to_string()),
        &TraversalOptions::default(),
    )
    .unwrap()
    .collect();
    assert_eq!(route, vec!["b", "a"]);
}

#[test]
fn save_then_load_returns_the_saved_node() {
    let tmp = tempdir().unwrap();
    let store = NodeStore::open(tmp.path());
    let created = store
        .create(
            "foundation/structure",
            new_node("Structure", &[("discovery", "is-child-of")]),
        )
        .unwrap();
    assert_eq!(store.get("foundation/structure").unwrap(), created);

    let mut edited = created.clone();
    edited.content = "Line one.\n\n```\n## not a heading\n```\n\nLine two.".to_string();
    edited
        .relationships
        .push(Relationship::new("decisions/adr-1", "implements", "records the layout"));
    edited.touch("2024-02-01", "editor");
    let saved = store.save(&edited, "Expanded content").unwrap();

    let reloaded = store.get("foundation/structure").unwrap();
    assert_eq!(reloaded, saved);
    assert_eq!(reloaded.change_history.len(), 2);
    assert_eq!(reloaded.metadata.updated_by, "editor");
}

#[test]
fn create_rejects_duplicates_and_bad_ids() {
    let tmp = tempdir().unwrap();
    let store = NodeStore::open(tmp.path());
    store.create("a", new_node("A", &[])).unwrap();
    assert!(matches!(
        store.create("a", new_node("A again", &[])),
        Err(ContextNetError::DuplicateId(_))
    ));
    assert!(matches!(
        store.create("../outside", new_node("X", &[])),
        Err(ContextNetError::InvalidId(_))
    ));
    assert!(matches!(store.get("nope"), Err(ContextNetError::NotFound(_))));
}

#[test]
fn ledger_preserves_append_order_and_rejects_corruption() {
    let tmp = tempdir().unwrap();
    let ledger = ChangeLedger::open(tmp.path());
    assert!(ledger.read_all().unwrap().is_empty());

    for i in 0..3 {
        ledger
            .append(
                &ChangeLedgerEntry::new("tester", &format!("change {}", i))
                    .with_node("a")
                    .with_relationship_added(RelationshipRecord::new("a", "b", "relates-to")),
            )
            .unwrap();
    }
    let entries = ledger.read_all().unwrap();
    let summaries: Vec<&str> = entries.iter().map(|e| e.summary.as_str()).collect();
    assert_eq!(summaries, vec!["change 0", "change 1", "change 2"]);

    let mut raw = fs::read_to_string(ledger.path()).unwrap();
    raw.push_str("{not json\n");
    fs::write(ledger.path(), raw).unwrap();
    match ledger.read_all() {
        Err(ContextNetError::LedgerError(msg)) => assert!(msg.contains("line 4"), "{}", msg),
        other => panic!("expected ledger error, got {:?}", other),
    }
}

#[test]
fn load_all_skips_non_node_files() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    network.store().create("a", new_node("A", &[])).unwrap();
    network
        .ledger()
        .append(&ChangeLedgerEntry::new("tester", "noise"))
        .unwrap();
    fs::write(network.location.join(".draft.md"), "# hidden").unwrap();
    fs::write(network.location.join("notes.txt"), "not a node").unwrap();

    let snapshot = network.snapshot().unwrap();
    let mut ids: Vec<&String> = snapshot.nodes.keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn headings_and_open_fences_in_text_survive_save() {
    let tmp = tempdir().unwrap();
    let store = NodeStore::open(tmp.path());
    let created = store
        .create("guide", new_node("Guide", &[("appendix", "relates-to")]))
        .unwrap();

    let mut edited = created.clone();
    edited.purpose = "## Why this exists".to_string();
    edited.content = "Intro\n\n## Details\nmore".to_string();
    edited.touch("2024-03-01", "editor");
    let saved = store.save(&edited, "Added a details heading").unwrap();
    let reloaded = store.get("guide").unwrap();
    assert_eq!(reloaded, saved);
    assert_eq!(reloaded.content, "Intro\n\n## Details\nmore");
    assert!(reloaded.extra_sections.is_empty());

    let mut edited = reloaded.clone();
    edited.content = "```rust\nfn x() {}".to_string();
    let saved = store.save(&edited, "Pasted an unterminated snippet").unwrap();
    let reloaded = store.get("guide").unwrap();
    assert_eq!(reloaded, saved);
    assert_eq!(reloaded.relationships, created.relationships);
    assert_eq!(reloaded.metadata.updated_by, "editor");
    assert_eq!(reloaded.change_history.len(), 3);
}

#[test]
fn markdown_links_resolve_against_the_declaring_node() {
    let tmp = tempdir().unwrap();
    let network = init_network(tmp.path());
    let root = &network.location;
    fs::create_dir_all(root.join("runtime")).unwrap();
    fs::create_dir_all(root.join("foundation")).unwrap();
    let classification = "## Classification\n- **Domain:** core\n- **Stability:** static\n\
- **Abstraction:** structural\n- **Confidence:** established\n";
    fs::write(
        root.join("runtime/overview.md"),
        format!(
            "# Overview\n\n{}\n## Relationships\n- [Foundation](../foundation/index.md) — is-child-of\n",
            classification
        ),
    )
    .unwrap();
    fs::write(
        root.join("foundation/index.md"),
        format!(
            "# Foundation\n\n{}\n## Relationships\n- [Overview](../runtime/overview.md) — is-parent-of\n",
            classification
        ),
    )
    .unwrap();

    let snapshot = network.snapshot().unwrap();
    assert_eq!(
        snapshot.nodes["runtime/overview"].relationships[0].target,
        "foundation/index"
    );
    let report = validate::check(&snapshot.graph, &snapshot.nodes, "foundation/index");
    assert!(report.defects.is_empty(), "{:?}", report.defects);
}
