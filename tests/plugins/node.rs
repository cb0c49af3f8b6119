use contextnet::core::discovery;
use contextnet::core::error::ContextNetError;
use contextnet::core::network::Network;
use contextnet::core::node::{Abstraction, Classification, Confidence, NewNode, Stability};
use contextnet::core::schemas;
use contextnet::core::validate::{self, DefectKind};
use contextnet::plugins::node::{create_node, link_nodes, remove_node, unlink_nodes};
use std::path::Path;
use tempfile::tempdir;

fn setup(dir: &Path, ids: &[&str]) -> Network {
    discovery::initialize(dir, schemas::DEFAULT_LOCATION).unwrap();
    let network = Network::open(dir).unwrap();
    for id in ids {
        create_node(
            &network,
            id,
            NewNode {
                title: id.to_uppercase(),
                purpose: String::new(),
                classification: Classification::new(
                    "meta",
                    Stability::Static,
                    Abstraction::Conceptual,
                    Confidence::Established,
                ),
                content: String::new(),
                relationships: Vec::new(),
                author: "tester".to_string(),
            },
        )
        .unwrap();
    }
    network
}

fn cli(dir: &Path, args: &[&str]) -> Result<(), ContextNetError> {
    let dir = dir.to_string_lossy().to_string();
    let mut argv = vec!["contextnet", "--dir", dir.as_str()];
    argv.extend_from_slice(args);
    contextnet::run_from(argv)
}

#[test]
fn test_bidirectional_link_via_cli_validates_clean() {
    let tmp = tempdir().unwrap();
    cli(tmp.path(), &["init"]).unwrap();
    for (id, title) in [("discovery", "Discovery"), ("foundation/structure", "Structure")] {
        cli(
            tmp.path(),
            &[
                "node",
                "create",
                "--id",
                id,
                "--title",
                title,
                "--domain",
                "meta",
                "--stability",
                "semi-stable",
                "--abstraction",
                "structural",
                "--confidence",
                "evolving",
            ],
        )
        .unwrap();
    }

    cli(
        tmp.path(),
        &[
            "node",
            "link",
            "--source",
            "discovery",
            "--target",
            "foundation/structure",
            "--type",
            "is-parent-of",
            "--bidirectional",
        ],
    )
    .unwrap();

    cli(tmp.path(), &["validate"]).unwrap();

    let network = Network::open(tmp.path()).unwrap();
    let child = network.store().get("foundation/structure").unwrap();
    assert!(child.declares("discovery", "is-child-of"));
    // Two creates plus the link.
    assert_eq!(network.ledger().read_all().unwrap().len(), 3);
}

#[test]
fn test_one_sided_link_fails_validation_with_follow_up() {
    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["discovery", "b"]);

    let entry = link_nodes(&network, "discovery", "b", "depends-on", "", false, "tester").unwrap();
    assert_eq!(entry.nodes_modified, vec!["discovery"]);
    assert_eq!(entry.relationships_added.len(), 1);
    assert!(entry.follow_ups[0].contains("b is-depended-on-by discovery"));

    let result = validate::run_validation(&network, None, false);
    assert!(matches!(result, Err(ContextNetError::ValidationError(_))));

    let snapshot = network.snapshot().unwrap();
    let report = validate::check(&snapshot.graph, &snapshot.nodes, "discovery");
    assert_eq!(report.count(DefectKind::MissingInverse), 1);
}

#[test]
fn test_link_rejects_duplicates_and_unknown_bidirectional_types() {
    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["a", "b"]);

    link_nodes(&network, "a", "b", "Relates To", "", true, "tester").unwrap();
    let dup = link_nodes(&network, "a", "b", "relates-to", "", false, "tester");
    assert!(matches!(dup, Err(ContextNetError::ValidationError(_))));

    let unknown = link_nodes(&network, "a", "b", "mentors", "", true, "tester");
    assert!(matches!(unknown, Err(ContextNetError::ValidationError(_))));

    // Self-inverse type added on both sides exactly once.
    let b = network.store().get("b").unwrap();
    assert_eq!(b.relationships_to("a").count(), 1);
}

#[test]
fn test_unlink_bidirectional_removes_both_sides() {
    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["a", "b"]);
    link_nodes(&network, "a", "b", "implements", "", true, "tester").unwrap();

    let entry = unlink_nodes(&network, "a", "b", Some("implements"), true, "tester").unwrap();
    assert_eq!(entry.nodes_modified, vec!["a", "b"]);
    assert!(entry.follow_ups.is_empty());

    let store = network.store();
    assert!(store.get("a").unwrap().relationships.is_empty());
    assert!(store.get("b").unwrap().relationships.is_empty());

    let again = unlink_nodes(&network, "a", "b", None, false, "tester");
    assert!(matches!(again, Err(ContextNetError::NotFound(_))));
}

#[test]
fn test_remove_node_lists_referrers_as_follow_ups() {
    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["a", "b", "c"]);
    link_nodes(&network, "a", "c", "is-parent-of", "", true, "tester").unwrap();
    link_nodes(&network, "b", "c", "relates-to", "", false, "tester").unwrap();

    let missing_reason = remove_node(&network, "c", "  ", "tester");
    assert!(matches!(missing_reason, Err(ContextNetError::ValidationError(_))));

    let entry = remove_node(&network, "c", "merged into a", "tester").unwrap();
    assert_eq!(entry.follow_ups.len(), 2);
    assert!(entry.follow_ups[0].contains("'a is-parent-of c'"));
    assert!(entry.follow_ups[1].contains("'b relates-to c'"));
    assert!(!network.store().exists("c"));

    let snapshot = network.snapshot().unwrap();
    let report = validate::check(&snapshot.graph, &snapshot.nodes, "a");
    assert_eq!(report.count(DefectKind::DanglingRelationship), 2);

    assert!(matches!(
        remove_node(&network, "c", "again", "tester"),
        Err(ContextNetError::NotFound(_))
    ));
}

#[test]
fn test_edit_via_cli_updates_classification() {
    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["a"]);

    cli(
        tmp.path(),
        &["node", "edit", "--id", "a", "--confidence", "speculative", "--reason", "Reassessed"],
    )
    .unwrap();
    let bad = cli(tmp.path(), &["node", "edit", "--id", "a", "--stability", "wobbly"]);
    assert!(matches!(bad, Err(ContextNetError::ValidationError(_))));

    let a = network.store().get("a").unwrap();
    assert_eq!(a.classification.confidence, Some(Confidence::Speculative));
    assert_eq!(a.change_history.last().unwrap().description, "Reassessed");
}

#[cfg(unix)]
#[test]
fn test_bidirectional_link_records_source_side_when_target_write_fails() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let network = setup(tmp.path(), &["a", "locked/b"]);
    let locked = network.location.join("locked");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
    // Privileged users write through read-only directories; nothing to check then.
    if std::fs::write(locked.join(".writable"), "").is_ok() {
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = link_nodes(&network, "a", "locked/b", "is-parent-of", "", true, "tester");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    assert!(result.is_err());

    let store = network.store();
    assert!(store.get("a").unwrap().declares("locked/b", "is-parent-of"));
    assert!(store.get("locked/b").unwrap().relationships.is_empty());

    let entries = network.ledger().read_all().unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.nodes_modified, vec!["a"]);
    assert_eq!(last.relationships_added.len(), 1);
    assert_eq!(last.follow_ups.len(), 1);
    assert!(last.follow_ups[0].contains("'locked/b is-child-of a'"));
}
