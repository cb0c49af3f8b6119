//! Relationship types and the static inverse table.
//!
//! Every relationship a node declares is checked against its inverse on the
//! target node. The table below is the single source of truth for which
//! labels exist, which category they belong to, and what their inverse is.
//! Self-inverse types list themselves as their own inverse.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Hierarchical,
    Associative,
    CrossDomain,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Hierarchical => "hierarchical",
            Category::Associative => "associative",
            Category::CrossDomain => "cross-domain",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipType {
    pub name: &'static str,
    pub inverse: &'static str,
    pub category: Category,
}

const fn rel(name: &'static str, inverse: &'static str, category: Category) -> RelationshipType {
    RelationshipType {
        name,
        inverse,
        category,
    }
}

pub const RELATIONSHIP_TYPES: &[RelationshipType] = &[
    rel("is-parent-of", "is-child-of", Category::Hierarchical),
    rel("is-child-of", "is-parent-of", Category::Hierarchical),
    rel("is-version-of", "is-version-of", Category::Hierarchical),
    rel("relates-to", "relates-to", Category::Associative),
    rel("depends-on", "is-depended-on-by", Category::Associative),
    rel("is-depended-on-by", "depends-on", Category::Associative),
    rel("implements", "is-implemented-by", Category::Associative),
    rel("is-implemented-by", "implements", Category::Associative),
    rel("extends", "is-extended-by", Category::Associative),
    rel("is-extended-by", "extends", Category::Associative),
    rel("contradicts", "contradicts", Category::Associative),
    rel("complements", "complements", Category::Associative),
    rel("interfaces-with", "interfaces-with", Category::CrossDomain),
    rel("translates-to", "translates-from", Category::CrossDomain),
    rel("translates-from", "translates-to", Category::CrossDomain),
    rel("impacts", "is-impacted-by", Category::CrossDomain),
    rel("is-impacted-by", "impacts", Category::CrossDomain),
];

pub fn lookup(name: &str) -> Option<&'static RelationshipType> {
    RELATIONSHIP_TYPES.iter().find(|t| t.name == name)
}

pub fn inverse_of(name: &str) -> Option<&'static str> {
    lookup(name).map(|t| t.inverse)
}

pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

pub fn is_self_inverse(name: &str) -> bool {
    lookup(name).is_some_and(|t| t.name == t.inverse)
}

pub fn known_type_names() -> Vec<&'static str> {
    RELATIONSHIP_TYPES.iter().map(|t| t.name).collect()
}

/// Canonical spelling of a type label as written by an author:
/// lowercased, with runs of whitespace or underscores folded to `-`.
pub fn normalize_type_label(raw: &str) -> String {
    raw.trim()
        .trim_matches('`')
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_ascii_lowercase()
}

/// A relationship declared by a node. The declaring node is the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub target: String,
    pub rel_type: String,
    #[serde(default)]
    pub description: String,
}

impl Relationship {
    pub fn new(target: &str, rel_type: &str, description: &str) -> Self {
        Self {
            target: target.to_string(),
            rel_type: normalize_type_label(rel_type),
            description: description.trim().to_string(),
        }
    }

    pub fn kind(&self) -> Option<&'static RelationshipType> {
        lookup(&self.rel_type)
    }

    /// The relationship the target must declare back to `source_id`, if the type is known.
    pub fn expected_inverse(&self, source_id: &str) -> Option<Relationship> {
        inverse_of(&self.rel_type).map(|inverse| Relationship {
            target: source_id.to_string(),
            rel_type: inverse.to_string(),
            description: String::new(),
        })
    }
}
