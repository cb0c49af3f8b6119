//! Node data model.
//!
//! A node is a tagged record: identity, free-text fields, a four-dimension
//! classification, the relationships it declares, authoring metadata and an
//! ordered change history. Content is opaque payload.

use crate::core::relationship::Relationship;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
                match normalized.as_str() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(format!(
                        "Invalid {} '{}'. Must be one of: {}",
                        stringify!($name).to_ascii_lowercase(),
                        s.trim(),
                        $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    )),
                }
            }
        }
    };
}

label_enum!(
    /// How often the node's subject is expected to change.
    Stability {
        Static => "static",
        SemiStable => "semi-stable" | "semistable",
        Dynamic => "dynamic",
    }
);

label_enum!(
    Abstraction {
        Conceptual => "conceptual",
        Structural => "structural",
        Detailed => "detailed",
    }
);

label_enum!(
    Confidence {
        Established => "established",
        Evolving => "evolving",
        Speculative => "speculative",
    }
);

/// Exactly one value per dimension. An absent dimension makes the node unclassified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: Option<String>,
    pub stability: Option<Stability>,
    pub abstraction: Option<Abstraction>,
    pub confidence: Option<Confidence>,
}

impl Classification {
    pub fn new(
        domain: &str,
        stability: Stability,
        abstraction: Abstraction,
        confidence: Confidence,
    ) -> Self {
        let domain = domain.trim();
        Self {
            domain: (!domain.is_empty()).then(|| domain.to_string()),
            stability: Some(stability),
            abstraction: Some(abstraction),
            confidence: Some(confidence),
        }
    }

    pub fn missing_dimensions(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.domain.as_deref().is_none_or(|d| d.trim().is_empty()) {
            missing.push("domain");
        }
        if self.stability.is_none() {
            missing.push("stability");
        }
        if self.abstraction.is_none() {
            missing.push("abstraction");
        }
        if self.confidence.is_none() {
            missing.push("confidence");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_dimensions().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub created_at: String,
    pub updated_at: String,
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub date: String,
    pub description: String,
}

/// A free-form section the loader does not interpret, kept so saves are lossless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub purpose: String,
    pub classification: Classification,
    pub content: String,
    pub relationships: Vec<Relationship>,
    pub metadata: Metadata,
    pub change_history: Vec<ChangeRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<Section>,
    /// Relationship lines that could not be parsed, verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed_relationships: Vec<String>,
}

impl Node {
    pub fn is_unclassified(&self) -> bool {
        !self.classification.is_complete()
    }

    pub fn declares(&self, target: &str, rel_type: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| r.target == target && r.rel_type == rel_type)
    }

    pub fn relationships_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| r.target == target)
    }

    /// Stamp `updated_at`/`updated_by` ahead of a save.
    pub fn touch(&mut self, date: &str, actor: &str) {
        self.metadata.updated_at = date.to_string();
        self.metadata.updated_by = actor.to_string();
    }
}

/// Initial fields for `NodeStore::create`.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub title: String,
    pub purpose: String,
    pub classification: Classification,
    pub content: String,
    pub relationships: Vec<Relationship>,
    pub author: String,
}
