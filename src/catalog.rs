//! Catalog item types and the in-memory catalog snapshot

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};

/// Kind of catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Named regex pattern
    Format,
    /// Named field bound to a format
    Definition,
    /// Named grouping of definitions and other entities
    Entity,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Format => "format",
            ItemKind::Definition => "definition",
            ItemKind::Entity => "entity",
        }
    }

    /// Name of the collection holding items of this kind
    pub fn collection(&self) -> &'static str {
        match self {
            ItemKind::Format => "formats",
            ItemKind::Definition => "definitions",
            ItemKind::Entity => "entities",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "format" => Ok(ItemKind::Format),
            "definition" => Ok(ItemKind::Definition),
            "entity" => Ok(ItemKind::Entity),
            other => Err(CatalogError::InvalidQuery(format!("unknown item kind '{}'", other))),
        }
    }
}

/// A named regex pattern. The name is the key in the formats collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

impl Format {
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }

    /// Check that the pattern is anchored with `^...$` and compiles
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.pattern.starts_with('^') || !self.pattern.ends_with('$') {
            return Err(CatalogError::InvalidPattern {
                name: name.to_string(),
                reason: "pattern must start with '^' and end with '$'".to_string(),
            });
        }
        self.compile(name).map(|_| ())
    }

    pub fn compile(&self, name: &str) -> Result<Regex> {
        Regex::new(&self.pattern).map_err(|e| CatalogError::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A named field bound to a format. `format` may dangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub format: String,
    #[serde(default)]
    pub description: String,
}

impl Definition {
    pub fn new(format: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            description: description.into(),
        }
    }
}

/// What an entity field points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Definition,
    Entity,
}

/// A field of an entity, referencing a definition or another entity by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

impl Field {
    pub fn definition(label: impl Into<String>) -> Self {
        Self { label: label.into(), kind: FieldKind::Definition }
    }

    pub fn entity(label: impl Into<String>) -> Self {
        Self { label: label.into(), kind: FieldKind::Entity }
    }
}

/// A named structured type. The label is the key in the entities collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Entity {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn has_field(&self, label: &str) -> bool {
        self.fields.iter().any(|f| f.label == label)
    }
}

/// Audit log entry. `before` is `""` on creation, `after` is `""` on deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
}

impl ChangeRecord {
    pub fn new(
        kind: ItemKind,
        name: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        let blank = || serde_json::Value::String(String::new());
        Self {
            kind,
            name: name.into(),
            timestamp: Utc::now(),
            before: before.unwrap_or_else(blank),
            after: after.unwrap_or_else(blank),
        }
    }
}

/// Search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub kind: ItemKind,
    pub name: String,
    pub score: i64,
}

/// Point-in-time snapshot of the three catalog collections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub formats: BTreeMap<String, Format>,
    #[serde(default)]
    pub definitions: BTreeMap<String, Definition>,
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, name: &str, pattern: &str) -> Self {
        self.formats.insert(name.to_string(), Format::new(pattern, ""));
        self
    }

    pub fn with_definition(mut self, name: &str, format: &str) -> Self {
        self.definitions.insert(name.to_string(), Definition::new(format, ""));
        self
    }

    pub fn with_entity(mut self, label: &str, fields: Vec<Field>) -> Self {
        self.entities.insert(label.to_string(), Entity::new(fields));
        self
    }

    pub fn contains(&self, kind: ItemKind, name: &str) -> bool {
        match kind {
            ItemKind::Format => self.formats.contains_key(name),
            ItemKind::Definition => self.definitions.contains_key(name),
            ItemKind::Entity => self.entities.contains_key(name),
        }
    }

    /// Fuzzy search over every item name
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let names = self.formats.keys().map(|n| (ItemKind::Format, n))
            .chain(self.definitions.keys().map(|n| (ItemKind::Definition, n)))
            .chain(self.entities.keys().map(|n| (ItemKind::Entity, n)));

        let mut results: Vec<SearchResult> = names
            .filter_map(|(kind, name)| {
                matcher.fuzzy_match(name, query).map(|score| SearchResult {
                    kind,
                    name: name.clone(),
                    score,
                })
            })
            .collect();

        // Best score first, then by kind and name for stable output
        results.sort_by(|a, b| {
            b.score.cmp(&a.score)
                .then(a.kind.cmp(&b.kind))
                .then(a.name.cmp(&b.name))
        });
        results.truncate(limit);
        results
    }
}
