//! Affected Items
//!
//! Answers "if item X of kind K changes, which catalog items reference it?"
//!
//! The walk is a small state machine over reference kinds rather than a
//! generic graph traversal, because each layer has its own relation:
//!
//! ```text
//! format ──▶ definitions whose `format` is the name
//! definition ──▶ entities with a field labelled with the name
//! entity ──▶ entities that are the entity or have a field labelled with it
//! ```
//!
//! One invocation walks a single hop. A format query additionally issues a
//! second wave of definition hops so that format → definition → entity
//! ripples are reported. The walk is bounded to two collection passes, so
//! cyclic entity graphs cannot cause it to loop.
//!
//! The result is a point-in-time advisory answer over a catalog snapshot.
//! Nothing locks the catalog between the check and a following mutation, so
//! callers re-check before destructive actions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::catalog::{Catalog, ItemKind};
use crate::error::{CatalogError, Result};

/// Which item the caller intends to change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedQuery {
    pub kind: ItemKind,
    pub name: String,
}

impl AffectedQuery {
    pub fn new(kind: ItemKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }

    /// Build a query from `format=`/`definition=`/`entity=` parameters.
    ///
    /// Exactly one parameter must be present; anything else is rejected
    /// before any lookup happens.
    pub fn from_params<'a, I>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut found: Option<Self> = None;
        let mut count = 0usize;

        for (key, value) in params {
            count += 1;
            let kind: ItemKind = key.parse()?;
            found = Some(Self::new(kind, value));
        }

        match (count, found) {
            (1, Some(query)) => Ok(query),
            (0, _) => Err(CatalogError::InvalidQuery(
                "one of format, definition or entity is required".to_string(),
            )),
            _ => Err(CatalogError::InvalidQuery(
                "only one of format, definition or entity may be given".to_string(),
            )),
        }
    }
}

/// Names whose correctness depends on the queried item.
///
/// An empty result (`{}`) means nothing references the item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedItems {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
}

impl AffectedItems {
    pub fn is_empty(&self) -> bool {
        self.definitions.as_ref().map_or(true, Vec::is_empty)
            && self.entities.as_ref().map_or(true, Vec::is_empty)
    }

    fn record(&mut self, collection: ItemKind, names: BTreeSet<String>) {
        if names.is_empty() {
            return;
        }
        let names: Vec<String> = names.into_iter().collect();
        match collection {
            ItemKind::Definition => self.definitions = Some(names),
            ItemKind::Entity => self.entities = Some(names),
            // formats never reference anything
            ItemKind::Format => {}
        }
    }
}

/// State of the kind-transition walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop {
    Format,
    Definition,
    Entity,
}

impl Hop {
    fn start(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Format => Hop::Format,
            ItemKind::Definition => Hop::Definition,
            ItemKind::Entity => Hop::Entity,
        }
    }

    /// Collection scanned while in this state
    fn target(self) -> ItemKind {
        match self {
            Hop::Format => ItemKind::Definition,
            Hop::Definition | Hop::Entity => ItemKind::Entity,
        }
    }

    fn next(self) -> Self {
        match self {
            Hop::Format => Hop::Definition,
            Hop::Definition | Hop::Entity => Hop::Entity,
        }
    }

    /// Names in the target collection that match `reference` in this state
    fn scan(self, catalog: &Catalog, reference: &str) -> BTreeSet<String> {
        match self {
            Hop::Format => catalog
                .definitions
                .iter()
                .filter(|(_, def)| def.format == reference)
                .map(|(name, _)| name.clone())
                .collect(),
            Hop::Definition => catalog
                .entities
                .iter()
                .filter(|(_, entity)| entity.has_field(reference))
                .map(|(label, _)| label.clone())
                .collect(),
            // An entity matches itself as well as its containers.
            Hop::Entity => catalog
                .entities
                .iter()
                .filter(|(label, entity)| label.as_str() == reference || entity.has_field(reference))
                .map(|(label, _)| label.clone())
                .collect(),
        }
    }
}

/// Compute the items affected by changing `query`
pub fn resolve(catalog: &Catalog, query: &AffectedQuery) -> AffectedItems {
    let hop = Hop::start(query.kind);
    let mut result = AffectedItems::default();

    let matched = hop.scan(catalog, &query.name);
    debug!(kind = %query.kind, name = %query.name, matches = matched.len(), "scanned {}", hop.target().collection());

    if hop == Hop::Format {
        let second = hop.next();
        let mut entities = BTreeSet::new();
        for definition in &matched {
            entities.extend(second.scan(catalog, definition));
        }
        result.record(second.target(), entities);
    }

    result.record(hop.target(), matched);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;

    fn sample_catalog() -> Catalog {
        Catalog::new()
            .with_format("Email", "^.+@.+$")
            .with_format("Digits", "^[0-9]+$")
            .with_format("Unused", "^x$")
            .with_definition("email", "Email")
            .with_definition("backupEmail", "Email")
            .with_definition("id", "Digits")
            .with_entity("user", vec![Field::definition("id"), Field::definition("email")])
            .with_entity("contact", vec![Field::definition("backupEmail")])
            .with_entity("order", vec![Field::definition("id"), Field::entity("user")])
    }

    #[test]
    fn test_format_reaches_definitions_and_entities() {
        let catalog = sample_catalog();
        let result = resolve(&catalog, &AffectedQuery::new(ItemKind::Format, "Email"));
        assert_eq!(result.definitions, Some(vec!["backupEmail".to_string(), "email".to_string()]));
        assert_eq!(result.entities, Some(vec!["contact".to_string(), "user".to_string()]));
    }

    #[test]
    fn test_format_second_wave_is_deduplicated() {
        let catalog = sample_catalog().with_definition("userId", "Digits")
            .with_entity("user", vec![Field::definition("id"), Field::definition("userId")]);
        let result = resolve(&catalog, &AffectedQuery::new(ItemKind::Format, "Digits"));
        assert_eq!(result.entities, Some(vec!["order".to_string(), "user".to_string()]));
    }

    #[test]
    fn test_unreferenced_format_is_empty() {
        let result = resolve(&sample_catalog(), &AffectedQuery::new(ItemKind::Format, "Unused"));
        assert!(result.is_empty());
        assert_eq!(serde_json::to_value(&result).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_definition_reaches_entities_only() {
        let result = resolve(&sample_catalog(), &AffectedQuery::new(ItemKind::Definition, "id"));
        assert_eq!(result.definitions, None);
        assert_eq!(result.entities, Some(vec!["order".to_string(), "user".to_string()]));
    }

    #[test]
    fn test_entity_matches_itself_and_containers() {
        let result = resolve(&sample_catalog(), &AffectedQuery::new(ItemKind::Entity, "user"));
        assert_eq!(result.entities, Some(vec!["order".to_string(), "user".to_string()]));
    }

    #[test]
    fn test_cyclic_entities_terminate() {
        let catalog = Catalog::new()
            .with_entity("a", vec![Field::entity("b")])
            .with_entity("b", vec![Field::entity("a")]);
        let result = resolve(&catalog, &AffectedQuery::new(ItemKind::Entity, "a"));
        assert_eq!(result.entities, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_unrelated_items_do_not_change_result() {
        let query = AffectedQuery::new(ItemKind::Format, "Email");
        let before = resolve(&sample_catalog(), &query);
        let noisy = sample_catalog()
            .with_format("Other", "^o$")
            .with_definition("other", "Other")
            .with_entity("misc", vec![Field::definition("other")]);
        assert_eq!(resolve(&noisy, &query), before);
    }

    #[test]
    fn test_query_requires_exactly_one_param() {
        let query = AffectedQuery::from_params([("definition", "id")]).unwrap();
        assert_eq!(query, AffectedQuery::new(ItemKind::Definition, "id"));

        assert!(AffectedQuery::from_params(Vec::<(&str, &str)>::new()).is_err());
        assert!(AffectedQuery::from_params([("format", "a"), ("entity", "b")]).is_err());
        assert!(AffectedQuery::from_params([("color", "red")]).is_err());
    }
}
