//! Catalog Problems
//!
//! The catalog tolerates dangling references and cyclic entities; this pass
//! surfaces them instead of rejecting edits.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::catalog::{Catalog, FieldKind, ItemKind};

// =============================================================================
// Problem Codes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemCode {
    /// Definition names a format that does not exist
    MissingFormat,
    /// Entity field names a definition that does not exist
    MissingDefinition,
    /// Entity field names an entity that does not exist
    MissingEntity,
    /// Format pattern is not anchored or does not compile
    InvalidPattern,
    /// Entity has a field naming itself
    SelfContainment,
    /// Entities contain each other through a chain of fields
    ContainmentCycle,
}

impl ProblemCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingFormat => "E001",
            Self::MissingDefinition => "E002",
            Self::MissingEntity => "E003",
            Self::InvalidPattern => "E004",
            Self::SelfContainment => "W001",
            Self::ContainmentCycle => "W002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingFormat
            | Self::MissingDefinition
            | Self::MissingEntity
            | Self::InvalidPattern => Severity::Error,

            Self::SelfContainment | Self::ContainmentCycle => Severity::Warning,
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One catalog problem, attached to the item that holds the bad reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub code: ProblemCode,
    pub severity: Severity,
    pub kind: ItemKind,
    pub name: String,
    pub message: String,
}

impl Problem {
    fn new(code: ProblemCode, kind: ItemKind, name: &str, message: String) -> Self {
        Self {
            code,
            severity: code.severity(),
            kind,
            name: name.to_string(),
            message,
        }
    }
}

/// Run every check over the catalog snapshot
pub fn find_problems(catalog: &Catalog) -> Vec<Problem> {
    let mut problems = Vec::new();

    for (name, format) in &catalog.formats {
        if let Err(e) = format.validate(name) {
            problems.push(Problem::new(ProblemCode::InvalidPattern, ItemKind::Format, name, e.to_string()));
        }
    }

    for (name, definition) in &catalog.definitions {
        if !catalog.formats.contains_key(&definition.format) {
            problems.push(Problem::new(
                ProblemCode::MissingFormat,
                ItemKind::Definition,
                name,
                format!("format '{}' does not exist", definition.format),
            ));
        }
    }

    for (label, entity) in &catalog.entities {
        for field in &entity.fields {
            let (exists, code) = match field.kind {
                FieldKind::Definition => (catalog.definitions.contains_key(&field.label), ProblemCode::MissingDefinition),
                FieldKind::Entity => (catalog.entities.contains_key(&field.label), ProblemCode::MissingEntity),
            };
            if !exists {
                let target = if field.kind == FieldKind::Definition { "definition" } else { "entity" };
                problems.push(Problem::new(
                    code,
                    ItemKind::Entity,
                    label,
                    format!("field '{}' references missing {}", field.label, target),
                ));
            }
            if field.kind == FieldKind::Entity && &field.label == label {
                problems.push(Problem::new(
                    ProblemCode::SelfContainment,
                    ItemKind::Entity,
                    label,
                    "entity contains itself".to_string(),
                ));
            }
        }
    }

    for cycle in containment_cycles(catalog) {
        let first = cycle[0].clone();
        problems.push(Problem::new(
            ProblemCode::ContainmentCycle,
            ItemKind::Entity,
            &first,
            format!("entities contain each other: {}", cycle.join(" -> ")),
        ));
    }

    problems
}

/// Groups of entities that contain each other, each sorted by label
pub fn containment_cycles(catalog: &Catalog) -> Vec<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(catalog.entities.len(), catalog.entities.len() * 2);
    let mut indices: HashMap<&str, NodeIndex> = HashMap::with_capacity(catalog.entities.len());

    for label in catalog.entities.keys() {
        indices.insert(label.as_str(), graph.add_node(label.as_str()));
    }

    for (label, entity) in &catalog.entities {
        for field in entity.fields.iter().filter(|f| f.kind == FieldKind::Entity) {
            if let (Some(&from), Some(&to)) = (indices.get(label.as_str()), indices.get(field.label.as_str())) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<String> = scc
                .into_iter()
                .filter_map(|idx| graph.node_weight(idx).map(|s| s.to_string()))
                .collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;

    fn codes(problems: &[Problem]) -> Vec<ProblemCode> {
        problems.iter().map(|p| p.code).collect()
    }

    #[test]
    fn test_clean_catalog_has_no_problems() {
        let catalog = Catalog::new()
            .with_format("Digits", "^[0-9]+$")
            .with_definition("id", "Digits")
            .with_entity("user", vec![Field::definition("id")]);
        assert!(find_problems(&catalog).is_empty());
    }

    #[test]
    fn test_dangling_references() {
        let catalog = Catalog::new()
            .with_definition("id", "Digits")
            .with_entity("user", vec![Field::definition("email"), Field::entity("team")]);
        let problems = find_problems(&catalog);
        assert_eq!(
            codes(&problems),
            vec![ProblemCode::MissingFormat, ProblemCode::MissingDefinition, ProblemCode::MissingEntity]
        );
        assert!(problems.iter().all(|p| p.severity == Severity::Error));
    }

    #[test]
    fn test_invalid_pattern() {
        let catalog = Catalog::new().with_format("Loose", "[a-z]+");
        assert_eq!(codes(&find_problems(&catalog)), vec![ProblemCode::InvalidPattern]);
    }

    #[test]
    fn test_cycles_and_self_containment() {
        let catalog = Catalog::new()
            .with_entity("a", vec![Field::entity("b")])
            .with_entity("b", vec![Field::entity("c")])
            .with_entity("c", vec![Field::entity("a")])
            .with_entity("tree", vec![Field::entity("tree")]);

        assert_eq!(containment_cycles(&catalog), vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
        let found = codes(&find_problems(&catalog));
        assert!(found.contains(&ProblemCode::SelfContainment));
        assert!(found.contains(&ProblemCode::ContainmentCycle));
    }
}
