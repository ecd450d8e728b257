//! Schema Inference
//!
//! Derives a provisional entity/definition graph from external API
//! descriptions. Two independent pipelines share one output shape:
//!
//! - [`postman`]: request/response bodies of a Postman collection
//! - [`swagger`]: non-body operation parameters of a Swagger v2 document
//!
//! Neither pipeline touches the store. The output is a candidate for user
//! curation before it is imported.

pub mod postman;
pub mod swagger;

pub use postman::{infer_postman, merge_fields};
pub use swagger::infer_swagger;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{Definition, Entity, Field, FieldKind};

/// Format assigned to every inferred definition pending curation
pub const PLACEHOLDER_FORMAT: &str = "Text";

pub fn placeholder_definition() -> Definition {
    Definition::new(PLACEHOLDER_FORMAT, "")
}

/// Field of an inferred entity. Entity-typed fields may carry the shape
/// inferred for them inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredField {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<InferredField>,
}

impl InferredField {
    pub fn definition(label: impl Into<String>) -> Self {
        Self { label: label.into(), kind: FieldKind::Definition, fields: Vec::new() }
    }

    pub fn entity(label: impl Into<String>, fields: Vec<InferredField>) -> Self {
        Self { label: label.into(), kind: FieldKind::Entity, fields }
    }

    pub fn is_entity(&self) -> bool {
        self.kind == FieldKind::Entity
    }

    fn to_field(&self) -> Field {
        Field { label: self.label.clone(), kind: self.kind }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredEntity {
    #[serde(default)]
    pub fields: Vec<InferredField>,
}

/// Output of both inference pipelines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredSchema {
    #[serde(default)]
    pub entities: BTreeMap<String, InferredEntity>,
    #[serde(default)]
    pub definitions: BTreeMap<String, Definition>,
}

impl InferredSchema {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.definitions.is_empty()
    }

    /// Entities ready to be stored.
    ///
    /// Inline nested shapes become entities of their own, keyed by field
    /// label. A label already present at the top level, or seen earlier in
    /// the walk, keeps its first shape.
    pub fn flatten_entities(&self) -> BTreeMap<String, Entity> {
        let mut out = BTreeMap::new();
        for (label, entity) in &self.entities {
            out.insert(label.clone(), Entity::new(entity.fields.iter().map(InferredField::to_field).collect()));
        }
        for entity in self.entities.values() {
            flatten_nested(&entity.fields, &mut out);
        }
        out
    }
}

fn flatten_nested(fields: &[InferredField], out: &mut BTreeMap<String, Entity>) {
    for field in fields.iter().filter(|f| f.is_entity() && !f.fields.is_empty()) {
        if !out.contains_key(&field.label) {
            let entity = Entity::new(field.fields.iter().map(InferredField::to_field).collect());
            out.insert(field.label.clone(), entity);
            flatten_nested(&field.fields, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_promotes_nested_shapes() {
        let mut schema = InferredSchema::default();
        schema.entities.insert(
            "order".to_string(),
            InferredEntity {
                fields: vec![
                    InferredField::definition("id"),
                    InferredField::entity("customer", vec![
                        InferredField::definition("name"),
                        InferredField::entity("address", vec![InferredField::definition("city")]),
                    ]),
                ],
            },
        );

        let flat = schema.flatten_entities();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat["order"].fields, vec![Field::definition("id"), Field::entity("customer")]);
        assert_eq!(flat["customer"].fields, vec![Field::definition("name"), Field::entity("address")]);
        assert_eq!(flat["address"].fields, vec![Field::definition("city")]);
    }

    #[test]
    fn test_flatten_keeps_top_level_shape() {
        let mut schema = InferredSchema::default();
        schema.entities.insert("user".to_string(), InferredEntity { fields: vec![InferredField::definition("id")] });
        schema.entities.insert(
            "team".to_string(),
            InferredEntity { fields: vec![InferredField::entity("user", vec![InferredField::definition("other")])] },
        );
        let flat = schema.flatten_entities();
        assert_eq!(flat["user"].fields, vec![Field::definition("id")]);
    }
}
