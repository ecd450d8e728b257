//! Swagger v2 inference
//!
//! Only non-body operation parameters (header, query, path, form) are
//! considered; `in: body` parameters are skipped. Parameters whose schema is
//! an object, directly or through a `$ref` into `definitions`, become
//! entities named after the parameter, not after the referenced schema.
//! Everything else becomes a definition.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{InferredEntity, InferredField, InferredSchema, PLACEHOLDER_FORMAT};
use crate::catalog::Definition;

/// `$ref` targets naming a document section rather than a schema
const CONTAINER_KEYWORDS: [&str; 5] = ["definitions", "paths", "components", "parameters", "responses"];

/// Infer entities and definitions from a Swagger v2 document.
///
/// A document without `paths` yields an empty schema.
pub fn infer_swagger(document: &Value) -> InferredSchema {
    let mut inference = SwaggerInference {
        definitions: document.get("definitions").and_then(Value::as_object),
        schema: InferredSchema::default(),
    };

    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        debug!("swagger document has no paths");
        return inference.schema;
    };

    for (path, item) in paths {
        let Some(operations) = item.as_object() else {
            continue;
        };
        for (method, operation) in operations {
            let Some(parameters) = operation.get("parameters").and_then(Value::as_array) else {
                continue;
            };
            for parameter in parameters {
                inference.process_parameter(path, method, parameter);
            }
        }
    }

    debug!(
        entities = inference.schema.entities.len(),
        definitions = inference.schema.definitions.len(),
        "inferred schema from swagger document"
    );

    inference.schema
}

struct SwaggerInference<'a> {
    definitions: Option<&'a Map<String, Value>>,
    schema: InferredSchema,
}

impl<'a> SwaggerInference<'a> {
    fn process_parameter(&mut self, path: &str, method: &str, parameter: &Value) {
        if parameter.get("in").and_then(Value::as_str) == Some("body") {
            return;
        }
        let Some(name) = parameter.get("name").and_then(Value::as_str) else {
            debug!(path, method, "skipping parameter without a name");
            return;
        };

        let synthetic;
        let schema = match parameter.get("schema") {
            Some(schema) => schema,
            None => {
                synthetic = json!({ "type": parameter.get("type").cloned().unwrap_or(Value::Null) });
                &synthetic
            }
        };

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let target = ref_name(reference);
            if CONTAINER_KEYWORDS.contains(&target) {
                self.register_definition(name, schema);
                return;
            }
            match self.resolve(target) {
                Some(resolved) if has_properties(resolved) => self.process_entity(name, resolved),
                Some(resolved) => self.register_definition(name, resolved),
                None => self.register_definition(name, schema),
            }
        } else if has_properties(schema) {
            self.process_entity(name, schema);
        } else {
            self.register_definition(name, schema);
        }
    }

    /// Register `name` as an entity built from `schema`'s properties.
    ///
    /// The first registration of a name wins, which also stops recursion
    /// through self-referential schemas.
    fn process_entity(&mut self, name: &str, schema: &Value) {
        if self.schema.entities.contains_key(name) {
            return;
        }
        self.schema.entities.insert(name.to_string(), InferredEntity::default());

        let mut fields = Vec::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (property, property_schema) in properties {
                let nested = match property_schema.get("$ref").and_then(Value::as_str) {
                    Some(reference) => {
                        let target = ref_name(reference);
                        if CONTAINER_KEYWORDS.contains(&target) {
                            None
                        } else {
                            self.resolve(target).filter(|resolved| has_properties(resolved))
                        }
                    }
                    None => Some(property_schema).filter(|s| has_properties(s)),
                };

                match nested {
                    Some(nested_schema) => {
                        fields.push(InferredField::entity(property.clone(), Vec::new()));
                        self.process_entity(property, nested_schema);
                    }
                    None => {
                        fields.push(InferredField::definition(property.clone()));
                        let described = property_schema
                            .get("$ref")
                            .and_then(Value::as_str)
                            .and_then(|r| self.resolve(ref_name(r)))
                            .unwrap_or(property_schema);
                        self.register_definition(property, described);
                    }
                }
            }
        }

        if let Some(entity) = self.schema.entities.get_mut(name) {
            entity.fields = fields;
        }
    }

    fn register_definition(&mut self, name: &str, schema: &Value) {
        let format = schema
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(PLACEHOLDER_FORMAT);
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.schema
            .definitions
            .entry(name.to_string())
            .or_insert_with(|| Definition::new(format, description));
    }

    fn resolve(&self, target: &str) -> Option<&'a Value> {
        self.definitions?.get(target)
    }
}

/// Last path segment of a `$ref`, e.g. `Pet` for `#/definitions/Pet`
fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// An object schema with a `properties` map
fn has_properties(schema: &Value) -> bool {
    let is_object = match schema.get("type") {
        None => true,
        Some(ty) => ty.as_str() == Some("object"),
    };
    is_object && schema.get("properties").map_or(false, Value::is_object)
}
