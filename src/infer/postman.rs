//! Postman collection inference
//!
//! Every `body.raw` string anywhere in the collection is parsed as JSON.
//! Top-level keys of each body become entities (object or array-of-object
//! values) or definitions (everything else). Entities seen in several bodies
//! are unified field by field.
//!
//! Scalar fields share one flat namespace: an `id` nested in two different
//! entities yields a single `id` definition. Definitions are not namespaced
//! per parent entity.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{placeholder_definition, InferredEntity, InferredField, InferredSchema};
use crate::catalog::Definition;

/// Infer entities and definitions from a Postman collection.
///
/// Returns `None` when the collection contains no parseable body at all.
pub fn infer_postman(collection: &Value) -> Option<InferredSchema> {
    let mut bodies = Vec::new();
    extract_bodies(collection, None, &mut bodies);

    if bodies.is_empty() {
        debug!("no request bodies found in collection");
        return None;
    }

    let mut entities: BTreeMap<String, InferredEntity> = BTreeMap::new();
    let mut definitions: BTreeMap<String, Definition> = BTreeMap::new();

    for body in &bodies {
        let Value::Object(map) = body else {
            continue;
        };

        for (key, value) in map {
            if is_numeric_key(key) {
                continue;
            }

            if is_complex(value) {
                let fields = generate_fields(value);
                match entities.remove(key) {
                    Some(existing) => {
                        let merged = merge_fields(existing.fields, fields);
                        entities.insert(key.clone(), InferredEntity { fields: merged });
                    }
                    None => {
                        entities.insert(key.clone(), InferredEntity { fields });
                    }
                }
            } else {
                definitions.entry(key.clone()).or_insert_with(placeholder_definition);
            }
        }
    }

    for entity in entities.values() {
        collect_definitions(&entity.fields, &mut definitions);
    }

    debug!(
        bodies = bodies.len(),
        entities = entities.len(),
        definitions = definitions.len(),
        "inferred schema from postman collection"
    );

    Some(InferredSchema { entities, definitions })
}

/// Collect every JSON value found under a `body` object's `raw` key
fn extract_bodies(value: &Value, parent_key: Option<&str>, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "raw" && parent_key == Some("body") {
                    if let Value::String(raw) = child {
                        match serde_json::from_str::<Value>(raw) {
                            Ok(parsed) => out.push(parsed),
                            Err(e) => warn!(error = %e, "skipping malformed body.raw"),
                        }
                        continue;
                    }
                }
                extract_bodies(child, Some(key), out);
            }
        }
        Value::Array(items) => {
            for item in items {
                extract_bodies(item, None, out);
            }
        }
        _ => {}
    }
}

/// Keys made only of digits come from array-like objects and are noise
fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Objects and arrays holding at least one object have a shape to infer
fn is_complex(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

/// Infer the field list of an object or array of objects.
///
/// Array elements are shallow-merged into one object first; later elements
/// override earlier keys and nested objects are not deep-merged.
pub fn generate_fields(value: &Value) -> Vec<InferredField> {
    match value {
        Value::Array(items) => {
            let mut merged = Map::new();
            for item in items {
                if let Value::Object(obj) = item {
                    for (k, v) in obj {
                        merged.insert(k.clone(), v.clone());
                    }
                }
            }
            if merged.is_empty() {
                return Vec::new();
            }
            object_fields(&merged)
        }
        Value::Object(obj) => object_fields(obj),
        _ => Vec::new(),
    }
}

fn object_fields(obj: &Map<String, Value>) -> Vec<InferredField> {
    obj.iter()
        .map(|(key, value)| {
            if is_complex(value) {
                InferredField::entity(key.clone(), generate_fields(value))
            } else {
                InferredField::definition(key.clone())
            }
        })
        .collect()
}

/// Union two field lists by label.
///
/// When both sides say `entity` their nested fields are merged recursively.
/// Otherwise the first-seen field wins, even if the other side classified the
/// label differently. Labels present on one side only are carried through.
pub fn merge_fields(existing: Vec<InferredField>, incoming: Vec<InferredField>) -> Vec<InferredField> {
    let mut merged = existing;

    for field in incoming {
        match merged.iter().position(|f| f.label == field.label) {
            Some(pos) => {
                let current = &mut merged[pos];
                if current.is_entity() && field.is_entity() {
                    let nested = std::mem::take(&mut current.fields);
                    current.fields = merge_fields(nested, field.fields);
                }
            }
            None => merged.push(field),
        }
    }

    merged
}

fn collect_definitions(fields: &[InferredField], definitions: &mut BTreeMap<String, Definition>) {
    for field in fields {
        if field.is_entity() {
            collect_definitions(&field.fields, definitions);
        } else {
            definitions.entry(field.label.clone()).or_insert_with(placeholder_definition);
        }
    }
}
