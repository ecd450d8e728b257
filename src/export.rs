//! Entity Export
//!
//! Renders one entity and everything it contains as a flat table, a nested
//! JSON excerpt with definitions resolved to their formats, or a sample
//! object. Each entity is expanded once per export; later occurrences, on a
//! cycle or through a shared branch, are emitted as a `$ref` marker. Output
//! size is linear in the catalog even for cyclic or diamond-shaped graphs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::str::FromStr;

use crate::catalog::{Catalog, Entity, FieldKind, ItemKind};
use crate::error::{CatalogError, Result};

/// Output shape of an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Table,
    Json,
    Sample,
}

impl FromStr for ExportFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "sample" => Ok(Self::Sample),
            other => Err(CatalogError::InvalidQuery(format!(
                "unknown export format '{}', expected table, json or sample",
                other
            ))),
        }
    }
}

/// One row of a table export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Dotted path from the exported entity, e.g. `address.city`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub description: String,
}

/// Export `label` in the requested shape
pub fn export(catalog: &Catalog, label: &str, format: ExportFormat) -> Result<Value> {
    match format {
        ExportFormat::Table => Ok(serde_json::to_value(table(catalog, label)?)?),
        ExportFormat::Json => json_excerpt(catalog, label),
        ExportFormat::Sample => sample(catalog, label),
    }
}

pub fn table(catalog: &Catalog, label: &str) -> Result<Vec<TableRow>> {
    let entity = lookup(catalog, label)?;
    let mut rows = Vec::new();
    let mut expanded = HashSet::from([label.to_string()]);
    table_rows(catalog, entity, "", &mut expanded, &mut rows);
    Ok(rows)
}

fn table_rows(
    catalog: &Catalog,
    entity: &Entity,
    prefix: &str,
    expanded: &mut HashSet<String>,
    rows: &mut Vec<TableRow>,
) {
    for field in &entity.fields {
        let path = if prefix.is_empty() {
            field.label.clone()
        } else {
            format!("{}.{}", prefix, field.label)
        };

        match field.kind {
            FieldKind::Definition => {
                let definition = catalog.definitions.get(&field.label);
                let format = definition.map(|d| d.format.clone());
                let pattern = definition
                    .and_then(|d| catalog.formats.get(&d.format))
                    .map(|f| f.pattern.clone());
                rows.push(TableRow {
                    path,
                    kind: FieldKind::Definition,
                    format,
                    pattern,
                    description: definition.map(|d| d.description.clone()).unwrap_or_default(),
                });
            }
            FieldKind::Entity => {
                let first = expanded.insert(field.label.clone());
                rows.push(TableRow {
                    path: path.clone(),
                    kind: FieldKind::Entity,
                    format: None,
                    pattern: None,
                    description: if first { String::new() } else { format!("$ref {}", field.label) },
                });
                if !first {
                    continue;
                }
                if let Some(nested) = catalog.entities.get(&field.label) {
                    table_rows(catalog, nested, &path, expanded, rows);
                }
            }
        }
    }
}

pub fn json_excerpt(catalog: &Catalog, label: &str) -> Result<Value> {
    let entity = lookup(catalog, label)?;
    let mut expanded = HashSet::from([label.to_string()]);
    Ok(json!({
        "entity": label,
        "fields": excerpt_fields(catalog, entity, &mut expanded),
    }))
}

fn excerpt_fields(catalog: &Catalog, entity: &Entity, expanded: &mut HashSet<String>) -> Value {
    let mut out = Map::new();
    for field in &entity.fields {
        let value = match field.kind {
            FieldKind::Definition => match catalog.definitions.get(&field.label) {
                Some(definition) => json!({
                    "type": "definition",
                    "format": definition.format,
                    "pattern": catalog.formats.get(&definition.format).map(|f| f.pattern.clone()),
                    "description": definition.description,
                }),
                None => json!({ "type": "definition", "missing": true }),
            },
            FieldKind::Entity => {
                if !expanded.insert(field.label.clone()) {
                    json!({ "type": "entity", "$ref": field.label })
                } else {
                    match catalog.entities.get(&field.label) {
                        Some(nested) => {
                            let fields = excerpt_fields(catalog, nested, expanded);
                            json!({ "type": "entity", "fields": fields })
                        }
                        None => json!({ "type": "entity", "missing": true }),
                    }
                }
            }
        };
        out.insert(field.label.clone(), value);
    }
    Value::Object(out)
}

/// Sample object with `"<format>"` placeholders for definition leaves
pub fn sample(catalog: &Catalog, label: &str) -> Result<Value> {
    let entity = lookup(catalog, label)?;
    let mut expanded = HashSet::from([label.to_string()]);
    Ok(sample_object(catalog, entity, &mut expanded))
}

fn sample_object(catalog: &Catalog, entity: &Entity, expanded: &mut HashSet<String>) -> Value {
    let mut out = Map::new();
    for field in &entity.fields {
        let value = match field.kind {
            FieldKind::Definition => match catalog.definitions.get(&field.label) {
                Some(definition) => Value::String(format!("<{}>", definition.format)),
                None => Value::Null,
            },
            FieldKind::Entity => {
                if !expanded.insert(field.label.clone()) {
                    json!({ "$ref": field.label })
                } else {
                    match catalog.entities.get(&field.label) {
                        Some(nested) => sample_object(catalog, nested, expanded),
                        None => Value::Null,
                    }
                }
            }
        };
        out.insert(field.label.clone(), value);
    }
    Value::Object(out)
}

fn lookup<'a>(catalog: &'a Catalog, label: &str) -> Result<&'a Entity> {
    catalog
        .entities
        .get(label)
        .ok_or_else(|| CatalogError::not_found(ItemKind::Entity, label))
}
