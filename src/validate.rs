//! Document validation against the catalog
//!
//! Keys of an arbitrary JSON document are checked against definitions, and
//! scalar values against the regex of the definition's format. Objects and
//! arrays are walked recursively; the walk follows the document, so it ends
//! with the document regardless of cycles in the entity graph.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::catalog::Catalog;

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location in the document, e.g. `user.emails[1]`
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Validate `document` against the catalog snapshot
pub fn validate(document: &Value, catalog: &Catalog) -> ValidationReport {
    let mut validator = Validator {
        catalog,
        compiled: HashMap::new(),
        issues: Vec::new(),
    };

    match document {
        Value::Object(_) | Value::Array(_) => validator.walk(None, "", document),
        _ => validator.issue("", "document must be a JSON object or array"),
    }

    ValidationReport {
        valid: validator.issues.is_empty(),
        issues: validator.issues,
    }
}

struct Validator<'a> {
    catalog: &'a Catalog,
    /// Compiled pattern per format name; `None` when the pattern is invalid
    compiled: HashMap<String, Option<Regex>>,
    issues: Vec<ValidationIssue>,
}

impl<'a> Validator<'a> {
    /// `key` is the nearest object key above `value`, used for array elements
    fn walk(&mut self, key: Option<&str>, path: &str, value: &Value) {
        match value {
            Value::Object(map) => {
                for (child_key, child) in map {
                    let child_path = if path.is_empty() {
                        child_key.clone()
                    } else {
                        format!("{}.{}", path, child_key)
                    };
                    self.walk(Some(child_key), &child_path, child);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(key, &format!("{}[{}]", path, i), item);
                }
            }
            scalar => match key {
                Some(key) => self.check_scalar(key, path, scalar),
                None => self.issue(path, "value has no key to validate against"),
            },
        }
    }

    fn check_scalar(&mut self, key: &str, path: &str, value: &Value) {
        let Some(definition) = self.catalog.definitions.get(key) else {
            self.issue(path, format!("unknown definition '{}'", key));
            return;
        };

        let format_name = definition.format.clone();
        let Some(regex) = self.regex_for(&format_name, path) else {
            return;
        };

        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !regex.is_match(&text) {
            self.issue(path, format!("value {} does not match format '{}'", value, format_name));
        }
    }

    /// Compile a format's pattern once. Records an issue at `path`, the first
    /// value that needed it, when the format is missing or does not compile.
    fn regex_for(&mut self, format_name: &str, path: &str) -> Option<Regex> {
        if let Some(cached) = self.compiled.get(format_name) {
            return cached.clone();
        }

        let compiled = match self.catalog.formats.get(format_name) {
            Some(format) => match format.compile(format_name) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    self.issue(path, e.to_string());
                    None
                }
            },
            None => {
                self.issue(path, format!("format '{}' does not exist", format_name));
                None
            }
        };
        self.compiled.insert(format_name.to_string(), compiled.clone());
        compiled
    }

    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }
}
