//! File-backed Schema Store
//!
//! Each collection lives in its own JSON file keyed by item name:
//!
//! ```text
//! <root>/
//! ├── formats.json       { "Email": { "pattern": "^.+@.+$", "description": "" } }
//! ├── definitions.json   { "email": { "format": "Email", "description": "" } }
//! ├── entities.json      { "user":  { "fields": [{ "label": "email", "type": "definition" }] } }
//! └── changes.json       [ { "type": "format", "name": "Email", ... } ]
//! ```
//!
//! A missing file reads as an empty collection. Every mutation appends a
//! change record; the change log is never rewritten in place.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, ChangeRecord, Definition, Entity, Format, ItemKind};
use crate::error::{CatalogError, Result};
use crate::infer::InferredSchema;

const CHANGES_FILE: &str = "changes.json";

/// The catalog repository
pub struct FileStore {
    /// Directory holding the collection files
    root: PathBuf,
    /// Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `path`, creating the directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file store");

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn get_formats(&self) -> Result<BTreeMap<String, Format>> {
        self.read_collection(ItemKind::Format)
    }

    pub fn get_definitions(&self) -> Result<BTreeMap<String, Definition>> {
        self.read_collection(ItemKind::Definition)
    }

    pub fn get_entities(&self) -> Result<BTreeMap<String, Entity>> {
        self.read_collection(ItemKind::Entity)
    }

    /// Read all three collections once
    pub fn snapshot(&self) -> Result<Catalog> {
        Ok(Catalog {
            formats: self.get_formats()?,
            definitions: self.get_definitions()?,
            entities: self.get_entities()?,
        })
    }

    /// The full change log, oldest first
    pub fn changes(&self) -> Result<Vec<ChangeRecord>> {
        let path = self.root.join(CHANGES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    // ========== Formats ==========

    pub fn add_format(&self, name: &str, format: Format) -> Result<()> {
        format.validate(name)?;
        self.insert(ItemKind::Format, name, format)
    }

    pub fn update_format(&self, name: &str, format: Format) -> Result<()> {
        format.validate(name)?;
        self.replace(ItemKind::Format, name, format)
    }

    pub fn delete_format(&self, name: &str) -> Result<()> {
        self.remove::<Format>(ItemKind::Format, name)
    }

    // ========== Definitions ==========

    pub fn add_definition(&self, name: &str, definition: Definition) -> Result<()> {
        self.insert(ItemKind::Definition, name, definition)
    }

    pub fn update_definition(&self, name: &str, definition: Definition) -> Result<()> {
        self.replace(ItemKind::Definition, name, definition)
    }

    pub fn delete_definition(&self, name: &str) -> Result<()> {
        self.remove::<Definition>(ItemKind::Definition, name)
    }

    // ========== Entities ==========

    pub fn add_entity(&self, label: &str, entity: Entity) -> Result<()> {
        self.insert(ItemKind::Entity, label, entity)
    }

    pub fn update_entity(&self, label: &str, entity: Entity) -> Result<()> {
        self.replace(ItemKind::Entity, label, entity)
    }

    pub fn delete_entity(&self, label: &str) -> Result<()> {
        self.remove::<Entity>(ItemKind::Entity, label)
    }

    // ========== Import ==========

    /// Persist a curated inference result item by item.
    ///
    /// Definitions are added before entities. Items that already exist are
    /// reported as errors and left untouched; other items still import.
    pub fn import(&self, schema: &InferredSchema) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for (name, definition) in &schema.definitions {
            let outcome = self.add_definition(name, definition.clone());
            report.definitions.insert(name.clone(), ImportStatus::from_result(outcome)?);
        }

        for (label, entity) in schema.flatten_entities() {
            let outcome = self.add_entity(&label, entity);
            report.entities.insert(label, ImportStatus::from_result(outcome)?);
        }

        info!(
            imported = report.imported_count(),
            failed = report.error_count(),
            "import applied"
        );
        Ok(report)
    }

    // ========== Internals ==========

    fn collection_path(&self, kind: ItemKind) -> PathBuf {
        self.root.join(format!("{}.json", kind.collection()))
    }

    fn read_collection<T: DeserializeOwned>(&self, kind: ItemKind) -> Result<BTreeMap<String, T>> {
        let path = self.collection_path(kind);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_collection<T: Serialize>(&self, kind: ItemKind, items: &BTreeMap<String, T>) -> Result<()> {
        write_atomic(&self.collection_path(kind), &serde_json::to_string_pretty(items)?)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert<T>(&self, kind: ItemKind, name: &str, item: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        if name.trim().is_empty() {
            return Err(CatalogError::InvalidInput(format!("{} name must not be empty", kind)));
        }

        let _guard = self.lock();
        let mut items: BTreeMap<String, T> = self.read_collection(kind)?;
        if items.contains_key(name) {
            return Err(CatalogError::already_exists(kind, name));
        }

        let after = serde_json::to_value(&item)?;
        items.insert(name.to_string(), item);
        self.commit(kind, &items, ChangeRecord::new(kind, name, None, Some(after)))?;

        info!(%kind, name, "added");
        Ok(())
    }

    fn replace<T>(&self, kind: ItemKind, name: &str, item: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock();
        let mut items: BTreeMap<String, T> = self.read_collection(kind)?;
        let Some(previous) = items.get(name) else {
            return Err(CatalogError::not_found(kind, name));
        };

        let before = serde_json::to_value(previous)?;
        let after = serde_json::to_value(&item)?;
        items.insert(name.to_string(), item);
        self.commit(kind, &items, ChangeRecord::new(kind, name, Some(before), Some(after)))?;

        info!(%kind, name, "updated");
        Ok(())
    }

    fn remove<T>(&self, kind: ItemKind, name: &str) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock();
        let mut items: BTreeMap<String, T> = self.read_collection(kind)?;
        let Some(previous) = items.remove(name) else {
            return Err(CatalogError::not_found(kind, name));
        };

        let before = serde_json::to_value(&previous)?;
        self.commit(kind, &items, ChangeRecord::new(kind, name, Some(before), None))?;

        info!(%kind, name, "deleted");
        Ok(())
    }

    /// Write the collection and log the change. When the log cannot be
    /// written the previous collection file is restored.
    fn commit<T: Serialize>(&self, kind: ItemKind, items: &BTreeMap<String, T>, record: ChangeRecord) -> Result<()> {
        let path = self.collection_path(kind);
        let previous = if path.exists() { Some(fs::read(&path)?) } else { None };

        self.write_collection(kind, items)?;
        if let Err(e) = self.append_change(record) {
            warn!(%kind, error = %e, "change log write failed, restoring collection");
            match previous {
                Some(content) => write_atomic(&path, content)?,
                None => fs::remove_file(&path)?,
            }
            return Err(e);
        }
        Ok(())
    }

    fn append_change(&self, record: ChangeRecord) -> Result<()> {
        let mut log = self.changes()?;
        log.push(record);
        write_atomic(&self.root.join(CHANGES_FILE), &serde_json::to_string_pretty(&log)?)
    }
}

/// Write through a sibling temp file so readers never see a partial file
fn write_atomic(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Outcome of importing one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatus {
    pub status: ImportOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    Imported,
    Error,
}

impl ImportStatus {
    /// Per-item failures become statuses; storage failures abort the import
    fn from_result(result: Result<()>) -> Result<Self> {
        match result {
            Ok(()) => Ok(Self { status: ImportOutcome::Imported, error: None }),
            Err(e @ (CatalogError::AlreadyExists { .. }
            | CatalogError::InvalidInput(_)
            | CatalogError::InvalidPattern { .. })) => Ok(Self {
                status: ImportOutcome::Error,
                error: Some(e.to_string()),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Per-item import results keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub definitions: BTreeMap<String, ImportStatus>,
    pub entities: BTreeMap<String, ImportStatus>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.statuses().filter(|s| s.status == ImportOutcome::Imported).count()
    }

    pub fn error_count(&self) -> usize {
        self.statuses().filter(|s| s.status == ImportOutcome::Error).count()
    }

    fn statuses(&self) -> impl Iterator<Item = &ImportStatus> {
        self.definitions.values().chain(self.entities.values())
    }
}
