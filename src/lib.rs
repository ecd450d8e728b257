//! Familiar Schema Catalog
//!
//! A metadata catalog of reusable **formats** (named regex patterns),
//! **definitions** (named fields bound to a format) and **entities** (named
//! groupings of definitions and other entities).
//!
//! ## Features
//!
//! - **Affected Items**: which definitions and entities depend on an item
//!   before it is changed or deleted
//! - **Schema Inference**: candidate entities and definitions from Postman
//!   collections and Swagger v2 documents
//! - **Validation**: check JSON documents against definitions and formats
//! - **Export**: entity tables, JSON excerpts and sample objects
//! - **Problems**: dangling references and entity containment cycles
//!
//! ## Architecture
//!
//! ```text
//! Postman / Swagger ──▶ infer ──▶ InferredSchema ──▶ (curation) ──▶ store::import
//!                                                                      │
//! edit request ──▶ affected::resolve ◀── Catalog snapshot ◀── FileStore ┘
//!                                          │
//!                         validate / export / analysis
//! ```

pub mod affected;
pub mod analysis;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod infer;
pub mod server;
pub mod store;
pub mod validate;

pub use affected::{resolve, AffectedItems, AffectedQuery};
pub use analysis::{find_problems, Problem, ProblemCode};
pub use catalog::{Catalog, ChangeRecord, Definition, Entity, Field, FieldKind, Format, ItemKind};
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use export::ExportFormat;
pub use infer::{infer_postman, infer_swagger, InferredField, InferredSchema};
pub use store::{FileStore, ImportReport};
pub use validate::{validate, ValidationReport};
