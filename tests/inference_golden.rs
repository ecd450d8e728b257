//! Golden Tests for Schema Inference
//!
//! Runs both inference pipelines over realistic fixtures and checks the
//! resulting entity/definition graph.

use schema_catalog::catalog::FieldKind;
use schema_catalog::infer::{infer_postman, infer_swagger, InferredField};
use schema_catalog::{Definition, FileStore};

fn postman_fixture() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/postman_collection.json")).unwrap()
}

fn swagger_fixture() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/swagger_petstore.json")).unwrap()
}

fn labels(fields: &[InferredField]) -> Vec<&str> {
    fields.iter().map(|f| f.label.as_str()).collect()
}

// =============================================================================
// Postman
// =============================================================================

#[test]
fn test_postman_entities_are_unioned_across_requests() {
    let schema = infer_postman(&postman_fixture()).expect("collection has bodies");

    assert_eq!(schema.entities.keys().collect::<Vec<_>>(), vec!["order", "user"]);

    let user = &schema.entities["user"];
    assert_eq!(labels(&user.fields), vec!["address", "id", "name", "email"]);

    let address = &user.fields[0];
    assert_eq!(address.kind, FieldKind::Entity);
    assert_eq!(labels(&address.fields), vec!["city", "zip"]);
}

#[test]
fn test_postman_array_elements_are_merged() {
    let schema = infer_postman(&postman_fixture()).unwrap();
    let order = &schema.entities["order"];
    let lines = order.fields.iter().find(|f| f.label == "lines").unwrap();
    assert!(lines.is_entity());
    assert_eq!(labels(&lines.fields), vec!["price", "qty", "sku"]);
}

#[test]
fn test_postman_definitions_share_one_namespace() {
    let schema = infer_postman(&postman_fixture()).unwrap();
    assert_eq!(
        schema.definitions.keys().collect::<Vec<_>>(),
        vec!["city", "email", "id", "name", "notify", "price", "qty", "sku", "tags", "zip"]
    );
    assert!(schema.definitions.values().all(|d| *d == Definition::new("Text", "")));
}

#[test]
fn test_postman_inference_is_deterministic() {
    let input = postman_fixture();
    assert_eq!(infer_postman(&input), infer_postman(&input));
}

// =============================================================================
// Swagger
// =============================================================================

#[test]
fn test_swagger_entities_follow_parameter_names() {
    let schema = infer_swagger(&swagger_fixture());

    assert_eq!(schema.entities.keys().collect::<Vec<_>>(), vec!["manager", "owner", "petFilter"]);
    assert_eq!(labels(&schema.entities["petFilter"].fields), vec!["name", "tag"]);

    let owner_kinds: Vec<FieldKind> = schema.entities["owner"].fields.iter().map(|f| f.kind).collect();
    assert_eq!(owner_kinds, vec![FieldKind::Definition, FieldKind::Entity, FieldKind::Definition]);
}

#[test]
fn test_swagger_skips_body_parameters() {
    let schema = infer_swagger(&swagger_fixture());
    assert!(!schema.definitions.contains_key("body"));
    assert!(!schema.definitions.contains_key("secretCode"));
    assert!(!schema.entities.contains_key("body"));
}

#[test]
fn test_swagger_definitions_keep_formats() {
    let schema = infer_swagger(&swagger_fixture());
    assert_eq!(
        schema.definitions.keys().collect::<Vec<_>>(),
        vec!["X-Request-Id", "id", "limit", "name", "petId", "pets", "tag"]
    );
    assert_eq!(schema.definitions["X-Request-Id"], Definition::new("uuid", "trace id"));
    assert_eq!(schema.definitions["id"].format, "int64");
    // synthetic schema carries only the type
    assert_eq!(schema.definitions["limit"].format, "Text");
}

// =============================================================================
// Import
// =============================================================================

#[test]
fn test_inferred_schema_imports_into_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let schema = infer_postman(&postman_fixture()).unwrap();
    let report = store.import(&schema).unwrap();
    assert_eq!(report.error_count(), 0);

    let entities = store.get_entities().unwrap();
    assert!(entities.contains_key("user"));
    assert!(entities.contains_key("address"));
    assert!(entities.contains_key("lines"));

    // second import reports every item as existing
    let again = store.import(&schema).unwrap();
    assert_eq!(again.imported_count(), 0);
}
