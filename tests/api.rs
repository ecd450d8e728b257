//! HTTP API tests
//!
//! Drives the router in-process against a temporary store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use schema_catalog::server::router;
use schema_catalog::{Definition, Entity, Field, FileStore, Format};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn seeded() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.add_format("Email", Format::new("^.+@.+$", "mail address")).unwrap();
    store.add_format("Unused", Format::new("^u$", "")).unwrap();
    store.add_definition("email", Definition::new("Email", "")).unwrap();
    store.add_entity("user", Entity::new(vec![Field::definition("email")])).unwrap();
    (dir, router(Arc::new(store), 1024 * 1024))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_affected_format_reports_second_order_entities() {
    let (_dir, app) = seeded();
    let (status, body) = send(&app, Method::GET, "/api/affected?format=Email", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"definitions": ["email"], "entities": ["user"]}));
}

#[tokio::test]
async fn test_affected_without_usages_is_404() {
    let (_dir, app) = seeded();
    let (status, body) = send(&app, Method::GET, "/api/affected?format=Unused", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No usages found for Unused");
}

#[tokio::test]
async fn test_affected_requires_exactly_one_param() {
    let (_dir, app) = seeded();
    let (none, _) = send(&app, Method::GET, "/api/affected", None).await;
    let (two, _) = send(&app, Method::GET, "/api/affected?format=Email&entity=user", None).await;
    assert_eq!(none, StatusCode::BAD_REQUEST);
    assert_eq!(two, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_postman() {
    let (_dir, app) = seeded();
    let collection = json!({"item": [{"request": {"body": {"raw": "{\"user\": {\"id\": 1}}"}}}]});
    let (status, body) = send(&app, Method::POST, "/api/process/postman", Some(collection)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entities"]["user"]["fields"], json!([{"label": "id", "type": "definition"}]));
    assert_eq!(body["definitions"]["id"], json!({"format": "Text", "description": ""}));

    let (status, _) = send(&app, Method::POST, "/api/process/postman", Some(json!({"item": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_swagger() {
    let (_dir, app) = seeded();
    let document = json!({"paths": {"/x": {"get": {"parameters": [{"name": "q", "in": "query", "type": "string"}]}}}});
    let (status, body) = send(&app, Method::POST, "/api/process/swagger", Some(document)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"entities": {}, "definitions": {"q": {"format": "Text", "description": ""}}}));

    let (status, _) = send(&app, Method::POST, "/api/process/swagger", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // an object without usable parameters has nothing to import
    let (status, body) = send(&app, Method::POST, "/api/process/swagger", Some(json!({"hello": "world"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("No entities or definitions"));
}

#[tokio::test]
async fn test_unreadable_collection_is_500() {
    let (dir, app) = seeded();
    std::fs::write(dir.path().join("entities.json"), "{ not json").unwrap();

    let (status, body) = send(&app, Method::GET, "/api/affected?entity=x", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Internal server error"}));
}

#[tokio::test]
async fn test_bad_query_string_uses_message_body() {
    let (_dir, app) = seeded();
    let (status, body) = send(&app, Method::GET, "/api/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("q"));

    let (status, body) = send(&app, Method::GET, "/api/search?q=mail&limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_400_with_message() {
    let (_dir, app) = seeded();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/process/postman")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_crud_and_change_log() {
    let (_dir, app) = seeded();

    let (status, _) = send(&app, Method::POST, "/api/formats", Some(json!({"name": "Digits", "pattern": "^[0-9]+$"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::POST, "/api/formats", Some(json!({"name": "Digits", "pattern": "^[0-9]+$"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::POST, "/api/formats", Some(json!({"name": "Loose", "pattern": "[0-9]+"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::PUT, "/api/definitions/email", Some(json!({"format": "Digits"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, "/api/entities/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, changes) = send(&app, Method::GET, "/api/changes", None).await;
    let last = changes.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["type"], "definition");
    assert_eq!(last["before"]["format"], "Email");
    assert_eq!(last["after"]["format"], "Digits");
}

#[tokio::test]
async fn test_import_validate_and_export() {
    let (_dir, app) = seeded();

    let inferred = json!({
        "entities": {"account": {"fields": [{"label": "email", "type": "definition"}, {"label": "owner", "type": "entity"}]}},
        "definitions": {"nickname": {"format": "Text", "description": ""}}
    });
    let (status, report) = send(&app, Method::POST, "/api/import", Some(inferred)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["entities"]["account"]["status"], "imported");
    assert_eq!(report["definitions"]["nickname"]["status"], "imported");

    let (_, problems) = send(&app, Method::GET, "/api/problems", None).await;
    let messages: Vec<&str> = problems.as_array().unwrap().iter().filter_map(|p| p["message"].as_str()).collect();
    assert!(messages.iter().any(|m| m.contains("format 'Text' does not exist")));
    assert!(messages.iter().any(|m| m.contains("field 'owner' references missing entity")));

    let (status, report) = send(&app, Method::POST, "/api/validate", Some(json!({"email": "a@b"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);

    let (status, sample) = send(&app, Method::GET, "/api/export/user?as=sample", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sample, json!({"email": "<Email>"}));

    let (status, _) = send(&app, Method::GET, "/api/export/user?as=csv", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let (_dir, app) = seeded();
    let (status, hits) = send(&app, Method::GET, "/api/search?q=mail&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = hits.as_array().unwrap().iter().filter_map(|h| h["name"].as_str()).collect();
    assert!(names.contains(&"Email"));
    assert!(names.contains(&"email"));
}
