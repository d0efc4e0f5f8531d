//! Integration tests for fmea-ws API endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Save: committed, rejected by overwrite guard, malformed input
//! - Load: legacy tree and raw atomic batch
//! - Failure-chain groups
//! - Listing and delete

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use fmea_common::db::MemoryStore;
use fmea_common::orchestrator::Orchestrator;
use fmea_ws::{build_router, AppState};

/// Test helper: app over a fresh in-memory store
fn setup_app() -> axum::Router {
    let orchestrator = Orchestrator::new(Arc::new(MemoryStore::new()));
    build_router(AppState::new(orchestrator))
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// One FM linked to FE "Stop Function Loss" (S9) and FC "Tool Wear"
fn brake_caliper() -> Value {
    json!({
        "l1": {
            "id": "L1-1",
            "name": "Brake Caliper",
            "types": [{
                "id": "T-USER",
                "name": "User",
                "functions": [{
                    "id": "F-1",
                    "name": "Stop vehicle",
                    "requirements": [{ "id": "REQ-1", "name": "Clamp force" }]
                }]
            }],
            "failureScopes": [{
                "id": "FE-1",
                "reqId": "REQ-1",
                "requirement": "Clamp force",
                "scope": "User",
                "effect": "Stop Function Loss",
                "severity": 9
            }]
        },
        "l2": [{
            "id": "P-1",
            "no": "10",
            "name": "Machining",
            "order": 1,
            "functions": [{
                "id": "PF-1",
                "name": "Machine bore",
                "productChars": [{ "id": "PC-1", "name": "Bore diameter" }]
            }],
            "l3": [{
                "id": "WE-1",
                "m4": "MC",
                "name": "CNC Lathe",
                "functions": [{
                    "id": "WF-1",
                    "name": "Cut bore",
                    "processChars": [{ "id": "PR-1", "name": "Spindle speed" }]
                }]
            }],
            "failureModes": [{ "id": "FM-1", "name": "Crack", "productCharId": "PC-1" }],
            "failureCauses": [{ "id": "FC-1", "name": "Tool Wear", "processCharId": "PR-1" }]
        }],
        "failureLinks": [{ "id": "LK-1", "fmId": "FM-1", "feId": "FE-1", "fcId": "FC-1" }],
        "project": { "projectName": "Caliper line 2" }
    })
}

async fn save(app: &axum::Router, id: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request("POST", &format!("/api/fmea/{}", id), &body))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fmea-ws");
    assert!(body["version"].is_string());
}

// =============================================================================
// Save / Load
// =============================================================================

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let app = setup_app();

    let (status, body) = save(&app, "pfm26-m001", json!({ "legacy": brake_caliper() })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "committed");
    assert_eq!(body["fmeaId"], "PFM26-M001");
    assert_eq!(body["rejections"], json!([]));

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/fmea/PFM26-M001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = extract_json(response.into_body()).await;
    assert_eq!(doc["l1"]["name"], "Brake Caliper");
    assert_eq!(doc["l1"]["failureScopes"][0]["severity"], 9);
    assert_eq!(doc["project"]["projectName"], "Caliper line 2");

    let response = app
        .oneshot(empty_request("GET", "/api/fmea/pfm26-m001?raw=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let batch = extract_json(response.into_body()).await;
    assert_eq!(batch["failureLinks"].as_array().unwrap().len(), 1);
    assert_eq!(batch["failureModes"][0]["mode"], "Crack");
}

#[tokio::test]
async fn test_empty_snapshot_over_populated_analysis_is_conflict() {
    let app = setup_app();

    let rich = json!({
        "legacy": {
            "l1": { "id": "L1-1", "name": "Brake Caliper" },
            "l2": [{ "id": "P-1", "no": "10", "name": "Machining" }]
        }
    });
    let (status, _) = save(&app, "PFM-G", rich).await;
    assert_eq!(status, StatusCode::OK);

    let empty = json!({ "legacy": { "l1": { "id": "L1-1", "name": "" }, "l2": [] } });
    let (status, body) = save(&app, "PFM-G", empty).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "rejected_by_guard");
    assert_eq!(body["incomingScore"], 0);
    assert_eq!(body["existingScore"], 70);

    // Prior data untouched
    let response = app
        .oneshot(empty_request("GET", "/api/fmea/PFM-G"))
        .await
        .unwrap();
    let doc = extract_json(response.into_body()).await;
    assert_eq!(doc["l1"]["name"], "Brake Caliper");
}

#[tokio::test]
async fn test_force_overwrite_bypasses_guard() {
    let app = setup_app();

    save(&app, "PFM-F", json!({ "legacy": brake_caliper() })).await;
    let (status, body) = save(
        &app,
        "PFM-F",
        json!({ "legacy": { "l1": { "id": "L1-1", "name": "" } }, "forceOverwrite": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let app = setup_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/fmea/PFM-1")
                .header("content-type", "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "MALFORMED_INPUT");
}

#[tokio::test]
async fn test_out_of_range_rating_is_bad_request() {
    let app = setup_app();

    let mut doc = brake_caliper();
    doc["l1"]["failureScopes"][0]["severity"] = json!(11);
    let (status, body) = save(&app, "PFM-R", json!({ "legacy": doc })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
}

#[tokio::test]
async fn test_request_without_content_is_bad_request() {
    let app = setup_app();

    let (status, body) = save(&app, "PFM-E", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_INPUT");
}

#[tokio::test]
async fn test_load_unknown_analysis_is_not_found() {
    let app = setup_app();

    let response = app
        .oneshot(empty_request("GET", "/api/fmea/NOPE"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// =============================================================================
// Chains, listing, delete
// =============================================================================

#[tokio::test]
async fn test_failure_chains_endpoint() {
    let app = setup_app();
    save(&app, "PFM-C", json!({ "legacy": brake_caliper() })).await;

    let response = app
        .oneshot(empty_request("GET", "/api/fmea/PFM-C/chains"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let groups = extract_json(response.into_body()).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["fmText"], "Crack");
    assert_eq!(groups[0]["maxRows"], 1);
    assert_eq!(groups[0]["maxSeverity"], 9);
}

#[tokio::test]
async fn test_list_and_delete() {
    let app = setup_app();
    save(&app, "PFM-B", json!({ "legacy": brake_caliper() })).await;
    save(&app, "PFM-A", json!({ "legacy": brake_caliper() })).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/fmea"))
        .await
        .unwrap();
    let list = extract_json(response.into_body()).await;
    let keys: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["fmeaId"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["PFM-A", "PFM-B"]);
    assert_eq!(list[0]["name"], "Brake Caliper");

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/api/fmea/pfm-a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(empty_request("DELETE", "/api/fmea/PFM-A"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
