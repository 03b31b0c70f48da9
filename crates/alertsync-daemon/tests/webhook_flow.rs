//! End-to-end webhook flow tests.
//!
//! Drives the real router (signature check, payload validation, dispatch)
//! against the in-memory ledger, asserting both the HTTP contract and the
//! resulting ledger state.

use std::sync::Arc;

use alertsync_core::ledger::memory::InMemoryLedger;
use alertsync_core::{
    BranchPolicy, BranchStrategy, EntryStatus, EventProcessor, IssueLedger, SignatureGuard,
};
use alertsync_daemon::webhook::{router, AppState, SIGNATURE_HEADER};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

const SECRET: &str = "test-webhook-secret";

fn sign(body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn app(strategy: BranchStrategy) -> (Arc<InMemoryLedger>, Router) {
    let ledger = Arc::new(InMemoryLedger::new());
    let state = AppState {
        guard: Arc::new(SignatureGuard::new(SecretString::from(SECRET.to_string()))),
        processor: Arc::new(EventProcessor::new(
            Arc::clone(&ledger) as Arc<dyn IssueLedger>,
            BranchPolicy::new(strategy, "main"),
        )),
    };
    (ledger, router(state))
}

fn payload(action: &str, alert_id: u64, branch: &str) -> Vec<u8> {
    json!({
        "action": action,
        "alert": {
            "id": alert_id,
            "url": format!("https://api.github.com/repos/acme/widgets/code-scanning/alerts/{alert_id}"),
            "html_url": format!("https://github.com/acme/widgets/security/code-scanning/{alert_id}"),
            "state": "open",
            "rule": {
                "id": "js/sql-injection",
                "name": "SQL injection",
                "description": "Unsanitized input flows into a query",
                "severity": "error",
            },
            "most_recent_instance": {
                "ref": format!("refs/heads/{branch}"),
                "analysis_key": ".github/workflows/codeql.yml:analyze",
                "location": {
                    "path": "src/db/query.ts",
                    "start_line": 17,
                },
            },
        },
        "ref": format!("refs/heads/{branch}"),
        "commit_oid": "0123abcd",
        "repository": {"id": 1, "name": "widgets", "full_name": "acme/widgets"},
    })
    .to_string()
    .into_bytes()
}

async fn post_webhook(app: &Router, body: Vec<u8>, signature: Option<String>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("POST").uri("/webhook");
    if let Some(signature) = signature {
        request = request.header(SIGNATURE_HEADER, signature);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ));
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_ledger, app) = app(BranchStrategy::MainOnly);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["status"], "healthy");
}

#[tokio::test]
async fn test_created_event_creates_ledger_entry() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("created", 42, "main");
    let signature = sign(&body);

    let (status, value) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
    assert_eq!(value["action"], "created");
    assert_eq!(value["outcome"], "created");

    let entries = ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].metadata.alert_id, "42");
    assert_eq!(entries[0].metadata.branch, "main");
    assert_eq!(entries[0].status, EntryStatus::Created);
}

#[tokio::test]
async fn test_replayed_created_event_is_idempotent() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("created", 42, "main");
    let signature = sign(&body);

    let (first, _) = post_webhook(&app, body.clone(), Some(signature.clone())).await;
    let (second, value) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(value["outcome"], "already_tracked");
    assert_eq!(ledger.entries().len(), 1);
    assert_eq!(ledger.counts().create, 1);
}

#[tokio::test]
async fn test_missing_signature_is_unauthorized() {
    let (ledger, app) = app(BranchStrategy::MainOnly);

    let (status, _) = post_webhook(&app, payload("created", 42, "main"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Rejected before the engine: no ledger calls at all.
    assert_eq!(ledger.counts(), Default::default());
}

#[tokio::test]
async fn test_wrong_signature_is_unauthorized() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("created", 42, "main");

    let (status, _) = post_webhook(
        &app,
        body,
        Some(format!("sha256={}", "ab".repeat(32))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ledger.counts(), Default::default());
}

#[tokio::test]
async fn test_tampered_body_is_unauthorized() {
    let (_ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("created", 42, "main");
    let signature = sign(&body);
    let tampered = payload("created", 43, "main");

    let (status, _) = post_webhook(&app, tampered, Some(signature)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let (_ledger, app) = app(BranchStrategy::MainOnly);
    let body = b"{\"action\": \"created\"".to_vec();
    let signature = sign(&body);

    let (status, _) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_action_is_bad_request() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("quarantined", 42, "main");
    let signature = sign(&body);

    let (status, _) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ledger.counts(), Default::default());
}

#[tokio::test]
async fn test_fixed_without_entry_is_a_defined_noop() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("fixed", 42, "main");
    let signature = sign(&body);

    let (status, value) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"], "skipped");
    assert_eq!(value["detail"], "skipped: no matching ledger entry");
    assert_eq!(ledger.counts().mutations(), 0);
}

#[tokio::test]
async fn test_created_on_untracked_branch_is_skipped() {
    let (ledger, app) = app(BranchStrategy::MainOnly);
    let body = payload("created", 42, "feature/x");
    let signature = sign(&body);

    let (status, value) = post_webhook(&app, body, Some(signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"], "skipped");
    assert_eq!(value["detail"], "skipped: untracked branch");
    assert!(ledger.entries().is_empty());
}

#[tokio::test]
async fn test_full_alert_lifecycle() {
    let (ledger, app) = app(BranchStrategy::MainWithBranchUpdates);

    // created on main
    let body = payload("created", 42, "main");
    let signature = sign(&body);
    let (status, value) = post_webhook(&app, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
    let entry_id = value["entry_id"].as_str().unwrap().to_string();

    // appeared in another branch
    let body = payload("appeared_in_branch", 42, "develop");
    let signature = sign(&body);
    let (status, value) = post_webhook(&app, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"], "updated");

    let entry = ledger.entry(&entry_id).unwrap();
    assert_eq!(entry.status, EntryStatus::AppearedInBranch);
    assert!(entry
        .comments
        .contains(&"🌿 Alert appeared in branch: `develop`".to_string()));

    // fixed
    let body = payload("fixed", 42, "main");
    let signature = sign(&body);
    let (status, value) = post_webhook(&app, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"], "updated");

    let entry = ledger.entry(&entry_id).unwrap();
    assert_eq!(entry.status, EntryStatus::Fixed);
    assert!(entry.labels.contains(&"fixed".to_string()));

    // reopened by user
    let body = payload("reopened_by_user", 42, "main");
    let signature = sign(&body);
    let (status, _) = post_webhook(&app, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);

    let entry = ledger.entry(&entry_id).unwrap();
    assert_eq!(entry.status, EntryStatus::ReopenedByUser);

    // Through the whole lifecycle, exactly one entry existed.
    assert_eq!(ledger.entries().len(), 1);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (_ledger, app) = app(BranchStrategy::MainOnly);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
