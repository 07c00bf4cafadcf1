//! Drive API Tests
//!
//! Integration tests for the folder and upload routes and the
//! upload-finalize endpoint.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use cloudvault::db::{DriveRepository, NewFolder, NewPendingUpload, PendingUpload};
use cloudvault::web::router::create_router;
use cloudvault::web::signature::{sign, SIGNATURE_HEADER};
use cloudvault::config::ServerConfig;
use cloudvault::{AppState, Database};
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "test-webhook-secret";
const USER: &str = "user-1";
const OBJECT_BASE: &str = "http://objects.test/vault";

/// Create a test server with an in-memory database.
async fn create_test_server() -> (TestServer, Database) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");

    let config = ServerConfig {
        webhook_secret: SECRET.to_string(),
        object_base_url: OBJECT_BASE.to_string(),
        ..Default::default()
    };
    let state = Arc::new(AppState::new(db.clone(), &config));
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");

    (server, db)
}

async fn register_upload(db: &Database, size: i64, folder_id: Option<&str>) -> PendingUpload {
    DriveRepository::new(db.pool())
        .register_pending_upload(&NewPendingUpload {
            name: "report.pdf".to_string(),
            size,
            folder_id: folder_id.map(str::to_string),
            user_id: USER.to_string(),
        })
        .await
        .expect("Failed to register upload")
}

async fn folder_size(db: &Database, id: &str) -> i64 {
    DriveRepository::new(db.pool())
        .get_folder(id)
        .await
        .unwrap()
        .expect("folder exists")
        .size
}

async fn session(db: &Database, user_id: &str) -> String {
    DriveRepository::new(db.pool())
        .create_session(user_id)
        .await
        .expect("Failed to create session")
}

async fn create_folder_via_api(
    server: &TestServer,
    token: &str,
    name: &str,
    parent_id: Option<&str>,
) -> String {
    let response = server
        .post("/api/folders")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({ "name": name, "parentId": parent_id }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().expect("folder id").to_string()
}

async fn request_upload_via_api(
    server: &TestServer,
    token: &str,
    size: i64,
    folder_id: Option<&str>,
) -> axum_test::TestResponse {
    server
        .post("/api/files/upload")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({ "name": "report.pdf", "size": size, "folderId": folder_id }))
        .await
}

fn payload(key: &str, size: i64) -> String {
    json!({ "key": key, "size": size, "bucket": "vault" }).to_string()
}

async fn post_signed(server: &TestServer, body: String) -> axum_test::TestResponse {
    let signature = sign(SECRET, body.as_bytes()).unwrap();
    server
        .post("/api/webhook/file/uploaded")
        .add_header(SIGNATURE_HEADER, signature)
        .bytes(Bytes::from(body))
        .await
}

#[tokio::test]
async fn test_health() {
    let (server, _db) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_missing_signature() {
    let (server, db) = create_test_server().await;
    let pending = register_upload(&db, 10, None).await;

    let response = server
        .post("/api/webhook/file/uploaded")
        .bytes(Bytes::from(payload(&pending.key, 10)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_HASH");

    let repo = DriveRepository::new(db.pool());
    assert!(repo.get_pending_upload(&pending.key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_wrong_signature() {
    let (server, db) = create_test_server().await;
    let pending = register_upload(&db, 10, None).await;

    let body = payload(&pending.key, 10);
    let forged = sign("another-secret", body.as_bytes()).unwrap();
    let response = server
        .post("/api/webhook/file/uploaded")
        .add_header(SIGNATURE_HEADER, forged)
        .bytes(Bytes::from(body))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_HASH");
}

#[tokio::test]
async fn test_malformed_payload() {
    let (server, _db) = create_test_server().await;

    let response = post_signed(&server, r#"{"key": 42}"#.to_string()).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_key() {
    let (server, _db) = create_test_server().await;

    let response = post_signed(&server, payload("/does-not-exist", 10)).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_finalize_at_root() {
    let (server, db) = create_test_server().await;
    let pending = register_upload(&db, 64, None).await;

    let response = post_signed(&server, payload(&pending.key, 64)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({ "status": "SUCCESS" }));

    let repo = DriveRepository::new(db.pool());
    let file = repo.get_file_by_key(&pending.key).await.unwrap().unwrap();
    assert_eq!(file.id, pending.file_id);
    assert_eq!(file.size, 64);
    assert!(file.folder_id.is_none());
    assert!(repo.get_pending_upload(&pending.key).await.unwrap().is_none());
    assert_eq!(repo.get_storage(USER).await.unwrap().unwrap().used_storage, 64);
}

#[tokio::test]
async fn test_finalize_updates_folder_chain() {
    let (server, db) = create_test_server().await;
    let repo = DriveRepository::new(db.pool());

    let photos = repo.create_folder(&NewFolder::new("photos", USER)).await.unwrap();
    let trip = repo
        .create_folder(&NewFolder::new("trip", USER).with_parent(&photos.id))
        .await
        .unwrap();
    let other = repo.create_folder(&NewFolder::new("music", USER)).await.unwrap();

    let first = register_upload(&db, 100, Some(&trip.id)).await;
    let second = register_upload(&db, 50, Some(&photos.id)).await;

    post_signed(&server, payload(&first.key, 100))
        .await
        .assert_status_ok();
    post_signed(&server, payload(&second.key, 50))
        .await
        .assert_status_ok();

    assert_eq!(folder_size(&db, &photos.id).await, 150);
    assert_eq!(folder_size(&db, &trip.id).await, 100);
    assert_eq!(folder_size(&db, &other.id).await, 0);

    let storage = repo.get_storage(USER).await.unwrap().unwrap();
    assert_eq!(storage.used_storage, 150);
}

#[tokio::test]
async fn test_replayed_webhook_not_found() {
    let (server, db) = create_test_server().await;
    let pending = register_upload(&db, 8, None).await;
    let body = payload(&pending.key, 8);

    post_signed(&server, body.clone()).await.assert_status_ok();
    let response = post_signed(&server, body).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let repo = DriveRepository::new(db.pool());
    assert_eq!(repo.get_storage(USER).await.unwrap().unwrap().used_storage, 8);
}

#[tokio::test]
async fn test_drive_routes_reject_missing_or_unknown_session() {
    let (server, _db) = create_test_server().await;

    let response = server
        .post("/api/folders")
        .json(&json!({ "name": "docs" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = request_upload_via_api(&server, "not-a-session", 10, None).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_folder_via_api() {
    let (server, db) = create_test_server().await;
    let token = session(&db, USER).await;

    let photos = create_folder_via_api(&server, &token, "photos", None).await;
    let trip = create_folder_via_api(&server, &token, "trip", Some(&photos)).await;

    let repo = DriveRepository::new(db.pool());
    let folder = repo.get_folder(&trip).await.unwrap().expect("folder exists");
    assert_eq!(folder.name, "trip");
    assert_eq!(folder.parent_id.as_deref(), Some(photos.as_str()));
    assert_eq!(folder.user_id, USER);

    let response = server
        .post("/api/folders")
        .add_header("authorization", format!("Bearer {token}"))
        .json(&json!({ "name": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_folder_of_another_user_not_found() {
    let (server, db) = create_test_server().await;
    let owner = session(&db, USER).await;
    let intruder = session(&db, "user-2").await;

    let photos = create_folder_via_api(&server, &owner, "photos", None).await;

    let response = server
        .post("/api/folders")
        .add_header("authorization", format!("Bearer {intruder}"))
        .json(&json!({ "name": "x", "parentId": photos }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = request_upload_via_api(&server, &intruder, 10, Some(&photos)).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registered_upload_finalized_by_webhook() {
    let (server, db) = create_test_server().await;
    let token = session(&db, USER).await;

    let photos = create_folder_via_api(&server, &token, "photos", None).await;
    let trip = create_folder_via_api(&server, &token, "trip", Some(&photos)).await;

    let response = request_upload_via_api(&server, &token, 100, Some(&trip)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let key = body["key"].as_str().expect("object key").to_string();
    let url = body["url"].as_str().expect("upload url").to_string();

    assert!(key.starts_with(&format!("{photos}/{trip}/")));
    assert_eq!(url, format!("{OBJECT_BASE}/{key}"));

    post_signed(&server, payload(&key, 100))
        .await
        .assert_status_ok();

    let repo = DriveRepository::new(db.pool());
    let file = repo.get_file_by_key(&key).await.unwrap().expect("file recorded");
    assert_eq!(file.name, "report.pdf");
    assert_eq!(file.folder_id.as_deref(), Some(trip.as_str()));
    assert_eq!(folder_size(&db, &photos).await, 100);
    assert_eq!(folder_size(&db, &trip).await, 100);
    assert_eq!(repo.get_storage(USER).await.unwrap().unwrap().used_storage, 100);
}

#[tokio::test]
async fn test_root_upload_url() {
    let (server, db) = create_test_server().await;
    let token = session(&db, USER).await;

    let response = request_upload_via_api(&server, &token, 5, None).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let key = body["key"].as_str().unwrap();

    assert!(key.starts_with('/'));
    assert_eq!(
        body["url"].as_str().unwrap(),
        format!("{OBJECT_BASE}/{}", &key[1..])
    );
}

#[tokio::test]
async fn test_upload_request_rejects_bad_size_and_quota() {
    let (server, db) = create_test_server().await;
    let token = session(&db, USER).await;

    let response = request_upload_via_api(&server, &token, 0, None).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    sqlx::query("INSERT INTO storage (user_id, total_storage, used_storage) VALUES (?, 100, 90)")
        .bind(USER)
        .execute(db.pool())
        .await
        .unwrap();

    let response = request_upload_via_api(&server, &token, 20, None).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "storage quota exceeded");

    request_upload_via_api(&server, &token, 10, None)
        .await
        .assert_status_ok();
}
