//! End-to-end tests driving the router in-process

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use familytree_api::{build_router, ApiConfig, ApiState};
use familytree_databases::{BackupConfig, BackupManager, FamilyStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "familytree-test-boundary";

struct TestApp {
    dir: TempDir,
    router: Router,
}

fn app(auth_required: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = FamilyStore::open(dir.path().join("tree.db")).unwrap();
    let backups =
        BackupManager::new(store.clone(), BackupConfig::new(dir.path().join("backups"))).unwrap();
    let mut config = ApiConfig {
        upload_dir: dir.path().join("uploads"),
        ..ApiConfig::default()
    };
    config.auth.required = auth_required;
    config.auth.hash_rounds = 1_000;
    let state = Arc::new(ApiState::new(config, store, Arc::new(backups)));
    TestApp {
        router: build_router(state),
        dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_person(&self, first: &str, last: &str, extra: Value) -> i64 {
        let mut body = json!({ "first_name": first, "last_name": last });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        let (status, person) = self.call(Method::POST, "/api/persons", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{person}");
        person["id"].as_i64().unwrap()
    }

    async fn create_family(&self, p1: i64, p2: i64) -> i64 {
        let (status, family) = self
            .call(
                Method::POST,
                "/api/families",
                Some(json!({ "person1_id": p1, "person2_id": p2, "start_date": "1985-06-01" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{family}");
        family["id"].as_i64().unwrap()
    }
}

fn multipart_body(file_field: &str, filename: &str, content: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{file_field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app(false);
    let (status, body) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_person_lifecycle_through_trash() {
    let app = app(false);
    let id = app
        .create_person("Anna", "Kovács", json!({ "gender": "female", "birth_date": "1950-03-02" }))
        .await;

    let (status, person) = app.call(Method::GET, &format!("/api/persons/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(person["full_name"], "Kovács Anna");
    assert!(person["relations"]["children"].as_array().unwrap().is_empty());

    let (status, person) = app
        .call(
            Method::PUT,
            &format!("/api/persons/{id}"),
            Some(json!({ "occupation": "teacher" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(person["occupation"], "teacher");

    let (status, _) = app.call(Method::DELETE, &format!("/api/persons/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.call(Method::GET, &format!("/api/persons/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (_, trash) = app.call(Method::GET, "/api/trash", None).await;
    assert_eq!(trash[0]["entity_type"], "person");
    assert_eq!(trash[0]["entity_id"], id);

    let (status, restored) = app
        .call(
            Method::POST,
            "/api/trash/restore",
            Some(json!({ "entity_type": "person", "entity_id": id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["status"], "restored");
    let (status, _) = app.call(Method::GET, &format!("/api/persons/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = app(false);
    let (status, body) = app
        .call(Method::POST, "/api/persons", Some(json!({ "last_name": "Nagy" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("first_name"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/persons")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/trash/delete",
            Some(json!({ "entity_type": "spaceship", "entity_id": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_family_tree_data_and_alias() {
    let app = app(false);
    let father = app.create_person("János", "Kovács", json!({ "gender": "male" })).await;
    let mother = app.create_person("Mária", "Szabó", json!({ "gender": "female" })).await;
    let family = app.create_family(father, mother).await;
    let child = app
        .create_person("Péter", "Kovács", json!({ "parent_family_id": family }))
        .await;

    let (status, tree) = app.call(Method::GET, "/api/tree/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["nodes"].as_array().unwrap().len(), 3);
    let links = tree["links"].as_array().unwrap();
    assert_eq!(links.len(), 3);
    assert!(links.iter().any(|l| l["type"] == "partner"));
    assert!(links
        .iter()
        .any(|l| l["type"] == "parent-child" && l["target"] == child));

    let (_, families) = app.call(Method::GET, "/api/families", None).await;
    let (_, marriages) = app.call(Method::GET, "/api/marriages", None).await;
    assert_eq!(families, marriages);
    assert_eq!(families[0]["children_ids"], json!([child]));

    let (_, person) = app.call(Method::GET, &format!("/api/persons/{father}"), None).await;
    assert_eq!(person["relations"]["children"][0]["id"], child);

    let (_, stats) = app.call(Method::GET, "/api/stats", None).await;
    assert_eq!(stats["total_persons"], 3);
    assert_eq!(stats["marriages_count"], 1);
    assert_eq!(stats["living_persons"], 3);
}

#[tokio::test]
async fn test_search_and_exports() {
    let app = app(false);
    app.create_person("Ilona", "Tóth", json!({ "birth_date": "1961-07-04" })).await;

    let (_, hits) = app.call(Method::GET, "/api/search?q=t", None).await;
    assert_eq!(hits, json!([]));
    let (_, hits) = app.call(Method::GET, "/api/search?q=ilo", None).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let request = Request::builder()
        .uri("/api/export/gedcom")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("family_tree.ged"));
    let text = String::from_utf8(body).unwrap();
    assert!(text.starts_with("0 HEAD"));
    assert!(text.contains("2 DATE 04 JUL 1961"));
    assert!(text.trim_end().ends_with("0 TRLR"));

    let (status, export) = app.call(Method::GET, "/api/export/json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["persons"].as_array().unwrap().len(), 1);

    let (status, summary) = app.call(Method::POST, "/api/import/json", Some(export)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["persons"], 1);
    let (_, persons) = app.call(Method::GET, "/api/persons", None).await;
    assert_eq!(persons.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_settings_and_positions() {
    let app = app(false);
    let root = app.create_person("Ádám", "Kiss", json!({})).await;

    let (_, settings) = app.call(Method::GET, "/api/settings", None).await;
    assert_eq!(settings["male_color"], "#4A90D9");
    let (status, settings) = app
        .call(
            Method::PUT,
            "/api/settings",
            Some(json!({ "line_width": 3, "default_root_person_id": root })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["line_width"], 3);
    let (status, _) = app
        .call(Method::PUT, "/api/settings", Some(json!({ "default_root_person_id": 999 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/positions/{root}");
    let (status, _) = app
        .call(
            Method::PUT,
            &uri,
            Some(json!({ "positions": [{ "person_id": root, "x": 10.5, "y": -4.0 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, positions) = app.call(Method::GET, &uri, None).await;
    assert_eq!(positions[0]["x"], 10.5);
    app.call(Method::DELETE, &uri, None).await;
    let (_, positions) = app.call(Method::GET, &uri, None).await;
    assert_eq!(positions, json!([]));
}

#[tokio::test]
async fn test_document_upload_and_purge() {
    let app = app(false);
    let owner = app.create_person("Béla", "Fekete", json!({})).await;

    let body = multipart_body(
        "file",
        "birth certificate.pdf",
        b"%PDF-1.4",
        &[("person_id", &owner.to_string()), ("document_type", "certificate")],
    );
    let (status, _, bytes) = app.send(multipart_request("/api/documents", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["document_type"], "certificate");
    assert_eq!(document["file_type"], "document");
    let public_path = document["file_path"].as_str().unwrap().to_string();
    assert!(public_path.starts_with("/static/uploads/doc_"));
    assert!(public_path.ends_with("_birth_certificate.pdf"));

    let stored = app
        .dir
        .path()
        .join("uploads")
        .join(public_path.trim_start_matches("/static/uploads/"));
    assert!(stored.exists());

    let request = Request::builder().uri(&public_path).body(Body::empty()).unwrap();
    let (status, _, served) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, b"%PDF-1.4");

    let (_, listed) = app
        .call(Method::GET, &format!("/api/documents?person_id={owner}"), None)
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let id = document["id"].as_i64().unwrap();
    let (status, _) = app.call(Method::DELETE, &format!("/api/documents/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/trash/delete",
            Some(json!({ "entity_type": "document", "entity_id": id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!stored.exists());

    let bad = multipart_body("file", "payload.exe", b"MZ", &[]);
    let (status, _, _) = app.send(multipart_request("/api/documents", bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_photo_upload() {
    let app = app(false);
    let id = app.create_person("Teréz", "Varga", json!({})).await;
    let body = multipart_body("photo", "portrait.JPG", b"jpeg", &[]);
    let (status, _, bytes) = app
        .send(multipart_request(&format!("/api/persons/{id}/photo"), body))
        .await;
    assert_eq!(status, StatusCode::OK);
    let person: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        person["photo_path"],
        format!("/static/uploads/person_{id}_portrait.JPG")
    );

    let body = multipart_body("photo", "portrait.jpg", b"jpeg", &[]);
    let (status, _, _) = app.send(multipart_request("/api/persons/999/photo", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events() {
    let app = app(false);
    let id = app.create_person("Gábor", "Horváth", json!({})).await;
    let (status, event) = app
        .call(
            Method::POST,
            "/api/events",
            Some(json!({ "person_id": id, "event_type": "graduation", "event_date": "1990-06-15" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, events) = app
        .call(Method::GET, &format!("/api/events?person_id={id}"), None)
        .await;
    assert_eq!(events.as_array().unwrap().len(), 1);

    let event_id = event["id"].as_i64().unwrap();
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/events/{event_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, events) = app.call(Method::GET, "/api/events", None).await;
    assert_eq!(events, json!([]));
}

#[tokio::test]
async fn test_backups() {
    let app = app(false);
    let (status, backup) = app.call(Method::POST, "/api/backups", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(backup["trigger"], "manual");

    let (_, listed) = app.call(Method::GET, "/api/backups", None).await;
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["id"] == backup["id"]));
    let (_, stats) = app.call(Method::GET, "/api/backups/stats", None).await;
    assert!(stats["total_backups"].as_u64().unwrap() >= 1);

    let (status, _) = app.call(Method::POST, "/api/backups/999/restore", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::DELETE, "/api/backups/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn auto_backup_count(app: &TestApp) -> usize {
    let (_, listed) = app.call(Method::GET, "/api/backups", None).await;
    listed
        .as_array()
        .unwrap()
        .iter()
        .filter(|b| b["trigger"] == "auto")
        .count()
}

#[tokio::test]
async fn test_changes_trigger_throttled_auto_backup() {
    let app = app(false);
    assert_eq!(auto_backup_count(&app).await, 0);

    app.create_person("Ilona", "Tóth", json!({})).await;
    let mut count = 0;
    for _ in 0..100 {
        count = auto_backup_count(&app).await;
        if count > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(count, 1);

    // a second change inside the interval is throttled
    app.create_person("Gábor", "Tóth", json!({})).await;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(auto_backup_count(&app).await, 1);
}

#[tokio::test]
async fn test_login_required() {
    let app = app(true);
    let (status, _) = app.call(Method::GET, "/api/persons", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, auth) = app.call(Method::GET, "/api/auth/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(auth["authenticated"], false);
    assert_eq!(auth["auth_required"], true);

    let (status, _) = app
        .call(Method::POST, "/api/auth/login", Some(json!({ "password": "wrong" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let login = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "password": "familytree" }).to_string()))
        .unwrap();
    let (status, headers, _) = app.send(login).await;
    assert_eq!(status, StatusCode::OK);
    let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let authed = |method: Method, uri: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = app.send(authed(Method::GET, "/api/persons")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app.send(authed(Method::POST, "/api/auth/logout")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = app.send(authed(Method::GET, "/api/persons")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
