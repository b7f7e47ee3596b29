//! HTTP API tests driven through the router

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use deckhand::app::options::AppOptions;
use deckhand::app::run::init_server_state;
use deckhand::server::serve::build_router;
use deckhand::storage::registry::{NewApp, Registry};
use deckhand::storage::settings::{AuthSettings, UserSettings};
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::support::{layout, write_discovered_app, FakeRunner};

fn user(id: &str, username: &str, password: &str, role: &str) -> UserSettings {
    UserSettings {
        id: id.to_string(),
        username: username.to_string(),
        // lowest cost keeps the tests fast
        password_hash: bcrypt::hash(password, 4).unwrap(),
        role: role.to_string(),
    }
}

struct TestServer {
    router: Router,
    options: AppOptions,
    runner: Arc<FakeRunner>,
    _root: tempfile::TempDir,
}

impl TestServer {
    fn new(processes: &'static str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let auth = AuthSettings {
            jwt_secret: Some("test-secret".to_string()),
            users: vec![
                user("1", "admin", "admin123", "admin"),
                user("2", "viewer", "viewpass", "viewer"),
            ],
            ..Default::default()
        };
        let options = AppOptions {
            layout: layout(&root),
            auth,
            ..Default::default()
        };
        std::fs::create_dir_all(&options.layout.apps_dir).unwrap();

        let runner = FakeRunner::healthy(processes);
        let state = init_server_state(&options, runner.clone()).unwrap();
        Self {
            router: build_router(Arc::new(state)),
            options,
            runner,
            _root: root,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let server = TestServer::new("[]");
    let (status, body) = server.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_login_and_me() {
    let server = TestServer::new("[]");
    let token = server.login("admin", "admin123").await;

    let (status, body) = server.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");

    let (status, body) = server
        .send(Method::POST, "/api/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
}

#[tokio::test]
async fn test_login_failures() {
    let server = TestServer::new("[]");

    let (status, body) = server
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = server
        .send(Method::POST, "/api/auth/login", None, Some(json!({ "username": "admin" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username and password required");
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let server = TestServer::new("[]");

    let (status, body) = server.send(Method::GET, "/api/applications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");

    let (status, body) = server
        .send(Method::GET, "/api/applications", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_viewer_cannot_modify() {
    let server = TestServer::new("[]");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("viewer", "viewpass").await;

    let (status, body) = server
        .send(Method::POST, "/api/applications/discovered-blog/start", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Developer access required");
    assert!(server.runner.calls().is_empty());

    // reading is fine
    let (status, _) = server
        .send(Method::GET, "/api/applications/discovered-blog/env-vars", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_application_is_not_found() {
    let server = TestServer::new("[]");
    let token = server.login("admin", "admin123").await;

    let (status, body) = server
        .send(Method::POST, "/api/applications/does-not-exist/start", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Application not found");

    let (status, _) = server
        .send(Method::GET, "/api/applications/discovered-ghost/logs", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_merges_registry_and_discovered_apps() {
    let server = TestServer::new(
        r#"[{"pm_id":3,"name":"shop","pm2_env":{"status":"online","restart_time":2},"monit":{"cpu":1.5,"memory":1024}}]"#,
    );
    let registry = Registry::new(server.options.layout.clone());
    let record = registry
        .create(NewApp {
            name: "shop".to_string(),
            repository: "https://example.com/shop.git".to_string(),
            branch: "main".to_string(),
            port: 3000,
        })
        .await
        .unwrap();
    write_discovered_app(&server.options.layout, "shop");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("viewer", "viewpass").await;

    let (status, body) = server
        .send(Method::GET, "/api/applications", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let apps = body["applications"].as_array().unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0]["id"], record.id.as_str());
    assert_eq!(apps[0]["status"], "online");
    assert_eq!(apps[0]["restarts"], 2);
    assert_eq!(apps[1]["id"], "discovered-blog");
    assert_eq!(apps[1]["status"], "stopped");

    // the live process id was written back
    assert_eq!(registry.get_by_id(&record.id).await.unwrap().pm2_id, Some(3));
}

#[tokio::test]
async fn test_deploy_validation() {
    let server = TestServer::new("[]");
    let token = server.login("admin", "admin123").await;

    let (status, body) = server
        .send(Method::POST, "/api/applications", Some(&token), Some(json!({ "name": "shop" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and repository are required");
    assert!(server.runner.calls().is_empty());
}

#[tokio::test]
async fn test_deploy_and_read_status() {
    let server = TestServer::new(r#"[{"pm_id":7,"name":"shop"}]"#);
    let token = server.login("admin", "admin123").await;

    let (status, body) = server
        .send(
            Method::POST,
            "/api/applications",
            Some(&token),
            Some(json!({ "name": "shop", "repository": "https://example.com/shop.git" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Application deployed successfully");
    assert_eq!(body["application"]["hasErrors"], false);
    assert_eq!(body["application"]["port"], 3000);
    assert!(server.runner.ran("git clone -b main "));

    let id = body["application"]["id"].as_str().unwrap().to_string();
    let (status, body) = server
        .send(
            Method::GET,
            &format!("/api/applications/{}/deployment-status", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["steps"]["starting"], "success");
    assert!(body["status"]["completedAt"].is_string());

    let (status, _) = server
        .send(
            Method::DELETE,
            &format!("/api/applications/{}/deployment-status", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_env_var_round_trip() {
    let server = TestServer::new("[]");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("admin", "admin123").await;
    let uri = "/api/applications/discovered-blog/env-vars";

    let (status, body) = server
        .send(Method::POST, uri, Some(&token), Some(json!({ "key": "PORT", "value": "4000" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Environment variable saved successfully");
    assert_eq!(body["variable"]["key"], "PORT");

    let (status, body) = server.send(Method::GET, uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["variables"], json!([{ "key": "PORT", "value": "4000" }]));

    let (status, body) = server
        .send(Method::DELETE, &format!("{}/PORT", uri), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Environment variable deleted successfully");

    let (_, body) = server.send(Method::GET, uri, Some(&token), None).await;
    assert_eq!(body["variables"], json!([]));

    let (status, _) = server
        .send(Method::POST, uri, Some(&token), Some(json!({ "key": "PORT" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_env_var_empty_value_is_allowed() {
    let server = TestServer::new("[]");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("admin", "admin123").await;
    let uri = "/api/applications/discovered-blog/env-vars";

    let (status, body) = server
        .send(Method::POST, uri, Some(&token), Some(json!({ "key": "DEBUG", "value": "" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["variable"]["value"], "");

    let (_, body) = server.send(Method::GET, uri, Some(&token), None).await;
    assert_eq!(body["variables"], json!([{ "key": "DEBUG", "value": "" }]));

    let contents =
        std::fs::read_to_string(server.options.layout.env_file("blog").path()).unwrap();
    assert_eq!(contents, "DEBUG=");
}

#[tokio::test]
async fn test_invalid_database_action() {
    let server = TestServer::new("[]");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("admin", "admin123").await;

    let (status, body) = server
        .send(Method::POST, "/api/applications/discovered-blog/database/drop", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");
    assert!(server.runner.calls().is_empty());
}

#[tokio::test]
async fn test_database_status_without_drizzle() {
    let server = TestServer::new("[]");
    write_discovered_app(&server.options.layout, "blog");
    let token = server.login("viewer", "viewpass").await;

    let (status, body) = server
        .send(Method::GET, "/api/applications/discovered-blog/database/status", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["database"]["hasDatabase"], false);
}
