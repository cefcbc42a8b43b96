//! Shared helpers for router-level integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stride_leads::auth::AuthClient;
use stride_leads::config::Config;
use stride_leads::errors::AppError;
use stride_leads::handlers::AppState;
use stride_leads::lead_store::{LeadStore, MemoryLeadStore};
use stride_leads::models::{Lead, LeadStatus, NewLead};
use stride_leads::routes::build_router;

pub const GOOD_TOKEN: &str = "good-token";
pub const USER_ID: &str = "8d0c4a52-operator";

/// Helper function to create test config
pub fn test_config(auth_url: String) -> Config {
    Config {
        database_url: "memory://".to_string(),
        port: 0,
        auth_url,
        auth_api_key: "test-anon-key".to_string(),
        ingest_rate_per_second: None,
        duplicate_window_secs: 0,
        session_cache_secs: 60,
        cookie_secure: false,
    }
}

/// Builds the production router over `store`, talking to the auth provider at `auth_url`.
pub fn build_app_with(store: Arc<dyn LeadStore>, config: Config) -> Router {
    let auth = AuthClient::new(config.auth_url.clone(), config.auth_api_key.clone())
        .expect("auth client should build");
    let state = Arc::new(AppState::new(config, store, auth));
    build_router(state).expect("router should build")
}

pub fn build_app(store: Arc<dyn LeadStore>, auth_url: String) -> Router {
    build_app_with(store, test_config(auth_url))
}

/// Auth provider that knows exactly one token, [`GOOD_TOKEN`].
pub async fn mock_auth_provider() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header_eq("authorization", format!("Bearer {}", GOOD_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": USER_ID,
            "email": "ops@stride.test",
            "aud": "authenticated"
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": 401,
            "msg": "invalid JWT"
        })))
        .mount(&server)
        .await;

    server
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("body should be UTF-8")
}

pub fn post_lead(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/leads")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://stride.test")
        .body(body.into())
        .unwrap()
}

/// Request carrying [`GOOD_TOKEN`] as a Bearer token.
pub fn api_request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", GOOD_TOKEN));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Browser-style request carrying the session cookie.
pub fn page_request(method: Method, uri: &str, form: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("lead_session={}", GOOD_TOKEN));

    match form {
        Some(form) => builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn seed(store: &MemoryLeadStore, names: &[&str]) -> Vec<Lead> {
    let mut leads = Vec::new();
    for name in names {
        let body = serde_json::json!({ "name": name, "company": format!("{name} Co") });
        let lead = NewLead::from_submission(body.as_object().unwrap(), chrono::Utc::now());
        leads.push(store.insert(lead).await.unwrap());
    }
    leads
}

/// Lead store whose first `failures` inserts fail; every other call goes to memory.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryLeadStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryLeadStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl LeadStore for FlakyStore {
    async fn insert(&self, lead: NewLead) -> Result<Lead, AppError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(lead).await
    }

    async fn list(&self) -> Result<Vec<Lead>, AppError> {
        self.inner.list().await
    }

    async fn update_status(&self, id: Uuid, status: LeadStatus) -> Result<Option<Lead>, AppError> {
        self.inner.update_status(id, status).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }
}
