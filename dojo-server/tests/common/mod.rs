#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use dojo_server::{config::Settings, db::Database, routes, state::AppState};

pub const ADMIN: &str = "00000000-0000-4000-8000-000000000001";
pub const INSTRUCTOR: &str = "00000000-0000-4000-8000-000000000002";
pub const BRUNA: &str = "00000000-0000-4000-8000-000000000003";
pub const DIEGO: &str = "00000000-0000-4000-8000-000000000004";
pub const LIA: &str = "00000000-0000-4000-8000-000000000005";
pub const ADULTS_CLASS: &str = "10000000-0000-4000-8000-000000000001";
pub const KIMONO: &str = "50000000-0000-4000-8000-000000000001";
pub const RASHGUARD: &str = "50000000-0000-4000-8000-000000000003";
pub const DEMO_PASSWORD: &str = "dojo123";

/// Router over a fresh in-memory database with the demo data loaded
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = Settings::for_tests();
        let db = Database::new(&settings.database.path).expect("database");
        db.initialize().expect("schema");
        db.seed_demo_data().expect("demo data");

        let state = AppState::new(db, settings);
        let router = routes::build_router(state.clone());
        Self { router, state }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("X-Session-Token", token);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn login(&self, email: &str, role: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": DEMO_PASSWORD,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed for {}: {}", email, body);
        body["session_token"].as_str().expect("token").to_string()
    }
}
