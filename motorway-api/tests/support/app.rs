//! Router harness shared by the HTTP-level tests.
#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use motorway_api::{create_api_router, ApiConfig, AppState};
use motorway_core::{CacheConfig, MonitorConfig};
use motorway_test_utils::TestCatalog;
use serde_json::Value;
use tower::ServiceExt;

/// A router wired to scripted stores, with handles to both.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub catalog: TestCatalog,
}

pub fn test_app(catalog: TestCatalog) -> TestApp {
    test_app_with(catalog, CacheConfig::default(), MonitorConfig::default())
}

pub fn test_app_with(
    catalog: TestCatalog,
    cache_config: CacheConfig,
    monitor_config: MonitorConfig,
) -> TestApp {
    let state = AppState::new(cache_config, monitor_config, catalog.stores())
        .expect("Failed to build application state");
    let router = create_api_router(state.clone(), &ApiConfig::default());
    TestApp {
        router,
        state,
        catalog,
    }
}

impl TestApp {
    /// Send one request and decode the body as JSON (`Null` when empty,
    /// a JSON string when the body is not JSON).
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::POST, uri, None).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let (status, bytes) = self.send(Method::GET, uri, None).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        (status, bytes.to_vec())
    }
}
