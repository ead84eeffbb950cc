#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use pharma_service::prelude::*;
use serde_json::Value;
use tower::ServiceExt;

pub const USER: &str = "user-7";

pub struct TestApp {
    pub router: Router,
    pub worker: Option<ActivityWorker>,
    pub sink: Arc<MemoryActivitySink>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(MemoryActivitySink::new()))
    }

    pub fn with_sink(sink: Arc<MemoryActivitySink>) -> Self {
        let service = ServiceBuilder::new(Config::default())
            .with_activity_sink(sink.clone())
            .with_memory_resources()
            .build();
        let (router, worker) = service.into_parts();
        Self {
            router,
            worker,
            sink,
        }
    }

    pub async fn send(&self, request: TestRequest) -> TestResponse {
        send(&self.router, request).await
    }

    /// Stop the activity writer and return what it wrote
    pub async fn drain_activity(mut self) -> Vec<ActivityEntry> {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await;
        }
        self.sink.entries().await
    }
}

pub struct TestRequest {
    method: Method,
    uri: String,
    body: Option<String>,
    user: Option<String>,
}

impl TestRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            user: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, uri).json(body)
    }

    pub fn put(uri: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, uri).json(body)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn raw(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn as_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: TestRequest) -> TestResponse {
    let mut builder = Request::builder().method(request.method).uri(request.uri);
    if request.body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(user) = request.user {
        builder = builder.header("x-user-id", user);
    }
    let request = builder
        .body(request.body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn detail_fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .map(|d| d["field"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}
