//! Service assembly
//!
//! [`ServiceBuilder`] turns a [`Config`], an activity sink and a set of
//! [`ResourceDescriptor`]s into one router with health probes, a fallback
//! for unknown routes and the error handling stack:
//!
//! ```text
//! request id / trace / cors / compression     (Server::layer)
//!   error envelope + body limit               (every 4xx/5xx leaves through here)
//!     timeout                                 (408 -> server_error envelope)
//!       panic catcher                         (500 envelope, never a dropped connection)
//!         routes + fallback
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use pharma_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     ServiceBuilder::new(config)
//!         .with_memory_resources()
//!         .build()
//!         .serve()
//!         .await
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

use crate::{
    activity::{ActivityLogger, ActivitySink, ActivityWorker, TracingActivitySink},
    api::{error_envelope, panic_response, ApiError, EnvelopeState, ListSettings},
    config::Config,
    controller::{CrudController, ResourceDescriptor},
    domain::{
        Customer, Order, Product, CUSTOMER_SEARCH_FIELDS, ORDER_SEARCH_FIELDS,
        PRODUCT_SEARCH_FIELDS,
    },
    error::Result,
    health,
    server::{shutdown_signal, Server},
    state::AppState,
    storage::{MemoryStorage, Storage},
    validation::Schema,
};

/// At most this many endpoints are listed in a "Route not found" error
pub const MAX_LISTED_ENDPOINTS: usize = 10;

type Mount = Box<dyn FnOnce(&ActivityLogger) -> (Vec<String>, Router)>;

/// Builder for the HTTP service
pub struct ServiceBuilder {
    config: Config,
    sink: Option<Arc<dyn ActivitySink>>,
    resources: Vec<Mount>,
}

impl ServiceBuilder {
    /// Start from `config`; activity entries go to the log by default
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sink: Some(Arc::new(TracingActivitySink)),
            resources: Vec::new(),
        }
    }

    /// Write activity entries to `sink`
    #[must_use]
    pub fn with_activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Do not record activity at all
    #[must_use]
    pub fn without_activity_log(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Paging limits from the configuration, with no searchable fields
    pub fn list_settings(&self) -> ListSettings {
        ListSettings::from(self.config.pagination)
    }

    /// Mount the five CRUD routes of a resource
    #[must_use]
    pub fn with_resource<S>(mut self, descriptor: ResourceDescriptor<S>) -> Self
    where
        S: Storage,
        S::Create: Schema,
        S::Update: Schema + Serialize,
    {
        self.resources.push(Box::new(move |activity: &ActivityLogger| {
            let controller = Arc::new(CrudController::new(descriptor, activity.clone()));
            (controller.endpoints(), controller.router())
        }));
        self
    }

    /// Mount customers, products and orders backed by in-memory storage
    #[must_use]
    pub fn with_memory_resources(self) -> Self {
        let list = self.list_settings();
        self.with_resource(
            ResourceDescriptor::new(
                "Customer",
                "customers",
                Arc::new(MemoryStorage::<Customer>::new()),
            )
            .with_list_settings(list.clone().searchable(CUSTOMER_SEARCH_FIELDS)),
        )
        .with_resource(
            ResourceDescriptor::new(
                "Product",
                "products",
                Arc::new(MemoryStorage::<Product>::new()),
            )
            .with_list_settings(list.clone().searchable(PRODUCT_SEARCH_FIELDS)),
        )
        .with_resource(
            ResourceDescriptor::new("Order", "orders", Arc::new(MemoryStorage::<Order>::new()))
                .with_list_settings(list.searchable(ORDER_SEARCH_FIELDS)),
        )
    }

    /// Assemble the router and start the activity writer
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> PharmaService {
        let config = self.config;

        let (activity, worker) = match self.sink {
            Some(sink) => {
                let (logger, worker) = ActivityLogger::spawn(sink, &config.activity);
                (logger, Some(worker))
            }
            None => (ActivityLogger::disabled(), None),
        };

        let mut endpoints = vec!["GET /health".to_string(), "GET /ready".to_string()];
        let mut routes = Router::new();
        for mount in self.resources {
            let (mounted, router) = mount(&activity);
            endpoints.extend(mounted);
            routes = routes.merge(router);
        }
        tracing::debug!(endpoints = endpoints.len(), "Routes mounted");

        let health_routes = Router::new()
            .route("/health", get(health::health))
            .route("/ready", get(health::readiness))
            .with_state(AppState::new(config.clone(), activity.clone()));

        let listed: Vec<String> = endpoints.into_iter().take(MAX_LISTED_ENDPOINTS).collect();
        let body_limit = config.body_limit_bytes();

        let router = routes
            .merge(health_routes)
            .fallback(move || {
                let listed = listed.clone();
                async move { ApiError::route_not_found(listed) }
            })
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout(),
            ))
            .layer(from_fn_with_state(
                EnvelopeState::new(body_limit),
                error_envelope,
            ));

        let router = Server::new(config.clone()).layer(router);

        PharmaService {
            config,
            router,
            activity,
            worker,
        }
    }
}

/// An assembled service, ready to serve
pub struct PharmaService {
    config: Config,
    router: Router,
    activity: ActivityLogger,
    worker: Option<ActivityWorker>,
}

impl PharmaService {
    /// The fully layered router
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle to the activity queue
    pub fn activity(&self) -> &ActivityLogger {
        &self.activity
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Split into the router and the activity writer, for callers that
    /// drive the server themselves
    pub fn into_parts(self) -> (Router, Option<ActivityWorker>) {
        (self.router, self.worker)
    }

    /// Serve until SIGINT or SIGTERM, then drain the activity queue
    pub async fn serve(self) -> Result<()> {
        let served = Server::new(self.config)
            .serve_with_shutdown(self.router, shutdown_signal())
            .await;

        if let Some(worker) = self.worker {
            worker.shutdown().await;
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_mounted() {
        let service = ServiceBuilder::new(Config::default())
            .without_activity_log()
            .build();
        let (status, body) = get_json(service.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(!service.activity().is_enabled());
    }

    #[tokio::test]
    async fn test_unknown_route_lists_endpoints() {
        let service = ServiceBuilder::new(Config::default())
            .without_activity_log()
            .with_memory_resources()
            .build();
        let (status, body) = get_json(service.router(), "/api/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Route not found");
        let endpoints = body["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), MAX_LISTED_ENDPOINTS);
        assert_eq!(endpoints[0], "GET /health");
        assert_eq!(endpoints[2], "GET /api/customers");
    }

    #[tokio::test]
    async fn test_list_settings_follow_config() {
        let mut config = Config::default();
        config.pagination.max_limit = 25;
        let builder = ServiceBuilder::new(config);
        assert_eq!(builder.list_settings().max_limit, 25);
    }
}
