//! Health check handlers

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,

    /// Service name
    pub service: String,

    /// Dependency statuses
    pub dependencies: HashMap<String, DependencyStatus>,
}

/// Individual dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Dependency is healthy
    pub healthy: bool,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe; always 200 while the process serves requests
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe
///
/// Returns 503 when the activity writer is configured but no longer
/// accepting entries. A disabled activity log does not affect readiness.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();
    let mut all_ready = true;

    let activity = state.activity();
    let status = if !activity.is_enabled() {
        DependencyStatus {
            healthy: true,
            message: Some("Disabled".to_string()),
        }
    } else if activity.is_accepting() {
        DependencyStatus {
            healthy: true,
            message: Some(format!("Accepting ({} queued)", activity.queued())),
        }
    } else {
        tracing::error!("Activity writer has stopped");
        all_ready = false;
        DependencyStatus {
            healthy: false,
            message: Some("Writer stopped".to_string()),
        }
    };
    dependencies.insert("activity_log".to_string(), status);

    let response = ReadinessResponse {
        ready: all_ready,
        service: state.config().service.name.clone(),
        dependencies,
    };

    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityLogger, MemoryActivitySink};
    use crate::config::Config;
    use std::sync::Arc;

    #[test]
    fn test_health_response_omits_missing_version() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            service: "pharma-service".to_string(),
            version: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "healthy", "service": "pharma-service" }));
    }

    #[tokio::test]
    async fn test_ready_with_disabled_activity_log() {
        let response = readiness(State(AppState::default())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_ready_once_writer_stopped() {
        let config = Config::default();
        let (logger, worker) =
            ActivityLogger::spawn(Arc::new(MemoryActivitySink::new()), &config.activity);
        let state = AppState::new(config, logger);

        let response = readiness(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        worker.shutdown().await;
        let response = readiness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
