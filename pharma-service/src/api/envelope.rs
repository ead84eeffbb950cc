//! Error envelope middleware
//!
//! Wraps the whole router. Every response with a 4xx or 5xx status leaves
//! through here: errors raised as [`ApiError`] keep their classification,
//! anything else (405 from the router, 408 from the timeout layer, ...) is
//! wrapped with [`ApiError::from_status`]. The body is replaced by the full
//! envelope including `path` and `method`, and the failure is logged with
//! the request's method, path, query, body, user and request id and the
//! error's source chain.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::error::ApiError;
use crate::context::RequestContext;

/// Request bodies longer than this are truncated in logs
const MAX_LOGGED_BODY: usize = 4096;

/// Settings for [`error_envelope`]
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeState {
    /// Largest request body accepted, in bytes
    pub body_limit: usize,
}

impl EnvelopeState {
    /// Create the middleware state
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }
}

/// Rewrite error responses into the envelope and log them
pub async fn error_envelope(
    State(state): State<EnvelopeState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let ctx = RequestContext::from_headers(request.headers());

    let (request, body) = match buffer_body(request, state.body_limit).await {
        Ok(buffered) => buffered,
        Err(error) => {
            log_failure(&error, &method, &uri, &ctx, None);
            return render(error, &method, &uri, None);
        }
    };

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let error = response
        .extensions()
        .get::<ApiError>()
        .cloned()
        .unwrap_or_else(|| ApiError::from_status(status));

    log_failure(&error, &method, &uri, &ctx, body.as_ref());
    render(error, &method, &uri, Some(response))
}

async fn buffer_body(request: Request, limit: usize) -> Result<(Request, Option<Bytes>), ApiError> {
    if !matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        ApiError::from_status(StatusCode::PAYLOAD_TOO_LARGE)
            .with_source(format!("failed to buffer request body: {e}"))
    })?;

    Ok((Request::from_parts(parts, Body::from(bytes.clone())), Some(bytes)))
}

/// Replace the body of `original` (keeping its other headers) with the envelope
fn render(error: ApiError, method: &Method, uri: &Uri, original: Option<Response>) -> Response {
    let envelope = error.envelope(Some(method.as_str()), Some(uri.path()));
    let mut response = (error.status, Json(envelope)).into_response();

    if let Some(original) = original {
        for (name, value) in original.headers() {
            if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
    }

    response.extensions_mut().insert(error);
    response
}

fn log_failure(
    error: &ApiError,
    method: &Method,
    uri: &Uri,
    ctx: &RequestContext,
    body: Option<&Bytes>,
) {
    let body = body
        .map(|bytes| String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_LOGGED_BODY)]).into_owned())
        .unwrap_or_default();
    let user_id = ctx.user_id.as_deref().unwrap_or("anonymous");
    let chain = error.source_chain().join(" <- ");

    if error.status.is_server_error() {
        tracing::error!(
            error_code = %error.code,
            status = error.status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            body = %body,
            user_id = %user_id,
            request_id = %ctx.request_id,
            source_chain = %chain,
            "Request failed: {}",
            error.message
        );
    } else {
        tracing::warn!(
            error_code = %error.code,
            status = error.status.as_u16(),
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            body = %body,
            user_id = %user_id,
            request_id = %ctx.request_id,
            source_chain = %chain,
            "Request rejected: {}",
            error.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ErrorCode, ErrorEnvelope};
    use axum::{
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/missing",
                get(|| async { ApiError::not_found("Product") }),
            )
            .route("/echo", post(|body: String| async move { body }))
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(from_fn_with_state(EnvelopeState::new(16), error_envelope))
    }

    async fn envelope_of(response: Response) -> ErrorEnvelope {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let response = app()
            .oneshot(axum::http::Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_error_gets_path_and_method() {
        let response = app()
            .oneshot(axum::http::Request::get("/missing?x=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let envelope = envelope_of(response).await;
        assert_eq!(envelope.error, ErrorCode::NotFound);
        assert_eq!(envelope.message, "Product not found");
        assert_eq!(envelope.path.as_deref(), Some("/missing"));
        assert_eq!(envelope.method.as_deref(), Some("GET"));
    }

    #[tokio::test]
    async fn test_foreign_error_status_is_wrapped() {
        let response = app()
            .oneshot(axum::http::Request::get("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let envelope = envelope_of(response).await;
        assert_eq!(envelope.error, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_buffered_body_still_reaches_handler() {
        let response = app()
            .oneshot(
                axum::http::Request::post("/echo")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let response = app()
            .oneshot(
                axum::http::Request::post("/echo")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let envelope = envelope_of(response).await;
        assert_eq!(envelope.path.as_deref(), Some("/echo"));
        assert_eq!(envelope.method.as_deref(), Some("POST"));
    }
}
