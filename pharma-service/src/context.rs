//! Per-request context
//!
//! The acting user is taken from the `x-user-id` header set by the trusted
//! upstream that handles authentication. The request id comes from
//! `x-request-id`, which the server's request-id layer fills in when the
//! client did not send one.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Who is making the request, and which request it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated user, if any
    pub user_id: Option<String>,
    /// Request id used to correlate logs
    pub request_id: String,
}

impl RequestContext {
    /// Resolve the context from request headers
    ///
    /// Blank or non-UTF-8 user ids are treated as anonymous. A missing request
    /// id is replaced by a fresh UUIDv7.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = header_str(headers, USER_ID_HEADER).map(str::to_string);
        let request_id = header_str(headers, REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        Self {
            user_id,
            request_id,
        }
    }

    /// Context for work done on behalf of a known user outside HTTP
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            request_id: Uuid::now_v7().to_string(),
        }
    }

    /// Context with no user; activity is not recorded for it
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            request_id: Uuid::now_v7().to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Generates UUIDv7 request ids, which sort by creation time
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::now_v7().to_string())
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-42"));
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.user_id.as_deref(), Some("user-42"));
        assert_eq!(ctx.request_id, "req-1");
    }

    #[test]
    fn test_blank_user_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));

        let ctx = RequestContext::from_headers(&headers);
        assert!(ctx.user_id.is_none());
        assert!(Uuid::parse_str(&ctx.request_id).is_ok());
    }

    #[test]
    fn test_generated_request_ids_are_uuid_v7() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeRequestUuidV7.make_request_id(&request).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(RequestContext::for_user("u1").user_id.as_deref(), Some("u1"));
        assert!(RequestContext::anonymous().user_id.is_none());
    }
}
