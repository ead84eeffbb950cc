//! Request tracking layers
//!
//! Every request gets an `x-request-id` (kept when the caller sent one),
//! the id is echoed on the response, and credential headers are marked
//! sensitive so the trace layer never prints them.

use http::header::{self, HeaderName};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
};

use crate::context::MakeRequestUuidV7;

/// Sensitive headers that should be masked in logs
pub const SENSITIVE_HEADERS: [HeaderName; 4] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::SET_COOKIE,
    HeaderName::from_static("x-api-key"),
];

/// Assign a UUIDv7 `x-request-id` to requests that arrive without one
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuidV7> {
    SetRequestIdLayer::x_request_id(MakeRequestUuidV7)
}

/// Copy `x-request-id` from the request onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS)
}
