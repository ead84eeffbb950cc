//! Axum extractors that apply a [`Schema`] to part of the request
//!
//! Each extractor runs before the handler body, so a handler never sees
//! unvalidated input and never touches storage for an invalid request.

use std::collections::HashMap;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde_json::{Map, Value};

use super::{InputSource, Schema, ValidationErrors};
use crate::api::ApiError;

/// Validated JSON body
///
/// A body that is not JSON at all is reported as a single root-level
/// `invalid_json` violation under `validation_error`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Schema + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(ApiError::from_json_rejection)?;

        T::parse(&value)
            .map(ValidJson)
            .map_err(|errors| ApiError::validation(InputSource::Body, errors))
    }
}

/// Validated query string
///
/// Every query value arrives as a string; schemas coerce as needed.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: Schema + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::validation(
                    InputSource::Query,
                    ValidationErrors::single("", "invalid_query", rejection.body_text()),
                )
            })?;

        T::parse(&string_map(raw))
            .map(ValidQuery)
            .map_err(|errors| ApiError::validation(InputSource::Query, errors))
    }
}

/// Validated route parameters
#[derive(Debug, Clone)]
pub struct ValidPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: Schema + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::validation(
                    InputSource::Params,
                    ValidationErrors::single("", "invalid_params", rejection.body_text()),
                )
            })?;

        T::parse(&string_map(raw))
            .map(ValidPath)
            .map_err(|errors| ApiError::validation(InputSource::Params, errors))
    }
}

fn string_map(raw: HashMap<String, String>) -> Value {
    Value::Object(
        raw.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<String, Value>>(),
    )
}
