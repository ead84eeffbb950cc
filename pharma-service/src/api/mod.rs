//! HTTP-facing types shared by every resource
//!
//! - [`ApiError`] and [`normalize`]: failure classification and the error envelope
//! - [`envelope`]: middleware that finalizes and logs every error response
//! - [`ListParams`], [`IdParams`], [`ListSettings`]: paging and id parameters
//! - [`ListResponse`], [`Created`], [`NoContent`]: success bodies

pub mod envelope;
mod error;
mod query;
mod response;

pub use envelope::{error_envelope, EnvelopeState};
pub use error::{
    has_integration_marker, normalize, panic_response, ApiError, ErrorCode, ErrorDetails,
    ErrorEnvelope, Failure, INTERNAL_ERROR_MESSAGE,
};
pub use query::{IdParams, ListParams, ListSettings};
pub use response::{Created, ListResponse, NoContent, PaginationMeta};
