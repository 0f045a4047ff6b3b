//! HTTP request handlers.

pub mod error;
pub mod investigate;

pub use error::{ApiError, ApiResult};
