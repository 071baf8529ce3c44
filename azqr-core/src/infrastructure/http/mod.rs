//! HTTP pipeline for Azure management APIs
//!
//! Request flow per attempt: throttling permit, bearer token, send with a
//! per-attempt timeout, then classify the response. 408/429/5xx gateway
//! errors and any response carrying `Retry-After` are retried with
//! exponential backoff; other non-2xx responses become [`HttpError`].

mod auth;
mod client;
mod error;
mod retry;

pub use auth::{BearerTokenPolicy, REFRESH_MARGIN_MINUTES};
pub use client::{HttpClient, HttpResponse};
pub use error::{ClientError, HttpError};
pub use retry::{RETRYABLE_STATUS_CODES, RetryOptions, parse_retry_after};
