// crates/types/src/envelope.rs
//! The uniform `{data, msgError, errorCode}` response envelope.
//!
//! `errorCode == 0` is the sole success signal; callers must also see a
//! non-null `data` before trusting the payload. Both checks live in
//! [`ApiEnvelope::into_result`] so no call site can forget one of them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level failure reported inside an otherwise-successful
/// transport round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EnvelopeError {
    pub code: i32,
    pub message: String,
}

/// Response envelope carried by every REST call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default = "none")]
    pub data: Option<T>,
    /// Nullable on the wire; absent, null and "" all mean "no message".
    #[serde(default)]
    pub msg_error: Option<String>,
    pub error_code: i32,
}

// `#[serde(default)]` on `data` would require `T: Default`; this doesn't.
fn none<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    /// Unwrap the payload, checking both the error code and data presence.
    ///
    /// `fallback` is the per-operation message used when the server sent a
    /// failure without one, or claimed success with a null payload.
    pub fn into_result(self, fallback: &str) -> Result<T, EnvelopeError> {
        if self.error_code != 0 {
            let message = match self.msg_error {
                Some(m) if !m.is_empty() => m,
                _ => fallback.to_string(),
            };
            return Err(EnvelopeError {
                code: self.error_code,
                message,
            });
        }

        self.data.ok_or_else(|| EnvelopeError {
            code: 0,
            message: fallback.to_string(),
        })
    }
}

/// List-call envelope: the plain envelope plus a total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    #[serde(flatten)]
    pub envelope: ApiEnvelope<T>,
    #[serde(default)]
    pub total_count: i64,
}

impl<T> PageEnvelope<T> {
    /// Unwrap payload and total count together. A missing totalCount falls
    /// back to zero; the caller may substitute the page length.
    pub fn into_result(self, fallback: &str) -> Result<(T, i64), EnvelopeError> {
        let total = self.total_count;
        self.envelope.into_result(fallback).map(|data| (data, total))
    }
}
