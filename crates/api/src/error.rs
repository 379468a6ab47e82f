// crates/api/src/error.rs
use thiserror::Error;
use ticketflow_types::EnvelopeError;

/// Failures surfaced by the repository client.
///
/// Transport and application failures are distinct kinds on purpose:
/// transport errors get a generic message and are never retried,
/// application errors carry whatever the server said.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a usable response.
    #[error("server error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with errorCode != 0, or success with no payload.
    #[error("{message}")]
    Api { code: i32, message: String },

    /// 401 response. The shared token store has already been cleared.
    #[error("authentication required")]
    Unauthorized,
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// The message a view should show for this failure, given the
    /// operation's generic fallback text.
    pub fn user_message(&self, transport_fallback: &str) -> String {
        match self {
            ApiError::Api { message, .. } => message.clone(),
            ApiError::Unauthorized => "Your session has expired. Please sign in again.".into(),
            ApiError::Transport(_) => transport_fallback.into(),
        }
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        ApiError::Api {
            code: err.code,
            message: err.message,
        }
    }
}
