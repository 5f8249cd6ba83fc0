use thiserror::Error;

/// Failure of a remote analysis call.
///
/// `Upstream` renders as `"<status line>: <body>"` (for example
/// `"503 Service Unavailable: model overloaded"`), which is what
/// [`Retryable::is_transient`] inspects.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("{status}: {message}")]
    Upstream { status: String, message: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AiError {
    pub fn upstream(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status: status.into(),
            message: message.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}

/// Status lines that mark an upstream failure as worth retrying.
const TRANSIENT_MARKERS: [&str; 2] = ["503 Service Unavailable", "429 Too Many Requests"];

/// Whether an error message describes an overloaded or rate-limited upstream.
pub fn is_transient_message(message: &str) -> bool {
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

/// Classifies errors for [`crate::retry::with_retry`].
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for AiError {
    fn is_transient(&self) -> bool {
        is_transient_message(&self.to_string())
    }
}
