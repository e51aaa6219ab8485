//! Typed errors returned by the forum API layer
//!
//! Discourse reports failures as an HTTP status plus a JSON body of the form
//! `{"errors": ["..."], "error_type": "..."}`. The body is classified once,
//! here, into an [`ErrorKind`] so callers route recovery by matching on the
//! kind instead of inspecting message text.

use serde::Deserialize;
use thiserror::Error;

/// Failure classes the client distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request needs a signed-in user (missing or expired credentials)
    AuthRequired,
    /// The server could not be reached
    Network,
    /// Stored credentials or an auth payload could not be decrypted/decoded
    Decryption,
    /// Rate limited, including the consecutive-reply restriction
    ReplyTooSoon,
    /// The resource does not exist
    NotFound,
    /// The server failed (5xx)
    Server,
    /// The server rejected the content (422)
    Validation,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Short label used in logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Network => "network",
            Self::Decryption => "decryption",
            Self::ReplyTooSoon => "reply_too_soon",
            Self::NotFound => "not_found",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by every [`crate::api::ForumApi`] call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Classified failure
    pub kind: ErrorKind,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Server-provided or transport message
    pub message: String,
}

/// Result alias for API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Discourse error body
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

impl ApiError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Attach an HTTP status
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Classify a non-success HTTP response from its status and body text
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .errors
            .first()
            .cloned()
            .or(parsed.error)
            .unwrap_or_else(|| format!("Request failed with status {status}"));

        let kind = classify(status, parsed.error_type.as_deref(), &message);
        Self::new(kind, message).with_status(status)
    }

    /// Whether a draft lookup failure means "there is no draft"
    ///
    /// Discourse answers 404 for an unknown key and some versions 500 for a
    /// key whose draft was already deleted.
    pub fn is_missing_draft(&self) -> bool {
        self.kind == ErrorKind::NotFound
            || (self.kind == ErrorKind::Server && self.status == Some(500))
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::AuthRequired => "Please sign in to continue.".to_string(),
            ErrorKind::Network => {
                "Can't reach the server. Check your connection and try again.".to_string()
            }
            ErrorKind::Decryption => {
                "Stored credentials could not be read. Please sign in again.".to_string()
            }
            ErrorKind::ReplyTooSoon => format!("Slow down a little: {}", self.message),
            ErrorKind::NotFound => "That content no longer exists.".to_string(),
            ErrorKind::Server => "The server had a problem. Please try again.".to_string(),
            ErrorKind::Validation | ErrorKind::Other => self.message.clone(),
        }
    }
}

fn classify(status: u16, error_type: Option<&str>, message: &str) -> ErrorKind {
    match error_type {
        Some("not_logged_in") => return ErrorKind::AuthRequired,
        Some("rate_limit") => return ErrorKind::ReplyTooSoon,
        Some("not_found") => return ErrorKind::NotFound,
        _ => {}
    }

    match status {
        401 => ErrorKind::AuthRequired,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::ReplyTooSoon,
        422 if is_reply_restriction(message) => ErrorKind::ReplyTooSoon,
        422 => ErrorKind::Validation,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Other,
    }
}

/// Discourse reports the consecutive-reply limit as a plain 422 validation
/// error, so this is the one place message text is inspected.
fn is_reply_restriction(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("consecutive") || message.contains("too soon")
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let kind = if err.is_decode() {
            ErrorKind::Other
        } else if let Some(code) = status {
            classify(code, None, "")
        } else {
            ErrorKind::Network
        };

        Self {
            kind,
            status,
            message: err.to_string(),
        }
    }
}
