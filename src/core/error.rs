//! Fault taxonomy for outbound calls
//!
//! Every network boundary (OAuth endpoints, Fleet API, metrics sink) reports
//! failures as an [`ApiError`]. Callers never match on transport details;
//! they ask for the [`FaultKind`] and decide whether to retry the same call,
//! refresh credentials and restart the account, or give up on the unit.

use thiserror::Error;

use super::CredentialError;

/// Coarse classification used by retry predicates and the sweep loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Connection failure, timeout, TLS error or gateway hiccup
    Transport,
    /// Bearer token invalid or expired
    Authorization,
    /// Anything else
    Other,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Transport => write!(f, "transport"),
            FaultKind::Authorization => write!(f, "authorization"),
            FaultKind::Other => write!(f, "other"),
        }
    }
}

/// Errors that can occur when talking to the vehicle cloud or the metrics store
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("API error: {0}")]
    Envelope(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response did not contain an access token")]
    MissingToken,

    #[error("No partner token stored; run `tesla-recorder register` first")]
    NotRegistered,

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Credential store error: {0}")]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    /// Classify this error for retry and restart decisions
    pub fn kind(&self) -> FaultKind {
        match self {
            ApiError::Transport(_) => FaultKind::Transport,
            ApiError::Unauthorized(_) => FaultKind::Authorization,
            _ => FaultKind::Other,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == FaultKind::Transport
    }

    pub fn is_authorization(&self) -> bool {
        self.kind() == FaultKind::Authorization
    }

    /// Map a non-success HTTP status to the matching fault
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = summarize_body(body);
        match status {
            401 => ApiError::Unauthorized(message),
            502..=504 => ApiError::Transport(format!("HTTP {}: {}", status, message)),
            _ => ApiError::Http { status, message },
        }
    }

    /// Map a non-null `error` field in a response envelope
    pub fn from_envelope(error: &str) -> Self {
        if is_token_error(error) {
            ApiError::Unauthorized(error.to_string())
        } else {
            ApiError::Envelope(error.to_string())
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            ApiError::Transport(e.to_string())
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::from_status(status.as_u16(), &e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

fn is_token_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    lower.contains("token expired")
        || lower.contains("invalid bearer token")
        || lower.contains("invalid_token")
        || lower.contains("unauthorized")
}

/// Keep error messages readable when a server returns a page of HTML
fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() > 200 {
        let cut = trimmed
            .char_indices()
            .nth(200)
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        format!("{}...", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiError::from_status(401, "").kind(), FaultKind::Authorization);
        assert_eq!(ApiError::from_status(503, "").kind(), FaultKind::Transport);
        assert_eq!(ApiError::from_status(504, "").kind(), FaultKind::Transport);
        assert_eq!(ApiError::from_status(404, "").kind(), FaultKind::Other);
        assert_eq!(ApiError::from_status(500, "").kind(), FaultKind::Other);
    }

    #[test]
    fn test_envelope_classification() {
        assert!(ApiError::from_envelope("token expired (401)").is_authorization());
        assert!(ApiError::from_envelope("invalid bearer token").is_authorization());
        assert_eq!(
            ApiError::from_envelope("vehicle unavailable").kind(),
            FaultKind::Other
        );
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(500);
        match ApiError::from_status(418, &body) {
            ApiError::Http { status, message } => {
                assert_eq!(status, 418);
                assert_eq!(message.len(), 203);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FaultKind::Transport.to_string(), "transport");
        assert_eq!(FaultKind::Authorization.to_string(), "authorization");
    }
}
