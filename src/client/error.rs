//! Error taxonomy for gateway operations.
//!
//! Every public operation on the gateway client resolves to one of these
//! variants. Callers can match on the variant instead of parsing message
//! strings; the messages mirror what the backend and session layer report.

use thiserror::Error;

/// Errors surfaced by gateway operations against the task backend
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The operation needs the current user's id and no session is cached.
    /// Raised before any network traffic.
    #[error("User session not found")]
    SessionMissing,

    /// The backend answered 401. Legacy credential artifacts have already
    /// been cleared by the time this is returned.
    #[error("Session expired - please sign in again")]
    SessionExpired,

    /// Any other non-success status from the backend.
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// Transport-level failure: connect, timeout, TLS, or a body that
    /// never arrived.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered 2xx but the body did not match the declared
    /// shape for the operation.
    #[error("Invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status associated with the failure, when one was observed
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::SessionExpired => Some(401),
            GatewayError::RequestFailed { status, .. } => Some(*status),
            GatewayError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure means the cached session is no longer usable
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::SessionMissing | GatewayError::SessionExpired
        )
    }

    /// Whether retrying the same call later could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::RequestFailed { status, .. } => {
                matches!(status, 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_the_variant() {
        assert_eq!(GatewayError::SessionMissing.status(), None);
        assert_eq!(GatewayError::SessionExpired.status(), Some(401));
        let err = GatewayError::RequestFailed {
            status: 422,
            message: "Title is required".to_string(),
        };
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn auth_failures_are_not_transient() {
        assert!(GatewayError::SessionExpired.is_auth_failure());
        assert!(!GatewayError::SessionExpired.is_transient());
        let gateway_down = GatewayError::RequestFailed {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert!(gateway_down.is_transient());
        assert!(!gateway_down.is_auth_failure());
    }

    #[test]
    fn display_keeps_the_wire_wording() {
        assert_eq!(
            GatewayError::SessionExpired.to_string(),
            "Session expired - please sign in again"
        );
        assert_eq!(
            GatewayError::SessionMissing.to_string(),
            "User session not found"
        );
    }
}
