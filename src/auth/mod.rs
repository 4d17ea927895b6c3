//! Client for the external authentication service.
//!
//! The auth service owns sign-in, session issuance, and expiry (sessions
//! are valid for seven days from issuance). This module only reads what
//! the service reports: `get-session` returns the live session plus the
//! signed-in user, or nothing when signed out. The wire format is
//! camelCase JSON, unlike the task backend's snake_case.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::client::models::Role;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from session fetch or revocation. Kept cloneable so the session
/// provider can publish them in its state snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Auth service rejected the request: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("Auth service unreachable: {0}")]
    Unreachable(String),

    #[error("Auth service returned an unexpected body: {0}")]
    Malformed(String),
}

/// A live session as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token for the task backend
    pub token: String,
    pub user_id: String,
    /// Absolute expiry as an RFC 3339 timestamp
    pub expires_at: String,
}

impl Session {
    /// Check if the session's absolute expiry has passed
    pub fn is_expired(&self) -> bool {
        if let Ok(expires) = chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            expires < chrono::Utc::now()
        } else {
            true // Treat parse errors as expired
        }
    }
}

/// The signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_role() -> String {
    "user".to_string()
}

fn default_active() -> bool {
    true
}

impl UserSummary {
    /// Get the role as a Role enum
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }
}

/// Session plus user, exactly as `get-session` reports them. Both fields
/// are required: a session is either fully present or fully absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionData {
    pub session: Session,
    pub user: UserSummary,
}

/// Read side of the auth service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Fetch the current session. `Ok(None)` means signed out, which is
    /// not an error.
    async fn fetch_session(&self) -> Result<Option<SessionData>, SessionError>;

    /// Ask the auth service to revoke the current session.
    async fn revoke_session(&self) -> Result<(), SessionError>;
}

/// HTTP client for the auth service's session endpoints. The bearer token
/// is fixed at construction; a new credential means a new client.
pub struct AuthServiceClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl AuthServiceClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.into(),
            token,
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[async_trait]
impl AuthBackend for AuthServiceClient {
    async fn fetch_session(&self) -> Result<Option<SessionData>, SessionError> {
        let url = self.endpoint("api/auth/get-session");
        let mut request = self.client.get(&url);
        if let Some(token) = self.bearer() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            debug!(url = %url, "Auth service reported no active session");
            return Ok(None);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // The service answers `null` when nobody is signed in
        let data: Option<SessionData> = response
            .json()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        Ok(data)
    }

    async fn revoke_session(&self) -> Result<(), SessionError> {
        let url = self.endpoint("api/auth/sign-out");
        let mut request = self.client.post(&url).json(&serde_json::json!({}));
        if let Some(token) = self.bearer() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        let status = response.status();
        // 401 means the session is already gone, which is what we wanted
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(SessionError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
