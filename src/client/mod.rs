//! Typed client for the task backend REST API.
//!
//! Every operation resolves its bearer token from an injected
//! [`SessionSource`] snapshot rather than querying the auth service per
//! call. One contract covers the whole surface: requests are attempted
//! exactly once, a 401 clears locally stored legacy credentials, task
//! listing degrades to an empty list on 401 while every other operation
//! surfaces [`GatewayError::SessionExpired`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::metrics;
use crate::session::SessionSource;
use crate::store::CredentialStore;

pub mod error;
pub mod models;

pub use error::GatewayError;
pub use models::{
    ChatReply, ChatRequest, CreateTaskRequest, Role, Task, UpdateTaskRequest, User,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

lazy_static! {
    // Collapses doubled path separators without touching the scheme's "//"
    static ref DUPLICATE_SLASHES: Regex = Regex::new(r"([^:]/)/+").unwrap();
}

/// Join a base URL and a resource path with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    DUPLICATE_SLASHES.replace_all(&joined, "$1").into_owned()
}

/// Client for the task backend, bound to a base URL and a session source.
pub struct TaskApiClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionSource>,
    store: Arc<dyn CredentialStore>,
}

impl TaskApiClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<dyn SessionSource>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            session,
            store,
        }
    }

    /// List the current user's tasks.
    ///
    /// A 401 yields an empty list so callers can render an empty state;
    /// the stored legacy credentials are still cleared.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        let user_id = self.require_user_id()?;
        let request = self.request(Method::GET, &format!("api/{}/tasks", user_id));
        let response = self.send("list_tasks", request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.expire_credentials("list_tasks");
            debug!("Task list request was rejected; rendering an empty list");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        self.decode_list(response).await
    }

    /// Create a task for the current user.
    pub async fn create_task(&self, task: &CreateTaskRequest) -> Result<Task, GatewayError> {
        let user_id = self.require_user_id()?;
        let request = self
            .request(Method::POST, &format!("api/{}/tasks", user_id))
            .json(task);
        let response = self.send_authorized("create_task", request).await?;
        self.decode(response).await
    }

    /// Update a task's title, description, or completion flag.
    pub async fn update_task(
        &self,
        task_id: &str,
        changes: &UpdateTaskRequest,
    ) -> Result<Task, GatewayError> {
        let user_id = self.require_user_id()?;
        let request = self
            .request(Method::PUT, &format!("api/{}/tasks/{}", user_id, task_id))
            .json(changes);
        let response = self.send_authorized("update_task", request).await?;
        self.decode(response).await
    }

    /// Delete one of the current user's tasks.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError> {
        let user_id = self.require_user_id()?;
        let request =
            self.request(Method::DELETE, &format!("api/{}/tasks/{}", user_id, task_id));
        self.send_authorized("delete_task", request).await?;
        Ok(())
    }

    /// Set a task's completion flag through the dedicated complete route.
    pub async fn set_task_completed(
        &self,
        task_id: &str,
        completed: bool,
    ) -> Result<Task, GatewayError> {
        let user_id = self.require_user_id()?;
        let request = self
            .request(
                Method::PATCH,
                &format!("api/{}/tasks/{}/complete", user_id, task_id),
            )
            .json(&json!({ "completed": completed }));
        let response = self.send_authorized("set_task_completed", request).await?;
        self.decode(response).await
    }

    /// List every registered user. Requires the admin role server-side.
    pub async fn admin_list_users(&self) -> Result<Vec<User>, GatewayError> {
        let request = self.request(Method::GET, "api/admin/users");
        let response = self.send_authorized("admin_list_users", request).await?;
        self.decode_list(response).await
    }

    /// List one user's tasks. Requires the admin role server-side.
    pub async fn admin_user_tasks(&self, user_id: &str) -> Result<Vec<Task>, GatewayError> {
        let request = self.request(Method::GET, &format!("api/admin/users/{}/tasks", user_id));
        let response = self.send_authorized("admin_user_tasks", request).await?;
        self.decode_list(response).await
    }

    /// Fetch every user's tasks concurrently, keyed by user id.
    ///
    /// Individual fetch failures degrade to an empty list for that user;
    /// the batch itself only fails when the user listing fails.
    pub async fn admin_all_user_tasks(
        &self,
    ) -> Result<HashMap<String, Vec<Task>>, GatewayError> {
        let users = self.admin_list_users().await?;

        let fetches = users.into_iter().map(|user| async move {
            let user_id = user.id;
            match self.admin_user_tasks(&user_id).await {
                Ok(tasks) => (user_id, tasks),
                Err(err) => {
                    warn!(
                        user_id = %user_id,
                        error = %err,
                        "Failed to fetch tasks for user, substituting an empty list"
                    );
                    (user_id, Vec::new())
                }
            }
        });

        Ok(join_all(fetches).await.into_iter().collect())
    }

    /// Delete a user account. Requires the admin role server-side.
    pub async fn admin_delete_user(&self, user_id: &str) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &format!("api/admin/users/{}", user_id));
        self.send_authorized("admin_delete_user", request).await?;
        Ok(())
    }

    /// Change a user's role. Requires the admin role server-side.
    pub async fn admin_set_user_role(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<User, GatewayError> {
        let request = self
            .request(
                Method::PATCH,
                &format!("api/admin/users/{}/role", user_id),
            )
            .json(&json!({ "role": role }));
        let response = self.send_authorized("admin_set_user_role", request).await?;
        self.decode(response).await
    }

    /// Delete a specific task belonging to any user. Admin only.
    pub async fn admin_delete_user_task(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<(), GatewayError> {
        let request = self.request(
            Method::DELETE,
            &format!("api/admin/users/{}/tasks/{}", user_id, task_id),
        );
        self.send_authorized("admin_delete_user_task", request)
            .await?;
        Ok(())
    }

    /// Send a free-text message to the backend assistant.
    pub async fn send_chat_message(&self, message: &str) -> Result<ChatReply, GatewayError> {
        let body = ChatRequest {
            message: message.to_string(),
        };
        let request = self.request(Method::POST, "chat").json(&body);
        let response = self.send_authorized("send_chat_message", request).await?;
        self.decode(response).await
    }

    fn require_user_id(&self) -> Result<String, GatewayError> {
        self.session
            .current_user_id()
            .ok_or(GatewayError::SessionMissing)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = join_url(&self.base_url, path);
        self.client.request(method, url).headers(self.base_headers())
    }

    /// Content type is always JSON; the bearer header rides along only
    /// when the session source holds a token.
    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.session.access_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    warn!("Session token is not a valid header value, sending request without it")
                }
            }
        }

        headers
    }

    /// One network attempt, no retries.
    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                metrics::record_gateway_request(operation, status, started.elapsed());
                debug!(operation = %operation, status = status, "Task backend responded");
                Ok(response)
            }
            Err(err) => {
                metrics::record_gateway_network_failure(operation);
                warn!(operation = %operation, error = %err, "Task backend request failed");
                Err(GatewayError::Network(err))
            }
        }
    }

    /// Send and enforce the session contract: 401 clears legacy
    /// credentials and surfaces `SessionExpired`, any other non-2xx maps
    /// to `RequestFailed`.
    async fn send_authorized(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self.send(operation, request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.expire_credentials(operation);
            return Err(GatewayError::SessionExpired);
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        Ok(response)
    }

    fn expire_credentials(&self, operation: &'static str) {
        metrics::record_gateway_unauthorized(operation);
        if let Err(err) = self.store.clear_legacy_artifacts() {
            warn!(
                operation = %operation,
                error = %err,
                "Failed to clear stored credentials after a 401"
            );
        }
    }

    /// Build a `RequestFailed` from a non-2xx response, preferring the
    /// backend's `detail` field over the generic status reason.
    async fn error_for(&self, response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let fallback = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();

        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
                .unwrap_or(fallback),
            Err(_) => fallback,
        };

        GatewayError::RequestFailed {
            status: status.as_u16(),
            message,
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Decode a list body, coercing anything that is not a JSON array to
    /// an empty list.
    async fn decode_list<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<T>, GatewayError> {
        let body = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;

        if value.is_array() {
            Ok(serde_json::from_value(value)?)
        } else {
            warn!("Expected a JSON array from the task backend, treating response as empty");
            Ok(Vec::new())
        }
    }
}
