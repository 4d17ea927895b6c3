//! Wire types for the task backend's REST surface.

use serde::{Deserialize, Serialize};

/// Account roles recognized by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Check if the role grants access to the admin surface
    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::User)
    }
}

/// A task as returned by the backend. Timestamps stay as the wire strings;
/// the backend emits naive ISO-8601 and parsing is the display layer's call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: String,
    pub user_id: String,
}

/// A user as returned by the admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Get the role as a Role enum
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }
}

// DTOs for the gateway

#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Reply from the backend chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub success: bool,
    pub response: String,
    /// Echo of the message the backend attributed to the user.
    pub user_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn unknown_role_string_falls_back_to_user() {
        assert_eq!(Role::from("moderator".to_string()), Role::User);
        assert!(!Role::from("guest".to_string()).can_administer());
        assert!(Role::from("admin".to_string()).can_administer());
    }

    #[test]
    fn task_deserializes_without_description() {
        let task: Task = serde_json::from_str(
            r#"{
                "id": "t-1",
                "title": "Write report",
                "completed": false,
                "created_at": "2025-03-01T10:00:00.123456",
                "user_id": "u-1",
                "updated_at": "2025-03-01T10:00:00.123456"
            }"#,
        )
        .unwrap();
        assert_eq!(task.title, "Write report");
        assert!(task.description.is_none());
        assert!(!task.completed);
    }

    #[test]
    fn user_defaults_active_when_field_missing() {
        let user: User = serde_json::from_str(
            r#"{
                "id": "u-1",
                "name": "Ama",
                "email": "ama@example.com",
                "role": "admin",
                "created_at": "2025-03-01T10:00:00"
            }"#,
        )
        .unwrap();
        assert!(user.is_active);
        assert_eq!(user.role_enum(), Role::Admin);
    }

    #[test]
    fn update_request_omits_unset_fields() {
        let body = serde_json::to_string(&UpdateTaskRequest {
            completed: Some(true),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, r#"{"completed":true}"#);
    }
}
