//! CLI module for the taskgate command-line interface.
//!
//! Provides subcommands for driving a running task backend through the
//! gateway client:
//! - `status` - Probe the backend's health and readiness endpoints
//! - `tasks ...` - Manage the signed-in user's tasks
//! - `admin ...` - User and task oversight (admin sessions only)
//! - `chat <message>` - Send a message to the backend assistant
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::AuthServiceClient;
use crate::client::{CreateTaskRequest, GatewayError, Role, Task, TaskApiClient, UpdateTaskRequest};
use crate::config::Config;
use crate::health::HealthMonitor;
use crate::session::{SessionProvider, SessionSource, StaticSession};
use crate::store;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "taskgate")]
#[command(author, version, about = "Session-aware gateway client and health sidecar for the task service", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "taskgate.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Skip startup self-checks (for development only)
    #[arg(long)]
    pub skip_checks: bool,

    /// Task backend URL (overrides the config file)
    #[arg(long, env = "TASKGATE_API_URL")]
    pub api_url: Option<String>,

    /// Auth service URL (overrides the config file)
    #[arg(long, env = "TASKGATE_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Bearer token (can also be set via TASKGATE_TOKEN env var)
    #[arg(long, env = "TASKGATE_TOKEN")]
    pub token: Option<String>,

    /// Act as this user id instead of resolving it from the auth service
    #[arg(long, env = "TASKGATE_USER_ID")]
    pub user: Option<String>,

    /// Subcommand to run (if none, starts the health sidecar)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show backend health and readiness
    Status,

    /// Task management commands
    #[command(subcommand)]
    Tasks(TasksCommands),

    /// Admin commands (require an admin session)
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Send a message to the backend assistant
    Chat {
        /// Free-text instruction, e.g. "add buy milk to my list"
        message: String,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Tasks subcommands
#[derive(Subcommand, Debug)]
pub enum TasksCommands {
    /// List your tasks
    List,
    /// Create a task
    Add {
        /// Task title
        title: String,
        /// Optional longer description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Mark a task as completed
    Done {
        /// Task ID
        task: String,
    },
    /// Reopen a completed task
    Reopen {
        /// Task ID
        task: String,
    },
    /// Change a task's title or description
    Edit {
        /// Task ID
        task: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a task
    Rm {
        /// Task ID
        task: String,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// List all registered users
    Users,
    /// List one user's tasks
    Tasks {
        /// User ID
        user: String,
    },
    /// Show task counts across all users
    Overview,
    /// Change a user's role
    SetRole {
        /// User ID
        user: String,
        /// New role: "user" or "admin"
        role: String,
    },
    /// Delete a user account
    RmUser {
        /// User ID
        user: String,
    },
    /// Delete a specific user's task
    RmTask {
        /// User ID
        user: String,
        /// Task ID
        task: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Load the config file and apply the URL flags on top.
pub fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;
    if let Some(url) = &cli.api_url {
        config.backend.url = url.clone();
    }
    if let Some(url) = &cli.auth_url {
        config.auth.url = url.clone();
    }
    Ok(config)
}

/// Build the session source for this invocation.
///
/// An explicit `--user` wins over asking the auth service; a bare
/// `--token` resolves the signed-in user through one session fetch.
async fn resolve_session(cli: &Cli, auth_url: &str) -> Result<Arc<dyn SessionSource>> {
    match (&cli.token, &cli.user) {
        (Some(token), Some(user)) => Ok(Arc::new(StaticSession::new(token, user))),
        (Some(token), None) => {
            let backend = Arc::new(AuthServiceClient::new(auth_url, Some(token.clone())));
            let provider = Arc::new(SessionProvider::new(backend));
            let state = provider.refresh().await;

            if let Some(err) = &state.error {
                anyhow::bail!("Could not resolve the session from {}: {}", auth_url, err);
            }
            if !state.is_authenticated() {
                anyhow::bail!(
                    "The auth service did not recognize the token. Sign in again, or pass --user to skip session resolution."
                );
            }
            Ok(provider)
        }
        (None, Some(user)) => Ok(Arc::new(StaticSession::user_only(user))),
        (None, None) => Ok(Arc::new(StaticSession::anonymous())),
    }
}

/// Build a gateway client bound to the effective config and session.
async fn build_gateway(cli: &Cli) -> Result<TaskApiClient> {
    let config = effective_config(cli)?;
    let session = resolve_session(cli, &config.auth.url).await?;
    let store = store::open_store(&config.storage);
    Ok(TaskApiClient::new(config.backend.url, session, store))
}

/// Attach recovery advice to gateway failures: credentials for auth
/// failures, a retry hint for transient backend trouble.
fn describe(err: GatewayError) -> anyhow::Error {
    if err.is_auth_failure() {
        anyhow::anyhow!(
            "{}. Use --token or set the TASKGATE_TOKEN environment variable.",
            err
        )
    } else if err.is_transient() {
        anyhow::anyhow!(
            "{}. The task backend looks temporarily unavailable; retry in a moment.",
            err
        )
    } else {
        anyhow::Error::new(err)
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::Tasks(TasksCommands::List)) => cmd_tasks_list(cli).await,
        Some(Commands::Tasks(TasksCommands::Add { title, description })) => {
            cmd_tasks_add(cli, title, description.as_deref()).await
        }
        Some(Commands::Tasks(TasksCommands::Done { task })) => {
            cmd_tasks_set_completed(cli, task, true).await
        }
        Some(Commands::Tasks(TasksCommands::Reopen { task })) => {
            cmd_tasks_set_completed(cli, task, false).await
        }
        Some(Commands::Tasks(TasksCommands::Edit {
            task,
            title,
            description,
        })) => cmd_tasks_edit(cli, task, title.clone(), description.clone()).await,
        Some(Commands::Tasks(TasksCommands::Rm { task })) => cmd_tasks_rm(cli, task).await,
        Some(Commands::Admin(AdminCommands::Users)) => cmd_admin_users(cli).await,
        Some(Commands::Admin(AdminCommands::Tasks { user })) => cmd_admin_tasks(cli, user).await,
        Some(Commands::Admin(AdminCommands::Overview)) => cmd_admin_overview(cli).await,
        Some(Commands::Admin(AdminCommands::SetRole { user, role })) => {
            cmd_admin_set_role(cli, user, role).await
        }
        Some(Commands::Admin(AdminCommands::RmUser { user })) => cmd_admin_rm_user(cli, user).await,
        Some(Commands::Admin(AdminCommands::RmTask { user, task })) => {
            cmd_admin_rm_task(cli, user, task).await
        }
        Some(Commands::Chat { message }) => cmd_chat(cli, message).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli).await,
        None => {
            // No subcommand means start the sidecar - handled in main.rs
            Ok(())
        }
    }
}

/// Probe and display backend health and readiness
async fn cmd_status(cli: &Cli) -> Result<()> {
    let config = effective_config(cli)?;
    let monitor = HealthMonitor::from_config(&config.backend.url, &config.health);

    println!("Probing task backend at {}...", config.backend.url);

    let health = monitor.check_health().await;
    let ready = monitor.check_ready().await;

    println!();
    println!("=== Task Backend Status ===");
    println!();
    println!("Gateway:    taskgate v{}", env!("CARGO_PKG_VERSION"));
    println!("Backend:    {}", config.backend.url);
    println!("Auth:       {}", config.auth.url);
    println!();
    println!("Probes:");
    print_probe(
        "Health",
        health.is_healthy(),
        if health.is_healthy() { "healthy" } else { "unhealthy" },
        health.response_time_ms,
    );
    print_probe(
        "Readiness",
        ready.is_ready(),
        if ready.is_ready() { "ready" } else { "not ready" },
        ready.response_time_ms,
    );
    println!();

    Ok(())
}

fn print_probe(name: &str, passed: bool, wording: &str, elapsed_ms: u64) {
    let icon = if passed { "[OK]" } else { "[!!]" };
    println!("  {} {:<12} {} ({} ms)", icon, name, wording, elapsed_ms);
}

/// List the signed-in user's tasks
async fn cmd_tasks_list(cli: &Cli) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let tasks = gateway.list_tasks().await.map_err(describe)?;

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!();
    print_task_table(&tasks);
    println!();
    Ok(())
}

fn print_task_table(tasks: &[Task]) {
    println!(
        "{:<36}  {:<6}  {:<40}  {:<10}",
        "ID", "DONE", "TITLE", "CREATED"
    );
    println!("{}", "-".repeat(100));

    for task in tasks {
        let done = if task.completed { "[x]" } else { "[ ]" };
        let created = task.created_at.get(..10).unwrap_or(&task.created_at);
        println!(
            "{:<36}  {:<6}  {:<40}  {:<10}",
            task.id,
            done,
            truncate(&task.title, 40),
            created
        );
    }
}

/// Create a task
async fn cmd_tasks_add(cli: &Cli, title: &str, description: Option<&str>) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let task = gateway
        .create_task(&CreateTaskRequest {
            title: title.to_string(),
            description: description.map(String::from),
        })
        .await
        .map_err(describe)?;

    println!();
    println!("[OK] Task created!");
    println!();
    println!("ID:          {}", task.id);
    println!("Title:       {}", task.title);
    if let Some(description) = &task.description {
        println!("Description: {}", description);
    }
    println!();
    Ok(())
}

/// Complete or reopen a task
async fn cmd_tasks_set_completed(cli: &Cli, task_id: &str, completed: bool) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let task = gateway
        .set_task_completed(task_id, completed)
        .await
        .map_err(describe)?;

    let wording = if task.completed { "completed" } else { "reopened" };
    println!("[OK] Task '{}' {}.", task.title, wording);
    Ok(())
}

/// Edit a task's title or description
async fn cmd_tasks_edit(
    cli: &Cli,
    task_id: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if title.is_none() && description.is_none() {
        anyhow::bail!("Nothing to change. Pass --title and/or --description.");
    }

    let gateway = build_gateway(cli).await?;
    let task = gateway
        .update_task(
            task_id,
            &UpdateTaskRequest {
                title,
                description,
                completed: None,
            },
        )
        .await
        .map_err(describe)?;

    println!();
    println!("[OK] Task updated!");
    println!();
    println!("ID:          {}", task.id);
    println!("Title:       {}", task.title);
    if let Some(description) = &task.description {
        println!("Description: {}", description);
    }
    println!();
    Ok(())
}

/// Delete a task
async fn cmd_tasks_rm(cli: &Cli, task_id: &str) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    gateway.delete_task(task_id).await.map_err(describe)?;
    println!("[OK] Task {} deleted.", task_id);
    Ok(())
}

/// List all registered users
async fn cmd_admin_users(cli: &Cli) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let users = gateway.admin_list_users().await.map_err(describe)?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<20}  {:<28}  {:<6}  {:<6}",
        "ID", "NAME", "EMAIL", "ROLE", "ACTIVE"
    );
    println!("{}", "-".repeat(104));

    for user in &users {
        let active = if user.is_active { "yes" } else { "no" };
        println!(
            "{:<36}  {:<20}  {:<28}  {:<6}  {:<6}",
            user.id,
            truncate(&user.name, 20),
            truncate(&user.email, 28),
            user.role,
            active
        );
    }

    println!();
    println!("{} user(s).", users.len());
    println!();
    Ok(())
}

/// List one user's tasks
async fn cmd_admin_tasks(cli: &Cli, user_id: &str) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let tasks = gateway.admin_user_tasks(user_id).await.map_err(describe)?;

    if tasks.is_empty() {
        println!("User {} has no tasks.", user_id);
        return Ok(());
    }

    println!();
    println!("=== Tasks for user {} ===", user_id);
    println!();
    print_task_table(&tasks);
    println!();
    Ok(())
}

/// Show task counts across all users
async fn cmd_admin_overview(cli: &Cli) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let by_user = gateway.admin_all_user_tasks().await.map_err(describe)?;

    println!();
    println!("=== Task Overview ===");
    println!();
    println!("{:<36}  {:>6}  {:>6}  {:>6}", "USER", "TOTAL", "OPEN", "DONE");
    println!("{}", "-".repeat(60));

    let mut user_ids: Vec<&String> = by_user.keys().collect();
    user_ids.sort();

    let mut total = 0;
    for user_id in user_ids {
        let tasks = &by_user[user_id];
        let done = tasks.iter().filter(|t| t.completed).count();
        let open = tasks.len() - done;
        total += tasks.len();
        println!(
            "{:<36}  {:>6}  {:>6}  {:>6}",
            user_id,
            tasks.len(),
            open,
            done
        );
    }

    println!();
    println!("{} task(s) across {} user(s).", total, by_user.len());
    println!();
    Ok(())
}

/// Change a user's role
async fn cmd_admin_set_role(cli: &Cli, user_id: &str, role: &str) -> Result<()> {
    let role: Role = role
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Role must be \"user\" or \"admin\"")?;

    let gateway = build_gateway(cli).await?;
    let user = gateway
        .admin_set_user_role(user_id, role)
        .await
        .map_err(describe)?;

    println!("[OK] {} is now {}.", user.email, user.role);
    Ok(())
}

/// Delete a user account
async fn cmd_admin_rm_user(cli: &Cli, user_id: &str) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    gateway.admin_delete_user(user_id).await.map_err(describe)?;
    println!("[OK] User {} deleted.", user_id);
    Ok(())
}

/// Delete a specific user's task
async fn cmd_admin_rm_task(cli: &Cli, user_id: &str, task_id: &str) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    gateway
        .admin_delete_user_task(user_id, task_id)
        .await
        .map_err(describe)?;
    println!("[OK] Task {} deleted for user {}.", task_id, user_id);
    Ok(())
}

/// Send a message to the backend assistant
async fn cmd_chat(cli: &Cli, message: &str) -> Result<()> {
    let gateway = build_gateway(cli).await?;
    let reply = gateway.send_chat_message(message).await.map_err(describe)?;

    if !reply.success {
        println!("[!!] The assistant reported a failure.");
    }
    println!();
    println!("{}", reply.response);
    println!();
    Ok(())
}

/// Validate configuration file
async fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the sidecar.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:          {}", config.server.host);
            println!("  Port:          {}", config.server.port);
            println!();
            println!("Peers:");
            println!("  Backend URL:   {}", config.backend.url);
            println!("  Auth URL:      {}", config.auth.url);
            println!();
            println!("Health:");
            println!("  Probe Timeout: {}s", config.health.probe_timeout_secs);
            println!();
            println!("Storage:");
            match &config.storage.data_dir {
                Some(dir) => println!("  Data Dir:      {}", dir.display()),
                None => println!("  Data Dir:      (in-memory)"),
            }
            println!();
            println!("Logging:");
            println!("  Level:         {}", config.logging.level);
            println!();

            let mut warnings = Vec::new();

            if config.storage.data_dir.is_none() {
                warnings.push(
                    "No data directory set - credential artifacts will not survive restarts",
                );
            }
            if reqwest::Url::parse(&config.backend.url).is_err() {
                warnings.push("Backend URL does not parse - the sidecar will refuse to start");
            }
            if reqwest::Url::parse(&config.auth.url).is_err() {
                warnings.push("Auth URL does not parse - the sidecar will refuse to start");
            }

            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Truncate a string to max length with ellipsis. Counts chars, not bytes,
/// so task titles are never sliced inside a multi-byte character.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn nested_subcommands_parse() {
        let cli = Cli::parse_from([
            "taskgate",
            "tasks",
            "add",
            "Buy milk",
            "--description",
            "Two liters",
        ]);
        match cli.command {
            Some(Commands::Tasks(TasksCommands::Add { title, description })) => {
                assert_eq!(title, "Buy milk");
                assert_eq!(description.as_deref(), Some("Two liters"));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["taskgate", "admin", "set-role", "u7", "admin"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Admin(AdminCommands::SetRole { .. }))
        ));

        let cli = Cli::parse_from(["taskgate", "--token", "tok", "chat", "hello"]);
        assert_eq!(cli.token.as_deref(), Some("tok"));
        assert!(matches!(cli.command, Some(Commands::Chat { .. })));
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["taskgate"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("taskgate.toml"));
    }

    #[tokio::test]
    async fn explicit_user_and_token_skip_the_auth_service() {
        let cli = Cli::parse_from(["taskgate", "--token", "tok-1", "--user", "u-9", "status"]);
        // Unreachable auth URL: any fetch attempt would fail loudly
        let session = resolve_session(&cli, "http://127.0.0.1:9").await.unwrap();
        assert_eq!(session.access_token(), Some("tok-1".to_string()));
        assert_eq!(session.current_user_id(), Some("u-9".to_string()));
    }

    #[tokio::test]
    async fn bare_token_resolves_the_user_via_the_auth_service() {
        let auth = spawn_stub(Router::new().route(
            "/api/auth/get-session",
            get(|| async {
                Json(serde_json::json!({
                    "session": {
                        "token": "tok-live",
                        "userId": "u-42",
                        "expiresAt": "2099-01-01T00:00:00.000Z"
                    },
                    "user": {
                        "id": "u-42",
                        "name": "Ama",
                        "email": "ama@example.com",
                        "role": "user"
                    }
                }))
            }),
        ))
        .await;

        let cli = Cli::parse_from(["taskgate", "--token", "tok-live", "tasks", "list"]);
        let session = resolve_session(&cli, &auth).await.unwrap();
        assert_eq!(session.current_user_id(), Some("u-42".to_string()));
        assert_eq!(session.access_token(), Some("tok-live".to_string()));
    }

    #[tokio::test]
    async fn unrecognized_token_is_a_clear_error() {
        let auth = spawn_stub(Router::new().route(
            "/api/auth/get-session",
            get(|| async { Json(serde_json::Value::Null) }),
        ))
        .await;

        let cli = Cli::parse_from(["taskgate", "--token", "stale", "tasks", "list"]);
        let err = resolve_session(&cli, &auth).await.err().unwrap();
        assert!(err.to_string().contains("did not recognize the token"));
    }

    #[tokio::test]
    async fn task_commands_drive_the_gateway() {
        let created: Arc<Mutex<Vec<Task>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = created.clone();

        let router = Router::new().route(
            "/api/:user_id/tasks",
            post(
                move |Path(user_id): Path<String>, Json(body): Json<serde_json::Value>| {
                    let sink = sink.clone();
                    async move {
                        let task = Task {
                            id: uuid::Uuid::new_v4().to_string(),
                            title: body["title"].as_str().unwrap_or_default().to_string(),
                            description: body["description"].as_str().map(String::from),
                            completed: false,
                            created_at: "2025-03-01T10:00:00".to_string(),
                            user_id,
                        };
                        sink.lock().push(task.clone());
                        Json(task)
                    }
                },
            ),
        );
        let backend = spawn_stub(router).await;

        let cli = Cli::parse_from([
            "taskgate",
            "--api-url",
            &backend,
            "--token",
            "tok",
            "--user",
            "u1",
            "tasks",
            "add",
            "Water plants",
        ]);
        cmd_tasks_add(&cli, "Water plants", None).await.unwrap();

        let stored = created.lock();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Water plants");
        assert_eq!(stored[0].user_id, "u1");
    }

    #[tokio::test]
    async fn gateway_auth_failures_carry_token_advice() {
        // No token, no user: task ops fail fast before any network call
        let cli = Cli::parse_from(["taskgate", "--api-url", "http://127.0.0.1:9", "tasks", "list"]);
        let err = cmd_tasks_list(&cli).await.unwrap_err();
        assert!(err.to_string().contains("TASKGATE_TOKEN"));
    }

    #[tokio::test]
    async fn transient_backend_failures_carry_retry_advice() {
        let router = Router::new().route(
            "/api/:user_id/tasks",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
        );
        let backend = spawn_stub(router).await;

        let cli = Cli::parse_from([
            "taskgate",
            "--api-url",
            &backend,
            "--token",
            "tok",
            "--user",
            "u1",
            "tasks",
            "list",
        ]);
        let err = cmd_tasks_list(&cli).await.unwrap_err();
        assert!(err.to_string().contains("retry in a moment"));
    }

    #[test]
    fn truncate_caps_long_strings() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("a-very-long-task-title", 10), "a-very-...");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        // Multi-byte titles must never be sliced mid-character
        let title = "é".repeat(11);
        assert_eq!(truncate(&title, 10), format!("{}...", "é".repeat(7)));
        assert_eq!(truncate("café tasks", 10), "café tasks");
    }
}
