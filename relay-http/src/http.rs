use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use relay_core::{EngineClient, InvokeOptions, PermissionMode};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::apis::{chat, sessions};
use crate::session::{SessionPersist, SessionStore, SessionStoreConfig};

const DEFAULT_ALLOWED_TOOLS: &[&str] = &["Read", "Write", "Edit", "Glob", "Grep", "Bash"];

/// Engine options applied to every chat invocation
#[derive(Clone, Debug)]
pub struct ChatDefaults {
    /// Used when a request does not name a working directory
    pub working_dir: PathBuf,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    /// Fixed system prompt addition; when unset, the engine is told the working directory.
    pub system_prompt_append: Option<String>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(|t| t.to_string()).collect(),
            permission_mode: PermissionMode::AcceptEdits,
            system_prompt_append: None,
        }
    }
}

impl ChatDefaults {
    pub fn invoke_options(&self, working_dir: Option<PathBuf>, resume: Option<String>) -> InvokeOptions {
        let cwd = working_dir.unwrap_or_else(|| self.working_dir.clone());
        let append = self.system_prompt_append.clone().unwrap_or_else(|| {
            format!(
                "You are a coding assistant. The current working directory is: {}",
                cwd.display()
            )
        });

        InvokeOptions::new(cwd)
            .with_allowed_tools(self.allowed_tools.iter().cloned())
            .with_permission_mode(self.permission_mode)
            .with_resume(resume)
            .with_system_prompt_append(append)
    }
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub chat: ChatDefaults,
    pub sessions: SessionStoreConfig,
    /// Folder for session files; `None` keeps sessions in memory only
    pub persist_folder: Option<PathBuf>,
    /// How often idle sessions are swept
    pub eviction_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            chat: ChatDefaults::default(),
            sessions: SessionStoreConfig::default(),
            persist_folder: None,
            eviction_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from `RELAY_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the configuration from a variable lookup. Unset and empty
    /// variables keep their defaults.
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("RELAY_HTTP_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("invalid RELAY_HTTP_ADDR: {}", addr))?;
        }
        if let Some(dir) = var("RELAY_WORKING_DIR") {
            config.chat.working_dir = PathBuf::from(dir);
        }
        if let Some(tools) = var("RELAY_ALLOWED_TOOLS") {
            config.chat.allowed_tools = tools
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(mode) = var("RELAY_PERMISSION_MODE") {
            config.chat.permission_mode = mode
                .parse::<PermissionMode>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("invalid RELAY_PERMISSION_MODE")?;
        }
        config.chat.system_prompt_append = var("RELAY_SYSTEM_PROMPT_APPEND");

        if let Some(max) = var("RELAY_MAX_SESSIONS") {
            let max: usize = max.parse().context("invalid RELAY_MAX_SESSIONS")?;
            config.sessions.max_sessions = (max > 0).then_some(max);
        }
        if let Some(secs) = var("RELAY_SESSION_IDLE_SECS") {
            let secs: u64 = secs.parse().context("invalid RELAY_SESSION_IDLE_SECS")?;
            config.sessions.idle_timeout = Some(Duration::from_secs(secs));
            config.eviction_interval = Duration::from_secs(secs.clamp(1, 60));
        }

        let persist_enabled = var("RELAY_SESSION_PERSIST_ENABLE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        if persist_enabled {
            config.persist_folder = Some(
                var("RELAY_SESSION_PERSIST_FOLDER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".relay/sessions")),
            );
        }

        Ok(config)
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ServerState {
    pub sessions: SessionStore,
    pub engine: Arc<dyn EngineClient>,
    pub chat: Arc<ChatDefaults>,
}

impl ServerState {
    pub fn new(sessions: SessionStore, engine: Arc<dyn EngineClient>, chat: ChatDefaults) -> Self {
        Self {
            sessions,
            engine,
            chat: Arc::new(chat),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/sessions",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/chat", post(chat::handle_chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then drain in-flight requests
pub async fn start_server(config: ServerConfig, engine: Arc<dyn EngineClient>) -> anyhow::Result<()> {
    let store = match &config.persist_folder {
        Some(folder) => SessionStore::with_persist(config.sessions.clone(), SessionPersist::new(folder)),
        None => SessionStore::new(config.sessions.clone()),
    };
    let _eviction = store.spawn_eviction_task(config.eviction_interval);

    info!("Engine: {}", engine.name());
    info!("Working directory: {}", config.chat.working_dir.display());
    info!("Permission mode: {}", config.chat.permission_mode);

    let state = ServerState::new(store, engine, config.chat.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!("Relay server running on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
