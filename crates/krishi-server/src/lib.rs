//! Krishi Server — HTTP backend for the Krishi farmer-advisory app.
//!
//! Exposes the advisory flows of `krishi-core`:
//! - RESTful HTTP API via axum (`/api/flows/...`)
//! - JSON-RPC 2.0 at `/api/rpc`
//!
//! The router can be embedded in another application through
//! [`build_router`], or served standalone with [`start_server`].

pub mod api;
pub mod rpc;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use krishi_core::config::{load_dotenv, ModelConfig};
use krishi_core::model::{build_client, ModelClient};
use krishi_core::state::{AppState, AppStateInner};
use krishi_core::FlowRegistry;

pub const DEFAULT_LOG_FILTER: &str = "krishi_core=info,krishi_server=info,tower_http=info";

/// Configuration for the Krishi backend server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Extra flow definitions loaded on top of the built-in catalog.
    pub flows_dir: Option<String>,
    /// Model settings YAML. When unset, settings come from the environment.
    pub model_config: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3310,
            flows_dir: None,
            model_config: None,
        }
    }
}

/// Initialise `tracing` with `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .try_init();
}

/// Built-in flows plus the definitions in `flows_dir`. Without a
/// `flows_dir`, `./flows` and `~/.krishi/flows` are scanned instead, and
/// their files may override built-ins of the same name.
pub fn build_registry(flows_dir: Option<&str>) -> Result<FlowRegistry, String> {
    let mut registry = FlowRegistry::with_builtin_flows()
        .map_err(|e| format!("Failed to load built-in flows: {}", e))?;

    match flows_dir {
        Some(dir) => {
            let count = registry
                .load_dir(dir)
                .map_err(|e| format!("Failed to load flows from '{}': {}", dir, e))?;
            tracing::info!("Loaded {} custom flows from {}", count, dir);
        }
        None => {
            registry
                .load_default_dirs()
                .map_err(|e| format!("Failed to load flows from default directories: {}", e))?;
        }
    }

    tracing::info!("Registered flows: {}", registry.names().join(", "));
    Ok(registry)
}

/// Build the flow registry and bind it to a model client. Any malformed flow
/// definition fails here, at startup.
pub fn create_app_state(
    flows_dir: Option<&str>,
    client: Arc<dyn ModelClient>,
) -> Result<AppState, String> {
    let registry = build_registry(flows_dir)?;
    Ok(Arc::new(AppStateInner::new(registry, client)))
}

/// Start the Krishi backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    init_tracing();
    load_dotenv();

    tracing::info!(
        "Starting Krishi backend server on {}:{}",
        config.host,
        config.port
    );

    let model_config = match &config.model_config {
        Some(path) => ModelConfig::from_file(path),
        None => ModelConfig::from_env(),
    }
    .map_err(|e| e.to_string())?;
    let client = build_client(&model_config).map_err(|e| e.to_string())?;

    let registry = build_registry(config.flows_dir.as_deref())?;
    let state = Arc::new(
        AppStateInner::new(registry, client).with_deadline(model_config.deadline()),
    );

    start_server_with_state(config, state).await
}

/// The complete application router, with CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Useful when the caller supplies its own model client (tests, embedding).
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Krishi backend server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "krishi-server",
        "version": env!("CARGO_PKG_VERSION"),
        "flows": state.registry.len(),
    }))
}
