//! Axum routes over a [`MonkeyManager`].

use crate::error::{ApiError, Result, ServerError};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use mobu_core::{CreateMonkeyRequest, MonkeyDetail, MonkeyManager, MonkeySummary};
use serde::Serialize;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const DEFAULT_NAME: &str = "mobu";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Use port 0 to bind to a random available port.
    pub bind_addr: SocketAddr,
    /// Path prefix every route except `/health` lives under.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            name: DEFAULT_NAME.to_string(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    manager: Arc<MonkeyManager>,
    name: Arc<str>,
}

#[derive(Debug, Serialize)]
struct Index {
    name: String,
    version: &'static str,
    description: &'static str,
}

/// Builds the router. `name` becomes the path prefix, e.g. `/mobu/user`.
pub fn build_router(manager: Arc<MonkeyManager>, name: &str) -> Router {
    let name = name.trim_matches('/');
    let state = AppState {
        manager,
        name: Arc::from(name),
    };

    Router::new()
        .route("/health", get(health_check))
        .route(&format!("/{name}"), get(index))
        .route(&format!("/{name}/user"), get(list_monkeys).post(create_monkey))
        .route(
            &format!("/{name}/user/{{username}}"),
            get(get_monkey).delete(delete_monkey),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves until Ctrl-C or SIGTERM, then stops every monkey.
pub async fn start_server(config: ServerConfig, manager: Arc<MonkeyManager>) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| ServerError::HttpServer(format!("Failed to bind {}: {}", config.bind_addr, e)))?;
    serve(listener, manager, &config.name, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
///
/// Once the listener has drained, every monkey is stopped and its lab torn
/// down before this returns.
pub async fn serve(
    listener: TcpListener,
    manager: Arc<MonkeyManager>,
    name: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    info!("mobu listening on http://{}/{}", local_addr, name.trim_matches('/'));

    let app = build_router(manager.clone(), name);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::HttpServer(format!("Server error: {}", e)));

    info!("Shutting down monkeys");
    manager.shutdown().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index(State(state): State<AppState>) -> Json<Index> {
    Json(Index {
        name: state.name.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        description: "Synthetic users for the science platform",
    })
}

async fn create_monkey(
    State(state): State<AppState>,
    request: std::result::Result<Json<CreateMonkeyRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<MonkeySummary>), ApiError> {
    let Json(request) = request?;
    let monkey = state.manager.spawn(&request).await?;
    Ok((StatusCode::CREATED, Json(monkey.summary())))
}

async fn list_monkeys(State(state): State<AppState>) -> Json<Vec<MonkeySummary>> {
    Json(state.manager.list().await)
}

async fn get_monkey(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> std::result::Result<Json<MonkeyDetail>, ApiError> {
    Ok(Json(state.manager.get(&username).await?))
}

async fn delete_monkey(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> std::result::Result<StatusCode, ApiError> {
    state.manager.delete(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}
