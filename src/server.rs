/// Server setup and initialization
///
/// Wires together the runtime engine, the compiled route table and the HTTP
/// routes. Provides the application factory used by `apia serve` and tests.

use crate::{
    api::{routes::cors, create_flow_routes, RuntimeState},
    config::Config,
    flow::{RouteTable, RouterConfig},
    runtime::RuntimeEngine,
};
use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the Axum application for a build directory
///
/// Fails when the masterlist or global configuration cannot be read. A
/// missing router configuration only disables flow routes.
pub fn create_app(config: &Config) -> Result<Router> {
    let build_dir = PathBuf::from(&config.build.build_dir);

    tracing::info!("🚀 Initializing flow runtime");
    let engine = RuntimeEngine::initialize(&build_dir, &config.runtime)
        .context("Failed to initialize flow runtime")?;

    tracing::info!("🔗 Loading route table");
    let routes = match RouterConfig::load(&build_dir)? {
        Some(router) => router.compile(),
        None => {
            tracing::warn!("⚠️ No router config found, no flow routes registered");
            RouteTable::default()
        }
    };
    tracing::info!("✅ {} flow routes registered", routes.len());

    let reported_dir = std::fs::canonicalize(&build_dir).unwrap_or_else(|_| build_dir.clone());
    let state = RuntimeState {
        engine: Arc::new(engine),
        routes: Arc::new(routes),
        build_dir: reported_dir.display().to_string(),
    };

    tracing::info!("📡 Creating HTTP router");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_flow_routes())
        .layer(middleware::from_fn(cors))
        .with_state(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing::info!("Starting APIA runtime...");

    let app = create_app(&config)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
