mod archive;
mod cli;
mod config;
mod controller;
mod dashboard;
mod error;
mod handlers;
mod listing;
mod models;
mod storage;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::controller::FileManager;
use crate::storage::LocalStorage;

pub struct AppState {
    pub manager: FileManager,
    pub config: Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_size;

    Router::new()
        // File manager page (web UI)
        .merge(dashboard::routes())
        // API routes (nestable, no wildcards)
        .nest("/api", handlers::api_routes())
        // Download URLs (wildcard, must be at top level)
        .merge(handlers::object_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bucketdesk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::default();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let command = cli.command.unwrap_or(Commands::Serve { host: None, port: None });
    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
    }

    let storage = match LocalStorage::new(&config.data_dir, &config.base_url()).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ Failed to initialize storage at '{}': {}", config.data_dir, e);
            std::process::exit(1);
        }
    };
    let manager = FileManager::new(Arc::new(storage));

    if matches!(command, Commands::Serve { .. }) {
        if let Err(e) = serve(manager, config).await {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    } else if let Err(e) = cli::run_cli(&manager, command).await {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

async fn serve(manager: FileManager, config: Config) -> std::io::Result<()> {
    tracing::info!("Storage directory: {}", config.data_dir);
    tracing::info!("Starting BucketDesk on http://{}:{}", config.host, config.port);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { manager, config });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        r#"
    ╔═══════════════════════════════════════════════════════╗
    ║   BucketDesk                                          ║
    ║                                                       ║
    ║   Files:  http://{:<34}   ║
    ║   API:    http://{:<34}   ║
    ╚═══════════════════════════════════════════════════════╝
    "#,
        &addr,
        format!("{}/api", &addr)
    );

    axum::serve(listener, app).await
}
