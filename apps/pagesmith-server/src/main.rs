//! Pagesmith Server
//!
//! Accepts PDF uploads and performs page-level operations on them. Provides
//! REST API endpoints for:
//!
//! - Merging several PDFs into one
//! - Splitting at pages, extracting ranges, or splitting into single pages
//! - Removing pages
//! - Downloading results, which expire after a configurable delay
//!
//! ## Architecture
//!
//! Uploads are streamed into a temp directory, processed by `pagesmith-core`
//! on the blocking thread pool, and the result is written back to the temp
//! directory for download. A janitor deletes inputs immediately and results
//! once they expire.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod janitor;
mod state;
mod storage;
#[cfg(test)]
mod tests;
mod upload;

use api::{
    handle_download_merged, handle_download_removed, handle_download_split, handle_health,
    handle_merge, handle_pdf_info, handle_remove_pages, handle_split,
};
use config::ServerConfig;
use state::AppState;

/// Command-line arguments for the pagesmith server
#[derive(Parser, Debug)]
#[command(name = "pagesmith-server")]
#[command(about = "Merge, split and remove pages from uploaded PDFs")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PAGESMITH_PORT", default_value = "5001")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PAGESMITH_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for uploads and results
    #[arg(long, env = "PAGESMITH_TEMP_DIR", default_value = "temp")]
    temp_dir: PathBuf,

    /// Per-file upload limit, e.g. "50MB"
    #[arg(long, env = "FILE_SIZE_LIMIT", default_value = "50MB")]
    file_size_limit: String,

    /// Seconds a result stays downloadable
    #[arg(long, env = "PAGESMITH_CLEANUP_DELAY_SECS", default_value = "3600")]
    cleanup_delay_secs: u64,

    /// Seconds between sweeps of the temp directory
    #[arg(long, env = "PAGESMITH_SWEEP_INTERVAL_SECS", default_value = "600")]
    sweep_interval_secs: u64,

    /// Comma-separated CORS origins; empty allows any origin
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    allowed_origins: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the full router with middleware
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Page operations
        .route("/api/merge-pdf", post(handle_merge))
        .route("/api/split-pdf", post(handle_split))
        .route("/api/remove-pages", post(handle_remove_pages))
        .route("/api/pdf-info", post(handle_pdf_info))
        // Result downloads
        .route("/api/merge-pdf/download/:filename", get(handle_download_merged))
        .route("/api/split-pdf/download/:filename", get(handle_download_split))
        .route(
            "/api/remove-pages/download/:filename",
            get(handle_download_removed),
        )
        // Apply middleware
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .layer(middleware)
        .with_state(state)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::from(Any);
    }

    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pagesmith server on {}:{}", args.host, args.port);

    let config = ServerConfig::new(
        args.temp_dir,
        &args.file_size_limit,
        Duration::from_secs(args.cleanup_delay_secs),
    )
    .with_allowed_origins(&args.allowed_origins);

    let state = AppState::new(config).await?;

    state.janitor.spawn_sweeper(
        state.storage.root().to_path_buf(),
        Duration::from_secs(args.sweep_interval_secs.max(1)),
    );

    info!(
        "Max file size: {} ({} bytes)",
        state.config.max_file_size_label, state.config.max_file_size
    );
    info!("Results expire after {}s", state.config.cleanup_delay.as_secs());
    if state.config.allowed_origins.is_empty() {
        info!("CORS: any origin");
    } else {
        info!("CORS: {}", state.config.allowed_origins.join(", "));
    }

    let app = app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
