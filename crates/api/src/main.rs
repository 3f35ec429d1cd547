use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retouch_api::config::ServerConfig;
use retouch_api::router::build_app_router;
use retouch_api::state::AppState;
use retouch_db::DatabaseConfig;
use retouch_pipeline::catalog::{CatalogService, PgCatalogStore};
use retouch_pipeline::edit::{EditOrchestrator, EditService};
use retouch_pipeline::rewrite::PromptRewriter;
use retouch_upstream::config::{upstream_timeout_from_env, GeminiConfig, IdeogramConfig, OllamaConfig};
use retouch_upstream::fetch::HttpImageFetcher;
use retouch_upstream::gemini::GeminiClient;
use retouch_upstream::ideogram::IdeogramClient;
use retouch_upstream::ollama::OllamaEmbedder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let db_config = DatabaseConfig::from_env()?;
    let pool = retouch_db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = db_config.max_connections, "Database connection pool created");

    retouch_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    retouch_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // --- Upstream clients ---
    let timeout = upstream_timeout_from_env()?;
    let http = retouch_upstream::build_http_client(timeout).context("Failed to build HTTP client")?;
    let ideogram = Arc::new(IdeogramClient::with_client(http.clone(), IdeogramConfig::from_env()?));
    let gemini = Arc::new(GeminiClient::with_client(http.clone(), GeminiConfig::from_env()?));
    let ollama = Arc::new(OllamaEmbedder::with_client(http.clone(), OllamaConfig::from_env()));
    let fetcher = Arc::new(HttpImageFetcher::with_client(http));
    tracing::info!(timeout_secs = timeout.as_secs(), "Upstream clients configured");
    if config.request_timeout_secs <= 3 * timeout.as_secs() {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            upstream_timeout_secs = timeout.as_secs(),
            "Request timeout may cut off a rewrite-and-edit chain before its upstream timeouts fire"
        );
    }

    // --- Services ---
    let orchestrator = EditOrchestrator::new(ideogram.clone(), gemini.clone());
    let edits = EditService::new(orchestrator, ideogram, fetcher)
        .with_rewriter(PromptRewriter::new(gemini));
    let catalog = CatalogService::new(Arc::new(PgCatalogStore::new(pool)), ollama);

    // --- App state ---
    let state = AppState {
        edits: Arc::new(edits),
        catalog: Arc::new(catalog),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "retouch_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
