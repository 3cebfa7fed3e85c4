//! safereads-api - Book content review service
//!
//! Resolves book metadata from Google Books (enriched from Open Library),
//! produces cached content-safety verdicts with an LLM, and gates fresh
//! analyses behind a free quota or a subscription.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use safereads_common::config::{
    database_path, default_config_path, read_toml_config, resolve_root_folder, LoggingConfig,
    TomlConfig,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use safereads_api::config::{resolve_google_books_api_key, resolve_openai_api_key};
use safereads_api::services::{
    AdminAllowList, BookResolver, EntitlementGate, GoogleBooksClient, OpenAiClient,
    OpenLibraryClient, VerdictEngine, VisionModel,
};
use safereads_api::AppState;

/// Command-line arguments for safereads-api
#[derive(Parser, Debug)]
#[command(name = "safereads-api")]
#[command(about = "Book content review service")]
#[command(version)]
struct Args {
    /// Folder holding the SQLite database
    #[arg(short, long, env = "SAFEREADS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to safereads.toml
    #[arg(short, long, env = "SAFEREADS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SAFEREADS_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let (toml_config, config_error) = match read_toml_config(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (TomlConfig::default(), Some(e)),
    };

    init_tracing(&toml_config.logging)?;

    info!("Starting safereads-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match config_error {
        None => info!("Loaded configuration from {}", config_path.display()),
        Some(e) => warn!(
            "Using built-in configuration defaults ({}): {}",
            config_path.display(),
            e
        ),
    }

    // Step 1: Resolve root folder and open the database
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db = safereads_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Step 2: API keys (database -> environment -> TOML)
    let openai_key = resolve_openai_api_key(&db, &toml_config).await?;
    if openai_key.is_none() {
        warn!("Analyses and cover identification are unavailable until an OpenAI key is set");
    }
    let google_books_key = resolve_google_books_api_key(&db, &toml_config).await?;

    // Step 3: Provider clients and services
    let google_books = GoogleBooksClient::new(
        toml_config.google_books_base_url.clone(),
        google_books_key,
        toml_config.retry,
    )?;
    let open_library = OpenLibraryClient::new(
        toml_config.open_library_base_url.clone(),
        toml_config.open_library_covers_url.clone(),
    )?;
    let openai = Arc::new(OpenAiClient::new(
        toml_config.openai_base_url.clone(),
        toml_config.openai_model.clone(),
        openai_key,
    )?);

    let vision: Arc<dyn VisionModel> = openai.clone();
    let resolver = Arc::new(BookResolver::new(
        db.clone(),
        google_books,
        open_library,
        Some(vision),
        toml_config.search_max_results,
    ));
    let engine = Arc::new(VerdictEngine::new(
        db.clone(),
        openai.clone(),
        toml_config.cache_strategy,
    ));
    let entitlement = EntitlementGate::new(db.clone(), toml_config.free_analysis_limit);
    let admins = AdminAllowList::new(&toml_config.admin_emails);

    info!(
        cache_strategy = ?toml_config.cache_strategy,
        free_analysis_limit = toml_config.free_analysis_limit,
        admins = toml_config.admin_emails.len(),
        "Services initialized"
    );

    let state = AppState::new(db, resolver, engine, entitlement, admins)
        .with_openai_client(openai)
        .with_config_path(config_path);

    let app = safereads_api::build_router(state);

    // Step 4: Serve
    let port = args.port.unwrap_or(toml_config.port);
    let addr = format!("{}:{}", args.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Filter precedence: `RUST_LOG`, then `logging.level`
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
