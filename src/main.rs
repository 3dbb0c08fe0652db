// src/main.rs - server entry point and user administration
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, reload};

use todo_auto::auth::{Argon2PasswordEncoder, PasswordEncoder};
use todo_auto::config::{self, Config, StorageBackend};
use todo_auto::dao::{DocumentTodoDao, MemoryStore, SqliteStore, TodoDao};
use todo_auto::web::{AppStateInner, create_router};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "todo-auto", version, about = "Multi-user to-do list server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "todo.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Register a user directly in the configured store
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

fn open_dao(config: &Config) -> Result<Arc<dyn TodoDao>, BoxError> {
    let retry = config.storage.retry_policy();
    let dao: Arc<dyn TodoDao> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            Arc::new(DocumentTodoDao::new(MemoryStore::new()).with_retry(retry))
        }
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(&config.storage.path)?;
            Arc::new(DocumentTodoDao::new(store).with_retry(retry))
        }
    };
    Ok(dao)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn serve(config: Config) -> Result<(), BoxError> {
    let dao = open_dao(&config)?;
    let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder::new());
    let state = AppStateInner::new(dao, encoder, &config.auth);

    // Periodically drop stale rate-limit windows and expired revocations.
    let housekeeping = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp() as usize;
            let pruned = housekeeping.sweep_expired(now).await;
            if pruned > 0 {
                tracing::debug!(pruned, "pruned expired token revocations");
            }
        }
    });

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn add_user(config: Config, username: &str, password: &str) -> Result<(), BoxError> {
    let dao = open_dao(&config)?;
    let hash = Argon2PasswordEncoder::new().encode(password)?;
    dao.register_user(username, &hash).await?;
    tracing::info!("Registered user '{}'", username);
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn log_filter(rust_log: Option<&str>, configured: &str) -> Result<EnvFilter, BoxError> {
    match rust_log {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_new(configured)?),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();

    // Logging comes up before the config is read so load warnings are not lost;
    // the configured level is swapped in afterwards.
    let (filter, filter_handle) = reload::Layer::new(log_filter(rust_log.as_deref(), "info")?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    tracing::info!("Starting todo-auto {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading configuration from: {}", cli.config);

    let mut config = config::load_config_or_default(&cli.config)?;
    config.apply_env_overrides();
    config.validate()?;
    filter_handle.reload(log_filter(rust_log.as_deref(), &config.logging.level)?)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::AddUser { username, password } => add_user(config, &username, &password).await,
    }
}
