//! Tournament bracket server.
//!
//! Serves the bracket API over HTTP and live bracket events over WebSocket,
//! backed by PostgreSQL or, with `--memory`, a process-local store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use bk_server::{
    api,
    config::{ServerConfig, StorageConfig},
    logging, metrics,
};
use bracketeer::{
    auth::{AdminRepository, AuthManager, PgAdminRepository},
    bracket::{BracketEvents, BracketManager},
    db::{Database, MemoryStore},
};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Run the tournament bracket server

USAGE:
  bk_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --memory                 Keep everything in memory (no database)
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               JWT signing secret (>= 32 chars)
  PASSWORD_PEPPER          Password hashing pepper (>= 16 chars)
  BOOTSTRAP_ADMIN_USERNAME Admin account created on startup if missing
  BOOTSTRAP_ADMIN_PASSWORD Password for the bootstrap admin
  DEFAULT_BRACKET_FORMAT   single | double  [default: single]
  RUST_LOG                 Log filter  [default: info,sqlx=warn,hyper=warn]
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        memory: pargs.contains("--memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.memory)?;
    config.validate()?;

    let prometheus = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    let events = BracketEvents::new(config.bracket.event_capacity);

    // Storage
    let bracket_manager: BracketManager;
    let admins: Arc<dyn AdminRepository>;
    let pool;
    match &config.storage {
        StorageConfig::Postgres(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.run_migrations()
                .await
                .context("Failed to apply database schema")?;
            info!("Database connected successfully");

            bracket_manager = BracketManager::postgres(db.pool().clone(), events);
            admins = Arc::new(PgAdminRepository::new(db.pool().clone()));
            pool = Some(db.pool().clone());
        }
        StorageConfig::Memory => {
            warn!("Running with in-memory storage: data is lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            bracket_manager = BracketManager::in_memory(store.clone(), events);
            admins = store;
            pool = None;
        }
    }

    let auth_manager = AuthManager::new(
        admins,
        config.security.password_pepper.clone(),
        config.security.jwt_secret.clone(),
    )
    .with_token_lifetime(config.security.token_lifetime_hours);

    if let Some(bootstrap) = &config.bootstrap_admin {
        let created = auth_manager
            .ensure_admin(&bootstrap.username, &bootstrap.password)
            .await
            .context("Failed to create bootstrap admin")?;
        if created {
            info!("Created bootstrap admin '{}'", bootstrap.username);
        }
    }

    let api_state = api::AppState {
        auth_manager: Arc::new(auth_manager),
        bracket_manager: Arc::new(bracket_manager),
        pool,
        metrics: prometheus,
        default_format: config.bracket.default_format,
    };

    let app = api::create_router(api_state);

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
