//! fmea-ws - FMEA worksheet service
//!
//! Serves the worksheet save/load contract over HTTP on top of a SQLite
//! store in the resolved root folder.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use fmea_common::config::{database_path, RootFolderResolver, TomlConfig};
use fmea_common::db::{init_database, SqliteStore};
use fmea_common::orchestrator::Orchestrator;
use fmea_ws::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "fmea-ws", version, about = "FMEA worksheet service")]
struct Args {
    /// Data root folder (holds fmea.db)
    #[arg(long, env = "FMEA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file (default: platform search path)
    #[arg(long, env = "FMEA_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides [server] bind
    #[arg(long, env = "FMEA_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting FMEA worksheet service (fmea-ws) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let root_folder = RootFolderResolver::default().resolve(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder)?;

    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path, &config.persistence).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let store = Arc::new(SqliteStore::new(pool));
    let orchestrator = Orchestrator::from_config(store, &config);
    let app = build_router(AppState::new(orchestrator));

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("fmea-ws listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
