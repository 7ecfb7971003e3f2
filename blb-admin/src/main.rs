//! blb-admin - BetterLB admin reconciliation service
//!
//! Configuration is resolved CLI → environment → TOML → defaults; the
//! database is created and migrated on first start.

use anyhow::Result;
use blb_common::config::{parse_actor_list, AdminConfig, ConfigOverrides};
use blb_common::db::init_database;
use blb_common::UuidGenerator;
use blb_admin::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// BetterLB admin reconciliation service
#[derive(Parser, Debug)]
#[command(name = "blb-admin", version, about)]
struct Args {
    /// Path to the SQLite database file
    #[arg(long, env = "BLB_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Socket address to bind, e.g. 127.0.0.1:5740
    #[arg(long, env = "BLB_BIND_ADDRESS")]
    bind: Option<String>,

    /// Comma-separated identities allowed to call admin endpoints
    #[arg(long, env = "BLB_ALLOWED_ACTORS")]
    allowed_actors: Option<String>,

    /// Path to an admin.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database work
    info!(
        "Starting BetterLB admin (blb-admin) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = AdminConfig::resolve(ConfigOverrides {
        database_path: args.database,
        bind_address: args.bind,
        allowed_actors: args.allowed_actors.as_deref().map(parse_actor_list),
        config_file: args.config,
    })?;

    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    if config.allowed_actors.is_empty() {
        info!("Actor allow-list empty: actor checking disabled");
    } else {
        info!("✓ Actor allow-list loaded ({} identities)", config.allowed_actors.len());
    }

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, Arc::new(UuidGenerator), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("blb-admin listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
