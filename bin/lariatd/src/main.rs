//! `lariatd` — the Lariat server binary.
//!
//! Usage:
//!   lariatd -c <context-name-or-path> [--listen <addr>] [--seed-demo <owner>]
//!
//! The context name resolves to `/etc/lariat/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod config;
mod routes;
mod seed;

use std::sync::Arc;

use clap::Parser;
use jsonwebtoken::{DecodingKey, Validation};
use lariat_core::Module;
use tracing::info;

use auth_middleware::JwtState;
use config::ServerConfig;

/// Lariat CRM server.
#[derive(Parser, Debug)]
#[command(name = "lariatd", about = "Lariat CRM server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Seed demo data for the given owner id, then serve.
    #[arg(long = "seed-demo")]
    seed_demo: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = lariat_core::ServiceConfig {
        data_dir: Some(data_dir),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    let sql: Arc<dyn lariat_sql::SQLStore> = Arc::new(
        lariat_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let crm_module = lariat_crm::CrmModule::new(Arc::clone(&sql))?;
    info!("CRM module initialized");

    if let Some(owner) = &cli.seed_demo {
        seed::seed_demo(&crm_module, owner)?;
    }

    let module_routes = vec![(crm_module.name(), crm_module.routes())];

    let jwt_state = Arc::new(JwtState {
        decoding_key: DecodingKey::from_secret(server_config.jwt.secret.as_bytes()),
        validation: Validation::default(),
    });

    let app = routes::build_router(jwt_state, module_routes);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("Lariat server listening on {}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
