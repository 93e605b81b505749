//! Optician Shop Server
//!
//! Serves the shop's JSON API: lens catalog, customers, form presets,
//! wholesale password settings and backup/restore. Login is handled by a
//! proxy in front of this process; prescription photos are kept on local
//! disk and served under `/uploads`.

mod auth;
mod config;
mod error;
mod handlers;
mod server;
mod state;
mod uploads;

use clap::Parser;
use optician_core::ShopStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "optician-server", about = "Optician shop API server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "optician.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Uploads directory override
    #[arg(short, long)]
    uploads: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }
    if let Some(uploads) = cli.uploads {
        cfg.uploads_dir = uploads;
    }

    let store = ShopStore::open(&cfg.database_path, cfg.password_hash)?;
    if cfg.seed_demo_data && store.seed_demo_data()? {
        tracing::info!("Empty catalog seeded with demo data");
    }

    std::fs::create_dir_all(&cfg.uploads_dir)?;
    if cfg.auth.allow_list_enabled() {
        tracing::info!(
            allowed = cfg.auth.allowed_emails.len(),
            header = %cfg.auth.email_header,
            "Email allow-list enabled"
        );
    }

    tracing::info!("Starting optician server on {}", cfg.listen_addr);

    let state = state::AppState::new(store, &cfg);
    let app = server::build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
