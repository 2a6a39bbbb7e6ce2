use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shop_admin_api::config::{self, AppConfig};
use shop_admin_api::database::{MemoryStore, PgStore, Store};
use shop_admin_api::seed::{self, AdminSeed};
use shop_admin_api::{serve, AppState};

#[derive(Parser)]
#[command(name = "shop-admin-api")]
#[command(about = "E-commerce administration REST API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides API_PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Use the in-memory store and seed it on startup")]
        memory: bool,
    },

    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Migrate, then create default permissions, roles and the admin user")]
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and JWT_SECRET are picked up.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,shop_admin_api=debug")))
        .init();

    let config = config::config().clone();
    info!("Starting {} in {:?} mode", env!("CARGO_PKG_NAME"), config.environment);

    match Cli::parse().command.unwrap_or(Commands::Serve { port: None, memory: false }) {
        Commands::Serve { port, memory } => {
            let port = port.unwrap_or(config.api.port);
            let store: Arc<dyn Store> = if memory {
                let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
                seed::run(store.clone(), &AdminSeed::from_env()).await.context("seeding in-memory store")?;
                store
            } else {
                Arc::new(connect(&config).await?)
            };
            serve(AppState::new(config, store), port).await.context("server terminated")?;
        }
        Commands::Migrate => {
            connect(&config).await?;
        }
        Commands::Seed => {
            let store: Arc<dyn Store> = Arc::new(connect(&config).await?);
            seed::run(store, &AdminSeed::from_env()).await.context("seeding database")?;
        }
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let store = PgStore::connect(&config.database).await.context("connecting to database")?;
    store.migrate().await.context("running migrations")?;
    Ok(store)
}
