use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dashboard_api::{
    api,
    auth::SessionAuthenticator,
    config::config,
    database::{DatabaseManager, PgGateway},
    handlers::AppState,
};

#[derive(Parser)]
#[command(name = "dashboard-api")]
#[command(about = "Media and gaming dashboard API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Serve the HTTP API (default)")]
    Serve,

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    let config = config();

    let default_filter = if config.api.enable_request_logging {
        "info,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting dashboard API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database).context("database configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            DatabaseManager::migrate(&pool).await.context("running migrations")?;
        }
        Command::Serve => {
            let state = AppState::new(
                Arc::new(PgGateway::new(pool)),
                SessionAuthenticator::from_config(&config.session),
            );

            let bind_addr = format!("0.0.0.0:{}", config.api.port);
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", bind_addr))?;

            tracing::info!("Dashboard API listening on http://{}", bind_addr);
            axum::serve(listener, api::app(state)).await.context("server")?;
        }
    }

    Ok(())
}
