use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storefront_core::cli::{self, Cli, Commands, DbCommands, OrderCommands};
use storefront_core::config::Config;
use storefront_core::{create_app, startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Some(Commands::Serve) | None => serve(config).await,
        Some(Commands::Order(OrderCommands::Show { order_id })) => {
            cli::require_database(&config)?;
            let engine = startup::build_engine(&config).await?;
            cli::handle_order_show(&engine, order_id).await
        }
        Some(Commands::Order(OrderCommands::Fulfil { order_id })) => {
            cli::require_database(&config)?;
            let engine = startup::build_engine(&config).await?;
            cli::handle_order_fulfil(&engine, order_id).await
        }
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (state, settings) = startup::build_app_state(&config).await?;
    let app = create_app(state, settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
