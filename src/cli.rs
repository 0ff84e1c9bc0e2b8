use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::OrderStatus;
use crate::services::OrderEngine;

#[derive(Parser)]
#[command(name = "storefront-core")]
#[command(about = "Storefront Core - order and payment reconciliation service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Order management commands
    #[command(subcommand)]
    Order(OrderCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Print an order with its line items
    Show {
        #[arg(value_name = "ORDER_ID")]
        order_id: Uuid,
    },

    /// Mark an order as fulfilled (delivered)
    Fulfil {
        #[arg(value_name = "ORDER_ID")]
        order_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

/// Order commands read stored orders, which the in-memory store never has
/// from a fresh process.
pub fn require_database(config: &Config) -> anyhow::Result<()> {
    if config.database_url.is_none() {
        anyhow::bail!("order commands need DATABASE_URL; the in-memory store starts empty");
    }
    Ok(())
}

pub async fn handle_order_show(engine: &OrderEngine, order_id: Uuid) -> anyhow::Result<()> {
    let (order, items) = engine.order_with_items(order_id).await?;

    println!("Order {}", order.id);
    println!("  Status:   {}", order.status);
    println!("  Payment:  {} ({})", order.payment_method, order.payment_status.as_str());
    println!("  Verified: {}", order.verification.as_str());
    println!("  Total:    {} {}", order.total, order.currency);
    println!("  Customer: {}, {}", order.customer.name, order.customer.pincode);
    for item in items {
        println!(
            "  - {} x{} @ {} ({})",
            item.product_name, item.quantity, item.unit_price, item.product_id
        );
    }

    Ok(())
}

pub async fn handle_order_fulfil(engine: &OrderEngine, order_id: Uuid) -> anyhow::Result<()> {
    let order = engine.update_status(order_id, OrderStatus::Fulfilled).await?;
    tracing::info!(order_id = %order.id, "order marked as fulfilled");
    println!("✓ Order {} marked as fulfilled", order.id);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(database_url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL is not set");
    };

    let pool = crate::db::create_pool(database_url).await?;
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    config.validate()?;

    println!("Configuration:");
    println!("  Server Port:  {}", config.server_port);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(in-memory)".to_string())
    );
    println!(
        "  Redis URL:    {}",
        config
            .redis_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(idempotency disabled)".to_string())
    );
    println!("  Gateway:      {:?}", config.gateway);
    println!("  Currency:     {}", config.currency);
    println!(
        "  Catalog seed: {}",
        config.catalog_seed_file.as_deref().unwrap_or("(none)")
    );
    println!("  Admin API:    {}", if config.admin_api_key.is_some() { "enabled" } else { "disabled" });

    println!("✓ Configuration is valid");
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_database_password() {
        assert_eq!(
            mask_password("postgres://shop:hunter2@db:5432/shop"),
            "postgres://shop:****@db:5432/shop"
        );
        assert_eq!(mask_password("redis://localhost:6379"), "redis://localhost:6379");
    }

    #[test]
    fn parses_order_subcommands() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["storefront-core", "order", "fulfil", &id.to_string()]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Order(OrderCommands::Fulfil { order_id })) if order_id == id
        ));
    }

    #[test]
    fn order_commands_require_a_database() {
        let mut config = Config::for_tests();
        assert!(require_database(&config).is_err());

        config.database_url = Some("postgres://shop:pw@localhost/shop".to_string());
        assert!(require_database(&config).is_ok());
    }

    #[test]
    fn help_does_not_need_configuration() {
        let err = Cli::try_parse_from(["storefront-core", "--help"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
