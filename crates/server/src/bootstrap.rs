use factory_core::config::{AppConfig, ConfigError, LoadOptions};
use factory_db::{connect_from_config, migrations, DbPool, Inventory};
use thiserror::Error;
use tracing::info;

use crate::inventory::{init_templates, InventoryState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub inventory: Inventory,
}

impl Application {
    pub fn inventory_state(&self) -> InventoryState {
        InventoryState {
            inventory: self.inventory.clone(),
            templates: init_templates(self.config.server.templates_dir.as_deref()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let inventory = Inventory::new(db_pool.clone());
    Ok(Application { config, db_pool, inventory })
}
