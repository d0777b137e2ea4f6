use anyhow::Context;

use stockroom_infra::{InventoryService, SqliteInventoryStore};

use crate::config::AppConfig;

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub inventory: InventoryService<SqliteInventoryStore>,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store = SqliteInventoryStore::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("failed to open inventory database {}", config.database_url))?;

    Ok(AppServices {
        inventory: InventoryService::new(store),
    })
}
