use std::sync::Arc;

use axum::Router;
use storefront_core::catalog::seed_catalog;
use storefront_core::config::{AppConfig, ConfigError};
use storefront_core::CartService;
use storefront_db::{
    connect_with_config, migrations, CatalogSeed, DbPool, RepositoryError, SqlCartStore,
    SqlCatalogStore,
};
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::info;

use crate::{
    health,
    storefront::{self, StorefrontState},
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub cart_service: CartService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog seed failed: {0}")]
    Seed(#[source] RepositoryError),
}

impl Application {
    pub fn router(&self) -> Router {
        let templates = storefront::init_templates(&self.config.server.templates_dir);
        let state = StorefrontState::new(self.cart_service.clone(), templates);

        storefront::router(state)
            .merge(health::router(self.db_pool.clone()))
            .nest_service("/static", ServeDir::new(&self.config.server.static_dir))
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    if config.catalog.seed_on_startup {
        let result =
            CatalogSeed::load(&db_pool, &seed_catalog()).await.map_err(BootstrapError::Seed)?;
        info!(
            event_name = "system.bootstrap.catalog_seeded",
            correlation_id = "bootstrap",
            inserted = result.inserted,
            skipped = result.skipped,
            "catalog seed checked"
        );
    }

    let cart_service = CartService::new(
        Arc::new(SqlCatalogStore::new(db_pool.clone())),
        Arc::new(SqlCartStore::new(db_pool.clone())),
    );

    Ok(Application { config, db_pool, cart_service })
}
