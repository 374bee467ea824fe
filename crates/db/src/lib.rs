pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod seed;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    InMemoryCartStore, InMemoryCatalogStore, RepositoryError, SqlCartStore, SqlCatalogStore,
};
pub use seed::{CatalogSeed, SeedResult, VerificationResult};
