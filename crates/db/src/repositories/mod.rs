use thiserror::Error;

use storefront_core::errors::DomainError;
use storefront_core::StoreError;

pub mod cart;
pub mod memory;
pub mod product;

pub use cart::SqlCartStore;
pub use memory::{InMemoryCartStore, InMemoryCatalogStore};
pub use product::SqlCatalogStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    InvalidData(#[from] DomainError),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => store_error(error),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::InvalidData(error) => StoreError::Decode(error.to_string()),
        }
    }
}

/// Unique-constraint violations become [`StoreError::Conflict`] so callers can retry.
pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Decode(error.to_string()),
        _ => StoreError::Unavailable(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::StoreError;

    use super::{store_error, RepositoryError};

    #[test]
    fn pool_errors_are_reported_as_unavailable() {
        let mapped = store_error(sqlx::Error::PoolTimedOut);

        assert!(matches!(mapped, StoreError::Unavailable(_)));
    }

    #[test]
    fn decode_errors_keep_their_message() {
        let mapped = StoreError::from(RepositoryError::Decode("bad price `abc`".to_string()));

        assert_eq!(mapped, StoreError::Decode("bad price `abc`".to_string()));
    }
}
