use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cart::{CartLine, NewCartLine};
use crate::domain::product::{Product, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A write lost against a concurrent writer: a duplicate insert for the same product,
    /// or an update whose expected quantity no longer matches the stored one.
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products ordered by id.
    async fn fetch_all(&self) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// All lines in insertion order.
    async fn fetch_all(&self) -> Result<Vec<CartLine>, StoreError>;

    async fn fetch_by_product_id(&self, id: ProductId) -> Result<Option<CartLine>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when a line for the product already exists.
    async fn insert(&self, line: NewCartLine) -> Result<CartLine, StoreError>;

    /// Writes `line.quantity` only if the stored quantity still equals
    /// `expected_quantity`, otherwise fails with [`StoreError::Conflict`].
    async fn update(&self, line: &CartLine, expected_quantity: i64) -> Result<(), StoreError>;

    /// Returns the number of deleted lines.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}
