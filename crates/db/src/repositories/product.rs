use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use storefront_core::{CatalogStore, Product, ProductId, StoreError};

use super::{store_error, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let raw_price: String = row.try_get("unit_price_text")?;
    let unit_price = Decimal::from_str(raw_price.trim()).map_err(|error| {
        RepositoryError::Decode(format!("product {id} has invalid unit_price `{raw_price}`: {error}"))
    })?;

    Ok(Product { id: ProductId(id), name, unit_price })
}

#[async_trait::async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn fetch_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, CAST(unit_price AS TEXT) AS unit_price_text FROM product WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(row) => Ok(Some(product_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, CAST(unit_price AS TEXT) AS unit_price_text FROM product ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(|row| product_from_row(row).map_err(StoreError::from)).collect()
    }
}
