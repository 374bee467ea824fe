use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use storefront_core::{CartLine, CartLineId, CartStore, NewCartLine, ProductId, StoreError};

use super::{store_error, RepositoryError};
use crate::DbPool;

/// Cart lines in the `cart_line` table.
///
/// The unique index on `product_id` turns a lost insert race into
/// [`StoreError::Conflict`]; updates compare against the previously read quantity so a
/// stale read is reported the same way.
pub struct SqlCartStore {
    pool: DbPool,
}

impl SqlCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn cart_line_from_row(row: &SqliteRow) -> Result<CartLine, RepositoryError> {
    Ok(CartLine {
        id: CartLineId(row.try_get("id")?),
        product_id: ProductId(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
    })
}

#[async_trait::async_trait]
impl CartStore for SqlCartStore {
    async fn fetch_all(&self) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query("SELECT id, product_id, quantity FROM cart_line ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.iter().map(|row| cart_line_from_row(row).map_err(StoreError::from)).collect()
    }

    async fn fetch_by_product_id(&self, id: ProductId) -> Result<Option<CartLine>, StoreError> {
        let row =
            sqlx::query("SELECT id, product_id, quantity FROM cart_line WHERE product_id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        match row {
            Some(row) => Ok(Some(cart_line_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, line: NewCartLine) -> Result<CartLine, StoreError> {
        let result = sqlx::query(
            "INSERT INTO cart_line (product_id, quantity, created_at) VALUES (?, ?, ?)",
        )
        .bind(line.product_id.0)
        .bind(line.quantity.get())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(CartLine {
            id: CartLineId(result.last_insert_rowid()),
            product_id: line.product_id,
            quantity: line.quantity.get(),
        })
    }

    async fn update(&self, line: &CartLine, expected_quantity: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cart_line SET quantity = ? WHERE id = ? AND quantity = ?")
            .bind(line.quantity)
            .bind(line.id.0)
            .bind(expected_quantity)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "cart line {} changed or was removed since it was read",
                line.id.0
            )));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM cart_line").execute(&self.pool).await.map_err(store_error)?;
        Ok(result.rows_affected())
    }
}
