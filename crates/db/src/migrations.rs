use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(event_name = "system.db.migrations_applied", "database schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &["product", "cart_line", "idx_cart_line_product_id"];

    async fn table_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("check table")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_catalog_and_cart_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert_eq!(table_count(&pool, "product").await, 1);
        assert_eq!(table_count(&pool, "cart_line").await, 1);
    }

    #[tokio::test]
    async fn cart_line_product_id_is_unique() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO product (id, name, unit_price) VALUES (1, 'Laptop', '999.99')")
            .execute(&pool)
            .await
            .expect("seed product");
        sqlx::query(
            "INSERT INTO cart_line (product_id, quantity, created_at) VALUES (1, 1, 'now')",
        )
        .execute(&pool)
        .await
        .expect("first line");

        let duplicate = sqlx::query(
            "INSERT INTO cart_line (product_id, quantity, created_at) VALUES (1, 1, 'now')",
        )
        .execute(&pool)
        .await;

        let error = duplicate.expect_err("second line for the same product must fail");
        let is_unique = error.as_database_error().map(|db| db.is_unique_violation());
        assert_eq!(is_unique, Some(true));
    }

    #[tokio::test]
    async fn cart_line_requires_existing_product() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let orphan = sqlx::query(
            "INSERT INTO cart_line (product_id, quantity, created_at) VALUES (42, 1, 'now')",
        )
        .execute(&pool)
        .await;

        assert!(orphan.is_err(), "foreign key should reject unknown product ids");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert_eq!(table_count(&pool, "cart_line").await, 0);
        assert_eq!(table_count(&pool, "product").await, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
