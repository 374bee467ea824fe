use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;
use storefront_core::catalog::validate_catalog;
use storefront_core::Product;
use tracing::info;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Loads a fixed product list into the `product` table.
///
/// Loading is idempotent: products whose id already exists are left untouched, so a
/// re-seed never rewrites prices that are already referenced by cart lines.
pub struct CatalogSeed;

#[derive(Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: u64,
    pub skipped: u64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks.iter().filter_map(|(check, passed)| (!passed).then_some(check.as_str())).collect()
    }
}

impl CatalogSeed {
    pub async fn load(pool: &DbPool, products: &[Product]) -> Result<SeedResult, RepositoryError> {
        validate_catalog(products)?;

        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for product in products {
            let result = sqlx::query(
                "INSERT INTO product (id, name, unit_price) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(product.id.0)
            .bind(&product.name)
            .bind(product.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        let result = SeedResult { inserted, skipped: products.len() as u64 - inserted };
        info!(
            event_name = "system.seed.catalog_loaded",
            correlation_id = "seed",
            inserted = result.inserted,
            skipped = result.skipped,
            "catalog seed applied"
        );
        Ok(result)
    }

    /// Checks that every seed product exists with the seeded name and price.
    pub async fn verify(
        pool: &DbPool,
        products: &[Product],
    ) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(products.len());

        for product in products {
            let row = sqlx::query(
                "SELECT name, CAST(unit_price AS TEXT) AS unit_price_text FROM product WHERE id = ?",
            )
            .bind(product.id.0)
            .fetch_optional(pool)
            .await?;

            let matches = match row {
                Some(row) => {
                    let name: String = row.try_get("name")?;
                    let raw_price: String = row.try_get("unit_price_text")?;
                    let price = Decimal::from_str(raw_price.trim()).map_err(|error| {
                        RepositoryError::Decode(format!(
                            "product {} has invalid unit_price `{raw_price}`: {error}",
                            product.id
                        ))
                    })?;
                    name == product.name && price == product.unit_price
                }
                None => false,
            };
            checks.push((format!("product-{}", product.id), matches));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use storefront_core::catalog::seed_catalog;
    use storefront_core::Product;

    use super::{CatalogSeed, SeedResult};
    use crate::repositories::RepositoryError;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn load_inserts_every_seed_product_once() {
        let pool = migrated_pool().await;

        let first = CatalogSeed::load(&pool, &seed_catalog()).await.expect("first seed");
        let second = CatalogSeed::load(&pool, &seed_catalog()).await.expect("second seed");

        assert_eq!(first, SeedResult { inserted: 4, skipped: 0 });
        assert_eq!(second, SeedResult { inserted: 0, skipped: 4 });
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn verify_flags_products_that_drifted_from_the_seed() {
        let pool = migrated_pool().await;
        CatalogSeed::load(&pool, &seed_catalog()).await.expect("seed");
        sqlx::query("UPDATE product SET unit_price = '1.00' WHERE id = 3")
            .execute(&pool)
            .await
            .expect("tamper");

        let verification = CatalogSeed::verify(&pool, &seed_catalog()).await.expect("verify");

        assert!(!verification.all_present);
        assert_eq!(verification.failed_checks(), vec!["product-3"]);
    }

    #[tokio::test]
    async fn verify_fails_on_empty_database() {
        let pool = migrated_pool().await;

        let verification = CatalogSeed::verify(&pool, &seed_catalog()).await.expect("verify");

        assert!(!verification.all_present);
        assert_eq!(verification.failed_checks().len(), 4);
    }

    #[tokio::test]
    async fn invalid_catalog_is_rejected_before_writing() {
        let pool = migrated_pool().await;
        let products = vec![Product::new(1, "Laptop", Decimal::new(-1, 0))];

        let result = CatalogSeed::load(&pool, &products).await;

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 0);
    }
}
