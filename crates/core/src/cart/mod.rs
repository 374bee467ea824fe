//! Cart operations over injected catalog and cart stores.
//!
//! The cart is a single process-wide collection holding at most one line per product.
//! `add_to_cart` resolves the product first, so an unknown id is a no-op whatever the
//! quantity, and validates the quantity after that. The write follows a fetch, branch,
//! write sequence; the stores report lost races as [`StoreError::Conflict`] and the
//! whole sequence is retried up to [`MAX_ADD_ATTEMPTS`] times.

pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::cart::{CartItemView, CartLineId, CartSummary, NewCartLine, Quantity};
use crate::domain::product::{Product, ProductId};
use crate::errors::{ApplicationError, DomainError};
use store::{CartStore, CatalogStore, StoreError};

pub const MAX_ADD_ATTEMPTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddToCartOutcome {
    Inserted { line_id: CartLineId, quantity: i64 },
    Merged { line_id: CartLineId, quantity: i64 },
    /// The product id is not in the catalog; nothing was written.
    ProductNotFound,
}

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn CatalogStore>,
    cart: Arc<dyn CartStore>,
}

enum AttemptError {
    Store(StoreError),
    Domain(DomainError),
}

impl From<StoreError> for AttemptError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DomainError> for AttemptError {
    fn from(value: DomainError) -> Self {
        Self::Domain(value)
    }
}

impl CartService {
    pub fn new(catalog: Arc<dyn CatalogStore>, cart: Arc<dyn CartStore>) -> Self {
        Self { catalog, cart }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ApplicationError> {
        Ok(self.catalog.fetch_all().await?)
    }

    pub async fn add_one_to_cart(
        &self,
        product_id: ProductId,
    ) -> Result<AddToCartOutcome, ApplicationError> {
        self.add_to_cart(product_id, Quantity::ONE.get()).await
    }

    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<AddToCartOutcome, ApplicationError> {
        if self.catalog.fetch_by_id(product_id).await?.is_none() {
            warn!(
                event_name = "cart.add.unknown_product",
                product_id = product_id.0,
                quantity,
                "ignoring add for product that is not in the catalog"
            );
            return Ok(AddToCartOutcome::ProductNotFound);
        }

        let quantity = Quantity::new(quantity)?;

        let mut last_conflict = String::new();
        for attempt in 1..=MAX_ADD_ATTEMPTS {
            match self.try_add(product_id, quantity).await {
                Ok(outcome) => {
                    info!(
                        event_name = "cart.add.applied",
                        product_id = product_id.0,
                        quantity = quantity.get(),
                        attempt,
                        outcome = ?outcome,
                        "cart updated"
                    );
                    return Ok(outcome);
                }
                Err(AttemptError::Store(StoreError::Conflict(detail))) => {
                    debug!(
                        event_name = "cart.add.conflict",
                        product_id = product_id.0,
                        attempt,
                        detail = %detail,
                        "concurrent cart write detected, retrying"
                    );
                    last_conflict = detail;
                }
                Err(AttemptError::Store(error)) => return Err(error.into()),
                Err(AttemptError::Domain(error)) => return Err(error.into()),
            }
        }

        warn!(
            event_name = "cart.add.retries_exhausted",
            product_id = product_id.0,
            attempts = MAX_ADD_ATTEMPTS,
            "giving up on contended cart line"
        );
        Err(ApplicationError::Conflict(format!(
            "cart line for product {product_id} still contended after {MAX_ADD_ATTEMPTS} attempts: {last_conflict}"
        )))
    }

    async fn try_add(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<AddToCartOutcome, AttemptError> {
        match self.cart.fetch_by_product_id(product_id).await? {
            Some(existing) => {
                let merged = existing.merged(quantity)?;
                self.cart.update(&merged, existing.quantity).await?;
                Ok(AddToCartOutcome::Merged { line_id: merged.id, quantity: merged.quantity })
            }
            None => {
                let inserted = self.cart.insert(NewCartLine { product_id, quantity }).await?;
                Ok(AddToCartOutcome::Inserted { line_id: inserted.id, quantity: inserted.quantity })
            }
        }
    }

    pub async fn get_cart_items(&self) -> Result<Vec<CartItemView>, ApplicationError> {
        let lines = self.cart.fetch_all().await?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let products: HashMap<ProductId, Product> = self
            .catalog
            .fetch_all()
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let items = lines
            .iter()
            .filter_map(|line| match products.get(&line.product_id) {
                Some(product) => Some(CartItemView::project(line, product)),
                None => {
                    warn!(
                        event_name = "cart.read.dangling_line",
                        line_id = line.id.0,
                        product_id = line.product_id.0,
                        "skipping cart line whose product is missing from the catalog"
                    );
                    None
                }
            })
            .collect();

        Ok(items)
    }

    pub async fn get_cart_summary(&self) -> Result<CartSummary, ApplicationError> {
        Ok(CartSummary::from_items(self.get_cart_items().await?)?)
    }

    pub async fn clear_cart(&self) -> Result<u64, ApplicationError> {
        let removed = self.cart.delete_all().await?;
        info!(event_name = "cart.clear.applied", removed_lines = removed, "cart cleared");
        Ok(removed)
    }
}
