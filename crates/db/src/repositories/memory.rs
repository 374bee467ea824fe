use std::collections::BTreeMap;

use tokio::sync::RwLock;

use storefront_core::{
    CartLine, CartLineId, CartStore, CatalogStore, NewCartLine, Product, ProductId, StoreError,
};

#[derive(Default)]
pub struct InMemoryCatalogStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryCatalogStore {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(
                products.into_iter().map(|product| (product.id, product)).collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn fetch_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }
}

#[derive(Default)]
struct CartState {
    last_id: i64,
    lines: BTreeMap<CartLineId, CartLine>,
}

/// Same conflict semantics as the SQL store: one line per product, optimistic updates,
/// ids never reused.
#[derive(Default)]
pub struct InMemoryCartStore {
    state: RwLock<CartState>,
}

#[async_trait::async_trait]
impl CartStore for InMemoryCartStore {
    async fn fetch_all(&self) -> Result<Vec<CartLine>, StoreError> {
        let state = self.state.read().await;
        Ok(state.lines.values().cloned().collect())
    }

    async fn fetch_by_product_id(&self, id: ProductId) -> Result<Option<CartLine>, StoreError> {
        let state = self.state.read().await;
        Ok(state.lines.values().find(|line| line.product_id == id).cloned())
    }

    async fn insert(&self, line: NewCartLine) -> Result<CartLine, StoreError> {
        let mut state = self.state.write().await;
        if state.lines.values().any(|existing| existing.product_id == line.product_id) {
            return Err(StoreError::Conflict(format!(
                "cart already holds a line for product {}",
                line.product_id
            )));
        }

        state.last_id += 1;
        let stored = CartLine {
            id: CartLineId(state.last_id),
            product_id: line.product_id,
            quantity: line.quantity.get(),
        };
        state.lines.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, line: &CartLine, expected_quantity: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.lines.get_mut(&line.id) {
            Some(stored) if stored.quantity == expected_quantity => {
                stored.quantity = line.quantity;
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!(
                "cart line {} changed or was removed since it was read",
                line.id.0
            ))),
        }
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.lines.len() as u64;
        state.lines.clear();
        Ok(removed)
    }
}
