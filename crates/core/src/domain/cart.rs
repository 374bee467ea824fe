use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartLineId(pub i64);

/// Upper bound for a single request and for a stored line.
pub const MAX_QUANTITY: i64 = i32::MAX as i64;

/// Quantity requested for a product, validated to lie in `1..=MAX_QUANTITY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::InvalidQuantity { quantity: value });
        }
        if value > MAX_QUANTITY {
            return Err(DomainError::QuantityTooLarge { quantity: value, max: MAX_QUANTITY });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: i64,
}

impl CartLine {
    /// Returns the line with `additional` merged into its quantity, which must stay
    /// within [`MAX_QUANTITY`].
    pub fn merged(&self, additional: Quantity) -> Result<CartLine, DomainError> {
        let quantity = self
            .quantity
            .checked_add(additional.get())
            .filter(|quantity| *quantity <= MAX_QUANTITY)
            .ok_or(DomainError::QuantityOverflow {
                current: self.quantity,
                additional: additional.get(),
            })?;
        Ok(CartLine { quantity, ..self.clone() })
    }
}

/// A cart line that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    pub total: Decimal,
}

impl CartItemView {
    pub fn project(line: &CartLine, product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity: line.quantity,
            total: product.unit_price * Decimal::from(line.quantity),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub items: Vec<CartItemView>,
    pub item_count: i64,
    pub grand_total: Decimal,
}

impl CartSummary {
    pub fn from_items(items: Vec<CartItemView>) -> Result<Self, DomainError> {
        let item_count = items.iter().try_fold(0i64, |count, item| {
            count.checked_add(item.quantity).ok_or(DomainError::QuantityOverflow {
                current: count,
                additional: item.quantity,
            })
        })?;
        let grand_total = items.iter().try_fold(Decimal::ZERO, |total, item| {
            total.checked_add(item.total).ok_or_else(|| {
                DomainError::InvariantViolation(format!("cart total overflows at {total}"))
            })
        })?;
        Ok(Self { items, item_count, grand_total })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
