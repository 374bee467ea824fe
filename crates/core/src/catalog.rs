use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::domain::product::Product;
use crate::errors::DomainError;

/// The fixed product list every fresh database starts with.
pub fn seed_catalog() -> Vec<Product> {
    vec![
        Product::new(1, "Laptop", Decimal::new(99_999, 2)),
        Product::new(2, "Keyboard", Decimal::new(7_550, 2)),
        Product::new(3, "Mouse", Decimal::new(2_500, 2)),
        Product::new(4, "Monitor", Decimal::new(45_000, 2)),
    ]
}

/// Rejects catalogs with duplicate ids, blank names or negative prices.
pub fn validate_catalog(products: &[Product]) -> Result<(), DomainError> {
    let mut seen = HashSet::with_capacity(products.len());

    for product in products {
        if !seen.insert(product.id) {
            return Err(DomainError::InvariantViolation(format!(
                "duplicate product id {} in catalog",
                product.id
            )));
        }
        if product.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "product {} has an empty name",
                product.id
            )));
        }
        if product.unit_price < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "product {} has negative unit price {}",
                product.id, product.unit_price
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{seed_catalog, validate_catalog};
    use crate::domain::product::{Product, ProductId};
    use crate::errors::DomainError;

    #[test]
    fn seed_catalog_is_valid_and_ordered() {
        let products = seed_catalog();

        assert_eq!(products.len(), 4);
        assert!(validate_catalog(&products).is_ok());
        let ids: Vec<ProductId> = products.iter().map(|product| product.id).collect();
        assert_eq!(ids, vec![ProductId(1), ProductId(2), ProductId(3), ProductId(4)]);
        assert_eq!(products[0].name, "Laptop");
        assert_eq!(products[0].unit_price.to_string(), "999.99");
        assert_eq!(products[1].unit_price.to_string(), "75.50");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let products = vec![
            Product::new(1, "Laptop", Decimal::ONE),
            Product::new(1, "Laptop again", Decimal::ONE),
        ];

        let result = validate_catalog(&products);

        assert!(matches!(result, Err(DomainError::InvariantViolation(ref message)) if message.contains("duplicate")));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let products = vec![Product::new(9, "Refund", Decimal::new(-100, 2))];

        assert!(validate_catalog(&products).is_err());
    }

    #[test]
    fn zero_price_is_allowed() {
        let products = vec![Product::new(9, "Sticker", Decimal::ZERO)];

        assert!(validate_catalog(&products).is_ok());
    }
}
