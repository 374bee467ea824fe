pub mod cart;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use cart::store::{CartStore, CatalogStore, StoreError};
pub use cart::{AddToCartOutcome, CartService, MAX_ADD_ATTEMPTS};
pub use domain::cart::{
    CartItemView, CartLine, CartLineId, CartSummary, NewCartLine, Quantity, MAX_QUANTITY,
};
pub use domain::product::{Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
