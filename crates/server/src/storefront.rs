//! Storefront HTML routes.
//!
//! - `GET  /`                 shop page (catalog)
//! - `GET  /products`         shop page (catalog)
//! - `GET  /cart`             cart page with totals
//! - `POST /cart/add/{id}`    add to cart, optional `?quantity=`, redirects to `/cart`
//! - `POST /cart/clear`       empty the cart, redirects to `/cart`

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::{ApplicationError, CartService, CartSummary, InterfaceError, Product, ProductId};
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

type PageResult<T> = Result<T, (StatusCode, Html<String>)>;

const EMBEDDED_TEMPLATES: [(&str, &str); 3] = [
    ("shop/index.html", include_str!("../../../templates/shop/index.html")),
    ("cart/index.html", include_str!("../../../templates/cart/index.html")),
    ("error.html", include_str!("../../../templates/error.html")),
];

#[derive(Clone)]
pub struct StorefrontState {
    cart: CartService,
    templates: Arc<Tera>,
}

impl StorefrontState {
    pub fn new(cart: CartService, templates: Arc<Tera>) -> Self {
        Self { cart, templates }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddToCartQuery {
    pub quantity: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ProductRow {
    id: i64,
    name: String,
    price: String,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self { id: product.id.0, name: product.name.clone(), price: format_price(product.unit_price) }
    }
}

#[derive(Debug, Serialize)]
struct CartItemRow {
    product_id: i64,
    name: String,
    unit_price: String,
    quantity: i64,
    total: String,
}

#[derive(Debug, Serialize)]
struct CartView {
    items: Vec<CartItemRow>,
    item_count: i64,
    grand_total: String,
    is_empty: bool,
}

impl From<CartSummary> for CartView {
    fn from(summary: CartSummary) -> Self {
        let is_empty = summary.is_empty();
        Self {
            items: summary
                .items
                .into_iter()
                .map(|item| CartItemRow {
                    product_id: item.product_id.0,
                    name: item.name,
                    unit_price: format_price(item.unit_price),
                    quantity: item.quantity,
                    total: format_price(item.total),
                })
                .collect(),
            item_count: summary.item_count,
            grand_total: format_price(summary.grand_total),
            is_empty,
        }
    }
}

/// Loads templates from `<dir>/**/*`, filling any missing page from the copies compiled
/// into the binary.
pub fn init_templates(dir: &FsPath) -> Arc<Tera> {
    let pattern = format!("{}/**/*", dir.display());
    let mut tera = match Tera::new(&pattern) {
        Ok(tera) => tera,
        Err(error) => {
            warn!(
                event_name = "system.templates.load_failed",
                correlation_id = "bootstrap",
                pattern = %pattern,
                error = %error,
                "failed to load templates from filesystem, using embedded templates"
            );
            Tera::default()
        }
    };

    let loaded: Vec<String> = tera.get_template_names().map(str::to_owned).collect();
    for (name, source) in EMBEDDED_TEMPLATES {
        if loaded.iter().any(|existing| existing == name) {
            continue;
        }
        if let Err(error) = tera.add_raw_template(name, source) {
            error!(
                event_name = "system.templates.embedded_invalid",
                correlation_id = "bootstrap",
                template = name,
                error = %error,
                "embedded template failed to parse"
            );
        }
    }

    Arc::new(tera)
}

pub fn router(state: StorefrontState) -> Router {
    Router::new()
        .route("/", get(shop_page))
        .route("/products", get(shop_page))
        .route("/cart", get(cart_page))
        .route("/cart/add/{id}", post(add_to_cart))
        .route("/cart/clear", post(clear_cart))
        .with_state(state)
}

async fn shop_page(State(state): State<StorefrontState>) -> PageResult<Html<String>> {
    let products = state.cart.list_products().await.map_err(|e| page_error(&state, e))?;

    let mut context = Context::new();
    context.insert("products", &products.iter().map(ProductRow::from).collect::<Vec<_>>());
    render(&state, "shop/index.html", &context)
}

async fn cart_page(State(state): State<StorefrontState>) -> PageResult<Html<String>> {
    let products = state.cart.list_products().await.map_err(|e| page_error(&state, e))?;
    let summary = state.cart.get_cart_summary().await.map_err(|e| page_error(&state, e))?;

    let mut context = Context::new();
    context.insert("products", &products.iter().map(ProductRow::from).collect::<Vec<_>>());
    context.insert("cart", &CartView::from(summary));
    render(&state, "cart/index.html", &context)
}

async fn add_to_cart(
    Path(id): Path<i64>,
    Query(query): Query<AddToCartQuery>,
    State(state): State<StorefrontState>,
) -> PageResult<Redirect> {
    let quantity = query.quantity.unwrap_or(1);
    state
        .cart
        .add_to_cart(ProductId(id), quantity)
        .await
        .map_err(|e| page_error(&state, e))?;
    Ok(Redirect::to("/cart"))
}

async fn clear_cart(State(state): State<StorefrontState>) -> PageResult<Redirect> {
    state.cart.clear_cart().await.map_err(|e| page_error(&state, e))?;
    Ok(Redirect::to("/cart"))
}

fn render(state: &StorefrontState, template: &str, context: &Context) -> PageResult<Html<String>> {
    state.templates.render(template, context).map(Html).map_err(|e| {
        page_error(
            state,
            ApplicationError::Configuration(format!("template `{template}` failed: {e:?}")),
        )
    })
}

fn page_error(state: &StorefrontState, error: ApplicationError) -> (StatusCode, Html<String>) {
    let correlation_id = Uuid::new_v4().to_string();
    let interface = error.into_interface(correlation_id);

    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Bad requests echo the validation message; anything else stays generic.
    let message = match &interface {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        _ => interface.user_message().to_owned(),
    };

    if status.is_server_error() {
        error!(
            event_name = "storefront.request.failed",
            correlation_id = interface.correlation_id(),
            status = status.as_u16(),
            error = %interface,
            "storefront request failed"
        );
    } else {
        info!(
            event_name = "storefront.request.rejected",
            correlation_id = interface.correlation_id(),
            status = status.as_u16(),
            error = %interface,
            "storefront request rejected"
        );
    }

    let mut context = Context::new();
    context.insert("message", &message);
    context.insert("request_id", interface.correlation_id());
    let body = state.templates.render("error.html", &context).unwrap_or_else(|_| {
        format!(
            "<h1>Error</h1><p>{message}</p><p>Request ID: {}</p>",
            interface.correlation_id()
        )
    });

    (status, Html(body))
}

fn format_price(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}
