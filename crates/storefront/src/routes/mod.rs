//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                - Liveness
//! GET    /health/ready                          - Database probe
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/register                     - Create account, email code
//! POST   /api/auth/login                        - Login
//! POST   /api/auth/logout                       - Logout
//! GET    /api/auth/me                           - Current user
//! POST   /api/auth/verify-email                 - Check verification code
//! POST   /api/auth/verify-email/resend          - Issue a new code
//! POST   /api/auth/password-reset               - Email a reset link
//! POST   /api/auth/password-reset/confirm       - Set new password
//!
//! # Account (requires auth)
//! PUT    /api/account/name                      - Change display name
//! PUT    /api/account/password                  - Change password
//! GET    /api/account/orders                    - Order history
//!
//! # Catalog
//! GET    /api/products                          - Paginated listing
//! GET    /api/products/search                   - Substring search
//! GET    /api/products/{id}                     - Product, reviews, can_review
//! POST   /api/products/{id}/reviews             - Review (delivered orders only)
//!
//! # Cart (api rate limit)
//! GET    /api/cart                              - Cart, refreshed against stock
//! DELETE /api/cart                              - Empty the cart
//! POST   /api/cart/items                        - Add product in a colour
//! PATCH  /api/cart/items/{id}                   - Set quantity
//! DELETE /api/cart/items/{id}                   - Remove line
//! POST   /api/cart/items/{id}/increment         - +1
//! POST   /api/cart/items/{id}/decrement         - -1
//!
//! # Checkout (requires auth, api rate limit)
//! POST   /api/checkout/payment-intent           - Create or refresh intent + order
//! DELETE /api/checkout/payment-intent           - Clear cart and intent after payment
//!
//! # Orders
//! GET    /api/orders/{id}                       - Owner or admin
//! POST   /api/webhooks/stripe                   - Signed gateway events
//!
//! # Admin (requires admin role)
//! GET    /api/admin/summary                     - Store counters
//! GET    /api/admin/sales-chart                 - Last seven days of sales
//! GET    /api/admin/users                       - All users
//! GET    /api/admin/orders                      - All orders
//! PATCH  /api/admin/orders/{id}/delivery-status - Update delivery status
//! POST   /api/admin/products                    - Create product
//! PUT    /api/admin/products/{id}               - Replace product
//! DELETE /api/admin/products/{id}               - Delete product
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/verify-email", post(auth::verify_email))
        .route("/verify-email/resend", post(auth::resend_verification))
        .route("/password-reset", post(auth::request_password_reset))
        .route(
            "/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .layer(auth_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/name", put(account::update_name))
        .route("/password", put(account::change_password))
        .route("/orders", get(account::orders))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/search", get(products::search))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(products::create_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/items/{id}/increment", post(cart::increment))
        .route("/items/{id}/decrement", post(cart::decrement))
        .layer(api_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payment-intent",
            post(checkout::payment_intent).delete(checkout::complete),
        )
        .layer(api_rate_limiter())
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(admin::summary))
        .route("/sales-chart", get(admin::sales_chart))
        .route("/users", get(admin::users))
        .route("/orders", get(admin::orders))
        .route(
            "/orders/{id}/delivery-status",
            patch(admin::set_delivery_status),
        )
        .route("/products", post(admin::create_product))
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/account", account_routes())
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
        .route("/api/orders/{id}", get(orders::show))
        .route("/api/webhooks/stripe", post(webhooks::stripe))
        .nest("/api/admin", admin_routes())
}
