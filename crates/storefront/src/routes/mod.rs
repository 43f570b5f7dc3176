//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (store ping)
//!
//! # Auth
//! POST   /auth/signup               - Create account
//! POST   /auth/signin               - Start session
//! POST   /auth/signout              - End session
//! POST   /auth/forgot-password      - Request reset email
//! POST   /auth/reset-password       - Consume reset token
//! GET    /auth/me                   - Current identity
//!
//! # Products
//! GET    /products                  - Public list (category, min_price, max_price, skip, limit)
//! GET    /products/search?keyword=  - Public search
//! GET    /products/{id}             - Public detail
//! POST   /products/admin            - Create (admin)
//! GET    /products/admin            - List (admin)
//! GET    /products/admin/{id}       - Get (admin)
//! PUT    /products/admin/{id}       - Partial update (admin)
//! DELETE /products/admin/{id}       - Delete (admin)
//!
//! # Cart (customer)
//! GET    /cart                      - View
//! POST   /cart                      - Add line
//! PUT    /cart/{product_id}         - Set quantity
//! DELETE /cart/{product_id}         - Remove line
//!
//! # Orders (customer)
//! POST   /orders/checkout           - Check out the cart
//! GET    /orders                    - History
//! GET    /orders/{id}               - Detail
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::Request,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/signout", post(auth::sign_out))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/me", get(auth::me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/search", get(products::search))
        .route("/admin", get(products::admin_index).post(products::create))
        .route(
            "/admin/{id}",
            get(products::admin_show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add))
        .route("/{product_id}", put(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/checkout", post(orders::checkout))
        .route("/{id}", get(orders::show))
}

/// All storefront routes, without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
}

/// The full application: routes, sessions, request IDs, and request tracing.
///
/// Sentry layers are added by the binary.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(session_store, state.config());

    routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}
