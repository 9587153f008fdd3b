use axum::Router;

pub mod payment_methods;
pub mod receivables;
pub mod system;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/receivables", receivables::router())
        .nest("/payment-methods", payment_methods::router())
}
