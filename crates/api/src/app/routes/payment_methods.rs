use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use gestao_core::PaymentMethodId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_payment_method).get(list_payment_methods))
        .route("/:id", get(get_payment_method).delete(remove_payment_method))
}

pub async fn create_payment_method(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreatePaymentMethodRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };

    match services.lifecycle.create_payment_method(body.into()).await {
        Ok(method) => (StatusCode::CREATED, Json(dto::payment_method_to_json(&method))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_payment_methods(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListPaymentMethodsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    match services.lifecycle.list_payment_methods(query.include_inactive).await {
        Ok(items) => {
            let items = items.iter().map(dto::payment_method_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_payment_method(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PaymentMethodId = match errors::parse_id(&id, "payment method") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle.payment_method(id).await {
        Ok(method) => (StatusCode::OK, Json(dto::payment_method_to_json(&method))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

/// Deactivates the method when receivables reference it, deletes it otherwise.
pub async fn remove_payment_method(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PaymentMethodId = match errors::parse_id(&id, "payment method") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle.remove_payment_method(id).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::removal_to_json(id, outcome))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
