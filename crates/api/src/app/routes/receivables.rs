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
use chrono::Utc;

use gestao_core::ReceivableId;
use gestao_receivables::SettleReceivable;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_receivable).get(list_receivables))
        .route("/overdue/refresh", post(refresh_overdue))
        .route("/:id", get(get_receivable).delete(delete_receivable))
        .route("/:id/settle", post(settle_receivable))
        .route("/:id/cancel", post(cancel_receivable))
        .route("/:id/settlement-preview", get(settlement_preview))
}

pub async fn open_receivable(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OpenReceivableRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };
    let request = match body.into_domain() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.lifecycle.open(request).await {
        Ok(account) => (StatusCode::CREATED, Json(dto::receivable_to_json(&account))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_receivables(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListReceivablesQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    match services.lifecycle.list(&filter).await {
        Ok(items) => {
            let items = items.iter().map(dto::receivable_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_receivable(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReceivableId = match errors::parse_id(&id, "receivable") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle.get(id).await {
        Ok(account) => (StatusCode::OK, Json(dto::receivable_to_json(&account))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn delete_receivable(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReceivableId = match errors::parse_id(&id, "receivable") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn settle_receivable(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<SettleReceivable>, JsonRejection>,
) -> axum::response::Response {
    let id: ReceivableId = match errors::parse_id(&id, "receivable") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::body_rejection(rejection),
    };

    match services.lifecycle.settle(id, body).await {
        Ok(account) => (StatusCode::OK, Json(dto::receivable_to_json(&account))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn cancel_receivable(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> axum::response::Response {
    let id: ReceivableId = match errors::parse_id(&id, "receivable") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(b)| b.reason);

    match services.lifecycle.cancel(id, reason).await {
        Ok(account) => (StatusCode::OK, Json(dto::receivable_to_json(&account))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn settlement_preview(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    query: Result<Query<dto::SettlementPreviewQuery>, QueryRejection>,
) -> axum::response::Response {
    let id: ReceivableId = match errors::parse_id(&id, "receivable") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let (discount, interest, penalty) = match query.parse() {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    match services
        .lifecycle
        .settlement_preview(id, discount, interest, penalty)
        .await
    {
        Ok(preview) => (StatusCode::OK, Json(dto::preview_to_json(&preview))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn refresh_overdue(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let today = Utc::now().date_naive();
    match services.lifecycle.refresh_overdue(today).await {
        Ok(changed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "marked_overdue": changed, "as_of": today.to_string() })),
        )
            .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
