use std::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use gestao_core::{CustomerId, PaymentMethodId, UserId};
use gestao_infra::{ReceivableFilter, SettlementPreview};
use gestao_receivables::{
    AccountReceivable, DocumentKind, NewPaymentMethod, OpenReceivable, PaymentMethod,
    ReceivableStatus, RemovalOutcome,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenReceivableRequest {
    pub customer_id: i64,
    pub document_number: String,
    pub document_kind: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub original_amount: Decimal,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub interest: Option<Decimal>,
    #[serde(default)]
    pub penalty: Option<Decimal>,
    #[serde(default)]
    pub payment_method_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OpenReceivableRequest {
    pub fn into_domain(self) -> Result<OpenReceivable, axum::response::Response> {
        let document_kind = DocumentKind::from_str(&self.document_kind).map_err(|e| {
            errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", e.to_string())
        })?;

        Ok(OpenReceivable {
            customer_id: CustomerId::new(self.customer_id),
            document_number: self.document_number,
            document_kind,
            issue_date: self.issue_date,
            due_date: self.due_date,
            original_amount: self.original_amount,
            discount: self.discount,
            interest: self.interest,
            penalty: self.penalty,
            payment_method_id: self.payment_method_id.map(PaymentMethodId::new),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentMethodRequest {
    pub name: String,
}

impl From<CreatePaymentMethodRequest> for NewPaymentMethod {
    fn from(body: CreatePaymentMethodRequest) -> Self {
        NewPaymentMethod { name: body.name }
    }
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListReceivablesQuery {
    pub status: Option<String>,
    pub customer_id: Option<i64>,
}

impl ListReceivablesQuery {
    pub fn into_filter(self) -> Result<ReceivableFilter, axum::response::Response> {
        let status = match self.status.as_deref() {
            Some(raw) => Some(ReceivableStatus::from_str(raw).map_err(|e| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_status", e.to_string())
            })?),
            None => None,
        };

        Ok(ReceivableFilter {
            status,
            customer_id: self.customer_id.map(CustomerId::new),
        })
    }
}

/// Adjustments arrive as strings so `10.50` keeps its exact decimal value.
#[derive(Debug, Default, Deserialize)]
pub struct SettlementPreviewQuery {
    pub discount: Option<String>,
    pub interest: Option<String>,
    pub penalty: Option<String>,
}

impl SettlementPreviewQuery {
    pub fn parse(
        &self,
    ) -> Result<(Option<Decimal>, Option<Decimal>, Option<Decimal>), axum::response::Response> {
        Ok((
            parse_decimal("discount", self.discount.as_deref())?,
            parse_decimal("interest", self.interest.as_deref())?,
            parse_decimal("penalty", self.penalty.as_deref())?,
        ))
    }
}

fn parse_decimal(name: &str, raw: Option<&str>) -> Result<Option<Decimal>, axum::response::Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Decimal::from_str(s).map(Some).map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_query",
                format!("{name} must be a decimal number"),
            )
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentMethodsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// -------------------------
// JSON mappers
// -------------------------

pub fn receivable_to_json(a: &AccountReceivable) -> serde_json::Value {
    serde_json::json!({
        "id": a.id.get(),
        "customer_id": a.customer_id.get(),
        "document_number": a.document_number,
        "document_kind": a.document_kind.as_str(),
        "issue_date": a.issue_date.to_string(),
        "due_date": a.due_date.to_string(),
        "receipt_date": a.receipt_date.map(|d| d.to_string()),
        "original_amount": a.original_amount.to_string(),
        "discount": a.discount.to_string(),
        "interest": a.interest.to_string(),
        "penalty": a.penalty.to_string(),
        "total_due": a.total_due().ok().map(|t| t.to_string()),
        "received_amount": a.received_amount.to_string(),
        "balance": a.balance.to_string(),
        "payment_method_id": a.payment_method_id.map(PaymentMethodId::get),
        "status": a.status.as_str(),
        "settled_by": a.settled_by.map(UserId::get),
        "notes": a.notes,
        "active": a.active,
        "created_at": a.created_at.to_rfc3339(),
        "updated_at": a.updated_at.to_rfc3339(),
    })
}

pub fn payment_method_to_json(m: &PaymentMethod) -> serde_json::Value {
    serde_json::json!({
        "id": m.id.get(),
        "name": m.name,
        "active": m.active,
        "created_at": m.created_at.to_rfc3339(),
        "updated_at": m.updated_at.to_rfc3339(),
    })
}

pub fn preview_to_json(p: &SettlementPreview) -> serde_json::Value {
    serde_json::json!({
        "receivable_id": p.receivable_id.get(),
        "status": p.status.as_str(),
        "can_settle": p.can_settle,
        "original_amount": p.original_amount.to_string(),
        "discount": p.adjustments.discount.to_string(),
        "interest": p.adjustments.interest.to_string(),
        "penalty": p.adjustments.penalty.to_string(),
        "total": p.total.to_string(),
    })
}

pub fn removal_to_json(id: PaymentMethodId, outcome: RemovalOutcome) -> serde_json::Value {
    serde_json::json!({
        "id": id.get(),
        "outcome": match outcome {
            RemovalOutcome::Deactivated => "deactivated",
            RemovalOutcome::Deleted => "deleted",
        },
    })
}
