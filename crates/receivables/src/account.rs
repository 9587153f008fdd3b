use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestao_core::{CustomerId, DomainError, DomainResult, Entity, PaymentMethodId, ReceivableId, UserId};

use crate::settlement::{validate_money, SettlementAdjustments};

/// Upper bound for the free-text notes of a receivable, in characters.
pub const MAX_NOTES_LEN: usize = 500;

/// Receivable status lifecycle.
///
/// ```text
/// ABERTO ──► VENCIDO
///   │  \        │  \
///   │   \       │   ▼
///   │    ──────►│  CANCELADO
///   ▼           ▼
/// RECEBIDO ◄────┘
/// ```
///
/// RECEBIDO and CANCELADO are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceivableStatus {
    #[serde(rename = "ABERTO")]
    Open,
    #[serde(rename = "VENCIDO")]
    Overdue,
    #[serde(rename = "RECEBIDO")]
    Received,
    #[serde(rename = "CANCELADO")]
    Cancelled,
}

impl ReceivableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableStatus::Open => "ABERTO",
            ReceivableStatus::Overdue => "VENCIDO",
            ReceivableStatus::Received => "RECEBIDO",
            ReceivableStatus::Cancelled => "CANCELADO",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReceivableStatus::Open | ReceivableStatus::Overdue)
    }
}

impl core::fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ReceivableStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ABERTO" => Ok(ReceivableStatus::Open),
            "VENCIDO" => Ok(ReceivableStatus::Overdue),
            "RECEBIDO" => Ok(ReceivableStatus::Received),
            "CANCELADO" => Ok(ReceivableStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown receivable status '{other}' (expected ABERTO, VENCIDO, RECEBIDO or CANCELADO)"
            ))),
        }
    }
}

/// Kind of document backing a receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Fatura,
    Duplicata,
    Boleto,
    NotaFiscal,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Fatura => "FATURA",
            DocumentKind::Duplicata => "DUPLICATA",
            DocumentKind::Boleto => "BOLETO",
            DocumentKind::NotaFiscal => "NOTA_FISCAL",
        }
    }
}

impl core::str::FromStr for DocumentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FATURA" => Ok(DocumentKind::Fatura),
            "DUPLICATA" => Ok(DocumentKind::Duplicata),
            "BOLETO" => Ok(DocumentKind::Boleto),
            "NOTA_FISCAL" => Ok(DocumentKind::NotaFiscal),
            other => Err(DomainError::validation(format!("unknown document kind '{other}'"))),
        }
    }
}

/// A money claim against a customer.
///
/// `balance` is the amount still owed: the settlement total while the
/// receivable is pending, zero once it is RECEBIDO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReceivable {
    pub id: ReceivableId,
    pub customer_id: CustomerId,
    pub document_number: String,
    pub document_kind: DocumentKind,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub receipt_date: Option<NaiveDate>,
    pub original_amount: Decimal,
    pub discount: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
    pub received_amount: Decimal,
    pub balance: Decimal,
    pub payment_method_id: Option<PaymentMethodId>,
    pub status: ReceivableStatus,
    pub settled_by: Option<UserId>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountReceivable {
    pub fn adjustments(&self) -> SettlementAdjustments {
        SettlementAdjustments {
            discount: self.discount,
            interest: self.interest,
            penalty: self.penalty,
        }
    }

    /// Amount due if the receivable were settled with its stored adjustments.
    pub fn total_due(&self) -> DomainResult<Decimal> {
        self.adjustments().total_for(self.original_amount)
    }

    /// Invariant: only ABERTO / VENCIDO receivables accept a settlement.
    pub fn can_be_settled(&self) -> bool {
        self.status.is_pending()
    }

    /// Build the cancellation of this receivable, merging `reason` into the notes.
    pub fn cancellation(&self, reason: Option<&str>) -> DomainResult<Cancellation> {
        if !self.status.is_pending() {
            return Err(DomainError::invariant(format!(
                "receivable {} is {} and cannot be cancelled",
                self.id, self.status
            )));
        }

        let notes = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            None => self.notes.clone(),
            Some(reason) => {
                let line = format!("cancelled: {reason}");
                let merged = match self.notes.as_deref() {
                    Some(existing) if !existing.is_empty() => format!("{existing}\n{line}"),
                    _ => line,
                };
                Some(merged)
            }
        };
        validate_notes(notes.as_deref())?;

        Ok(Cancellation { notes })
    }

    /// Apply a cancellation in memory.
    pub fn apply_cancellation(&mut self, cancellation: &Cancellation, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.is_pending() {
            return Err(DomainError::invariant(format!(
                "receivable {} is {} and cannot be cancelled",
                self.id, self.status
            )));
        }
        self.status = ReceivableStatus::Cancelled;
        self.notes = cancellation.notes.clone();
        self.updated_at = now;
        Ok(())
    }

    /// Flip ABERTO to VENCIDO. Returns `false` when the status was not ABERTO.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ReceivableStatus::Open {
            return false;
        }
        self.status = ReceivableStatus::Overdue;
        self.updated_at = now;
        true
    }
}

impl Entity for AccountReceivable {
    type Id = ReceivableId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Outcome of a validated cancellation: the notes to persist alongside CANCELADO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub notes: Option<String>,
}

/// Request to open a new receivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReceivable {
    pub customer_id: CustomerId,
    pub document_number: String,
    pub document_kind: DocumentKind,
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
    pub payment_method_id: Option<PaymentMethodId>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OpenReceivable {
    /// Validate the request and derive the initial ABERTO state.
    ///
    /// A zero `original_amount` is allowed and opens with a zero balance; any
    /// other receivable must leave something due after its discount.
    pub fn validate(self) -> DomainResult<NewReceivable> {
        if self.customer_id.get() <= 0 {
            return Err(DomainError::validation("customer_id must be positive"));
        }

        let document_number = self.document_number.trim().to_string();
        if document_number.is_empty() {
            return Err(DomainError::validation("document_number is required"));
        }

        if self.original_amount < Decimal::ZERO {
            return Err(DomainError::validation("original_amount must not be negative"));
        }
        validate_money("original_amount", self.original_amount)?;

        if self.due_date < self.issue_date {
            return Err(DomainError::validation("due_date must not precede issue_date"));
        }

        let adjustments = SettlementAdjustments::from_parts(self.discount, self.interest, self.penalty);
        adjustments.validate()?;

        let total = adjustments.total_for(self.original_amount)?;
        validate_money("total due", total)?;
        if total < Decimal::ZERO || (total.is_zero() && !self.original_amount.is_zero()) {
            return Err(DomainError::validation(
                "discount must leave an amount due on the original amount plus interest and penalty",
            ));
        }

        let notes = self.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        validate_notes(notes.as_deref())?;

        Ok(NewReceivable {
            customer_id: self.customer_id,
            document_number,
            document_kind: self.document_kind,
            issue_date: self.issue_date,
            due_date: self.due_date,
            original_amount: self.original_amount,
            adjustments,
            balance: total,
            payment_method_id: self.payment_method_id,
            notes,
        })
    }
}

/// A validated receivable awaiting an identifier from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceivable {
    pub customer_id: CustomerId,
    pub document_number: String,
    pub document_kind: DocumentKind,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub original_amount: Decimal,
    pub adjustments: SettlementAdjustments,
    pub balance: Decimal,
    pub payment_method_id: Option<PaymentMethodId>,
    pub notes: Option<String>,
}

impl NewReceivable {
    pub fn into_account(self, id: ReceivableId, now: DateTime<Utc>) -> AccountReceivable {
        AccountReceivable {
            id,
            customer_id: self.customer_id,
            document_number: self.document_number,
            document_kind: self.document_kind,
            issue_date: self.issue_date,
            due_date: self.due_date,
            receipt_date: None,
            original_amount: self.original_amount,
            discount: self.adjustments.discount,
            interest: self.adjustments.interest,
            penalty: self.adjustments.penalty,
            received_amount: Decimal::ZERO,
            balance: self.balance,
            payment_method_id: self.payment_method_id,
            status: ReceivableStatus::Open,
            settled_by: None,
            notes: self.notes,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

pub(crate) fn validate_notes(notes: Option<&str>) -> DomainResult<()> {
    if let Some(notes) = notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(DomainError::validation(format!(
                "notes must be at most {MAX_NOTES_LEN} characters"
            )));
        }
    }
    Ok(())
}
