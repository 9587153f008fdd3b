//! Settlement rules: eligibility, the binding settlement total, and the
//! transition to RECEBIDO.
//!
//! A receivable is settled in full or not at all. The amount received must
//! equal `original − discount + interest + penalty` exactly.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestao_core::{DomainError, DomainResult, PaymentMethodId, UserId};

use crate::account::{validate_notes, AccountReceivable, ReceivableStatus};

/// Discount, interest and penalty applied on top of the original amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementAdjustments {
    pub discount: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
}

impl SettlementAdjustments {
    /// Absent parts count as zero.
    pub fn from_parts(
        discount: Option<Decimal>,
        interest: Option<Decimal>,
        penalty: Option<Decimal>,
    ) -> Self {
        Self {
            discount: discount.unwrap_or(Decimal::ZERO),
            interest: interest.unwrap_or(Decimal::ZERO),
            penalty: penalty.unwrap_or(Decimal::ZERO),
        }
    }

    /// `original − discount + interest + penalty`, failing instead of overflowing.
    pub fn total_for(&self, original: Decimal) -> DomainResult<Decimal> {
        original
            .checked_sub(self.discount)
            .and_then(|t| t.checked_add(self.interest))
            .and_then(|t| t.checked_add(self.penalty))
            .ok_or_else(|| DomainError::validation("amount out of range"))
    }

    pub fn validate(&self) -> DomainResult<()> {
        for (name, value) in [
            ("discount", self.discount),
            ("interest", self.interest),
            ("penalty", self.penalty),
        ] {
            if value < Decimal::ZERO {
                return Err(DomainError::validation(format!("{name} must not be negative")));
            }
            validate_money(name, value)?;
        }
        Ok(())
    }
}

/// Decimal places a stored amount may carry.
pub const MONEY_SCALE: u32 = 2;

/// Exclusive bound on the magnitude of a stored amount (`NUMERIC(15, 2)`).
pub fn max_amount() -> Decimal {
    Decimal::from(10_000_000_000_000_i64)
}

/// Amounts must fit the money columns exactly: at most two decimal places and
/// a magnitude below [`max_amount`].
pub fn validate_money(name: &str, value: Decimal) -> DomainResult<()> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{name} must have at most {MONEY_SCALE} decimal places"
        )));
    }
    if value.abs() >= max_amount() {
        return Err(DomainError::validation(format!("{name} is out of range")));
    }
    Ok(())
}

/// Settlement total: `original − discount + interest + penalty`.
///
/// Absent adjustments count as zero. No floor is applied; callers that persist
/// a settlement go through [`SettleReceivable::against`], which rejects
/// negative totals. Fails only when the arithmetic overflows.
pub fn compute_settlement_total(
    original: Decimal,
    discount: Option<Decimal>,
    interest: Option<Decimal>,
    penalty: Option<Decimal>,
) -> DomainResult<Decimal> {
    SettlementAdjustments::from_parts(discount, interest, penalty).total_for(original)
}

/// True iff the receivable exists and is ABERTO or VENCIDO.
pub fn can_settle(account: Option<&AccountReceivable>) -> bool {
    account.is_some_and(AccountReceivable::can_be_settled)
}

/// Settlement request as submitted by a caller.
///
/// Adjustments left out fall back to the values stored on the receivable.
/// `received_amount` falls back to the computed total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleReceivable {
    #[serde(default)]
    pub received_amount: Option<Decimal>,
    #[serde(default)]
    pub receipt_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_method_id: Option<PaymentMethodId>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub interest: Option<Decimal>,
    #[serde(default)]
    pub penalty: Option<Decimal>,
    #[serde(default)]
    pub settled_by: Option<UserId>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SettleReceivable {
    /// Fields every settlement needs, independent of the target receivable.
    pub fn require_fields(&self) -> DomainResult<(NaiveDate, PaymentMethodId)> {
        let receipt_date = self
            .receipt_date
            .ok_or_else(|| DomainError::validation("receipt_date is required"))?;
        let payment_method_id = self
            .payment_method_id
            .ok_or_else(|| DomainError::validation("payment_method_id is required"))?;
        Ok((receipt_date, payment_method_id))
    }

    /// Validate this request against the receivable it targets.
    pub fn against(&self, account: &AccountReceivable) -> DomainResult<Settlement> {
        let (receipt_date, payment_method_id) = self.require_fields()?;

        if !account.can_be_settled() {
            return Err(DomainError::invariant(format!(
                "receivable {} is {} and cannot be settled",
                account.id, account.status
            )));
        }

        if receipt_date < account.issue_date {
            return Err(DomainError::validation("receipt_date must not precede issue_date"));
        }

        let stored = account.adjustments();
        let adjustments = SettlementAdjustments {
            discount: self.discount.unwrap_or(stored.discount),
            interest: self.interest.unwrap_or(stored.interest),
            penalty: self.penalty.unwrap_or(stored.penalty),
        };
        adjustments.validate()?;

        let total = adjustments.total_for(account.original_amount)?;
        validate_money("settlement total", total)?;
        if total < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "settlement total {total} is negative (discount exceeds amount due)"
            )));
        }

        let received_amount = self.received_amount.unwrap_or(total);
        validate_money("received_amount", received_amount)?;
        if received_amount != total {
            return Err(DomainError::validation(format!(
                "partial receipt is not permitted: received {received_amount}, total due {total}"
            )));
        }

        let notes = self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
        validate_notes(notes)?;

        Ok(Settlement {
            received_amount,
            receipt_date,
            payment_method_id,
            adjustments,
            settled_by: self.settled_by,
            notes: notes.map(str::to_string),
        })
    }
}

/// A validated settlement, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub received_amount: Decimal,
    pub receipt_date: NaiveDate,
    pub payment_method_id: PaymentMethodId,
    pub adjustments: SettlementAdjustments,
    pub settled_by: Option<UserId>,
    /// Replaces the stored notes when present.
    pub notes: Option<String>,
}

impl AccountReceivable {
    /// Transition to RECEBIDO in memory.
    pub fn apply_settlement(&mut self, settlement: &Settlement, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.can_be_settled() {
            return Err(DomainError::invariant(format!(
                "receivable {} is {} and cannot be settled",
                self.id, self.status
            )));
        }

        let balance = settlement
            .adjustments
            .total_for(self.original_amount)?
            .checked_sub(settlement.received_amount)
            .ok_or_else(|| DomainError::validation("amount out of range"))?;

        self.discount = settlement.adjustments.discount;
        self.interest = settlement.adjustments.interest;
        self.penalty = settlement.adjustments.penalty;
        self.received_amount = settlement.received_amount;
        self.balance = balance;
        self.receipt_date = Some(settlement.receipt_date);
        self.payment_method_id = Some(settlement.payment_method_id);
        self.status = ReceivableStatus::Received;
        if settlement.settled_by.is_some() {
            self.settled_by = settlement.settled_by;
        }
        if settlement.notes.is_some() {
            self.notes = settlement.notes.clone();
        }
        self.updated_at = now;
        Ok(())
    }
}
