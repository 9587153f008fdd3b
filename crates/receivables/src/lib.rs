//! Accounts receivable domain module.
//!
//! This crate contains the business rules for receivables and their settlement,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod account;
pub mod overdue;
pub mod payment_method;
pub mod settlement;

pub use account::{
    AccountReceivable, Cancellation, DocumentKind, NewReceivable, OpenReceivable,
    ReceivableStatus, MAX_NOTES_LEN,
};
pub use overdue::{DueDateClassifier, OverdueClassifier};
pub use payment_method::{NewPaymentMethod, PaymentMethod, RemovalOutcome};
pub use settlement::{
    can_settle, compute_settlement_total, max_amount, validate_money, SettleReceivable, Settlement,
    SettlementAdjustments, MONEY_SCALE,
};
