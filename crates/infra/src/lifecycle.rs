//! Receivable lifecycle orchestration (application-level service).
//!
//! ```text
//! settle(id, request)
//!   ↓
//! 1. Check request-level fields (receipt date, payment method)
//!   ↓
//! 2. Load the receivable                      → NotFound
//!   ↓
//! 3. Validate against it (status, full amount) → Validation
//!   ↓
//! 4. Payment method must exist and be active  → Validation
//!   ↓
//! 5. Conditional update in the store          → Applied / NotFound / Rejected
//! ```
//!
//! Domain rules live in `gestao-receivables`; this module only composes them
//! with a [`ReceivableStore`] and maps failures into [`LifecycleError`].

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use gestao_core::{DomainError, PaymentMethodId, ReceivableId};
use gestao_receivables::{
    AccountReceivable, DueDateClassifier, NewPaymentMethod, OpenReceivable, OverdueClassifier,
    PaymentMethod, ReceivableStatus, RemovalOutcome, SettleReceivable, SettlementAdjustments,
};

use crate::store::{ReceivableFilter, ReceivableStore, StoreError, Transition};

/// Failure of a lifecycle operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The referenced record does not exist.
    #[error("not found")]
    NotFound,

    /// The request was rejected (missing fields, wrong status, partial amount...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed; propagated unchanged.
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => LifecycleError::Validation(msg),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Constraint { message, .. } => LifecycleError::Validation(message),
            other => LifecycleError::Store(other),
        }
    }
}

/// What the settlement form shows before the user confirms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementPreview {
    pub receivable_id: ReceivableId,
    pub status: ReceivableStatus,
    pub can_settle: bool,
    pub original_amount: Decimal,
    pub adjustments: SettlementAdjustments,
    pub total: Decimal,
}

/// Application service driving receivables through their lifecycle.
pub struct ReceivableLifecycle<S> {
    store: S,
    classifier: Arc<dyn OverdueClassifier>,
}

impl<S: ReceivableStore> ReceivableLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self::with_classifier(store, Arc::new(DueDateClassifier::new()))
    }

    pub fn with_classifier(store: S, classifier: Arc<dyn OverdueClassifier>) -> Self {
        Self { store, classifier }
    }

    /// Open a new receivable in ABERTO.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id), err)]
    pub async fn open(&self, request: OpenReceivable) -> Result<AccountReceivable, LifecycleError> {
        let new = request.validate()?;
        if let Some(method_id) = new.payment_method_id {
            self.ensure_active_payment_method(method_id).await?;
        }

        let account = self.store.insert(new).await?;
        info!(receivable_id = %account.id, balance = %account.balance, "receivable opened");
        Ok(account)
    }

    pub async fn get(&self, id: ReceivableId) -> Result<AccountReceivable, LifecycleError> {
        self.store.find_by_id(id).await?.ok_or(LifecycleError::NotFound)
    }

    pub async fn list(&self, filter: &ReceivableFilter) -> Result<Vec<AccountReceivable>, LifecycleError> {
        Ok(self.store.list(filter).await?)
    }

    /// Live settlement total for the given adjustments.
    ///
    /// Adjustments left out fall back to the values stored on the receivable,
    /// mirroring how [`ReceivableLifecycle::settle`] fills them in.
    pub async fn settlement_preview(
        &self,
        id: ReceivableId,
        discount: Option<Decimal>,
        interest: Option<Decimal>,
        penalty: Option<Decimal>,
    ) -> Result<SettlementPreview, LifecycleError> {
        let account = self.get(id).await?;
        let stored = account.adjustments();
        let adjustments = SettlementAdjustments {
            discount: discount.unwrap_or(stored.discount),
            interest: interest.unwrap_or(stored.interest),
            penalty: penalty.unwrap_or(stored.penalty),
        };
        adjustments.validate()?;
        let total = adjustments.total_for(account.original_amount)?;

        Ok(SettlementPreview {
            receivable_id: account.id,
            status: account.status,
            can_settle: gestao_receivables::can_settle(Some(&account)),
            original_amount: account.original_amount,
            adjustments,
            total,
        })
    }

    /// Record the full receipt of a receivable (ABERTO/VENCIDO → RECEBIDO).
    #[instrument(skip(self, request), fields(receivable_id = %id), err)]
    pub async fn settle(
        &self,
        id: ReceivableId,
        request: SettleReceivable,
    ) -> Result<AccountReceivable, LifecycleError> {
        request.require_fields()?;

        let account = self.get(id).await?;
        let settlement = request.against(&account)?;
        self.ensure_active_payment_method(settlement.payment_method_id).await?;

        match self.store.settle(id, &settlement).await? {
            Transition::Applied(updated) => {
                info!(
                    receivable_id = %id,
                    received_amount = %updated.received_amount,
                    previous_status = %account.status,
                    "receivable settled"
                );
                Ok(updated)
            }
            Transition::NotFound => Err(LifecycleError::NotFound),
            Transition::Rejected(status) => {
                warn!(receivable_id = %id, %status, "settlement lost a race with another transition");
                Err(LifecycleError::Validation(format!(
                    "receivable {id} is {status} and cannot be settled"
                )))
            }
        }
    }

    /// Cancel a pending receivable (ABERTO/VENCIDO → CANCELADO).
    #[instrument(skip(self, reason), fields(receivable_id = %id), err)]
    pub async fn cancel(
        &self,
        id: ReceivableId,
        reason: Option<String>,
    ) -> Result<AccountReceivable, LifecycleError> {
        let account = self.get(id).await?;
        let cancellation = account.cancellation(reason.as_deref())?;

        match self.store.cancel(id, &cancellation).await? {
            Transition::Applied(updated) => {
                info!(receivable_id = %id, "receivable cancelled");
                Ok(updated)
            }
            Transition::NotFound => Err(LifecycleError::NotFound),
            Transition::Rejected(status) => Err(LifecycleError::Validation(format!(
                "receivable {id} is {status} and cannot be cancelled"
            ))),
        }
    }

    /// Mark every ABERTO receivable the classifier deems overdue as VENCIDO.
    ///
    /// Returns the number of receivables that changed.
    #[instrument(skip(self), err)]
    pub async fn refresh_overdue(&self, today: NaiveDate) -> Result<u64, LifecycleError> {
        let open = self
            .store
            .list(&ReceivableFilter::with_status(ReceivableStatus::Open))
            .await?;

        let overdue: Vec<ReceivableId> = open
            .iter()
            .filter(|a| self.classifier.is_overdue(a, today))
            .map(|a| a.id)
            .collect();

        let changed = self.store.mark_overdue(&overdue).await?;
        if changed > 0 {
            info!(changed, %today, "receivables marked overdue");
        }
        Ok(changed)
    }

    /// Hard delete.
    #[instrument(skip(self), fields(receivable_id = %id), err)]
    pub async fn delete(&self, id: ReceivableId) -> Result<(), LifecycleError> {
        if self.store.delete(id).await? {
            info!(receivable_id = %id, "receivable deleted");
            Ok(())
        } else {
            Err(LifecycleError::NotFound)
        }
    }

    pub async fn create_payment_method(&self, request: NewPaymentMethod) -> Result<PaymentMethod, LifecycleError> {
        let request = request.validate()?;
        Ok(self.store.insert_payment_method(request).await?)
    }

    pub async fn payment_method(&self, id: PaymentMethodId) -> Result<PaymentMethod, LifecycleError> {
        self.store
            .payment_method(id)
            .await?
            .ok_or(LifecycleError::NotFound)
    }

    pub async fn list_payment_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>, LifecycleError> {
        Ok(self.store.list_payment_methods(include_inactive).await?)
    }

    /// Remove a payment method: deactivated if referenced, deleted otherwise.
    #[instrument(skip(self), fields(payment_method_id = %id), err)]
    pub async fn remove_payment_method(&self, id: PaymentMethodId) -> Result<RemovalOutcome, LifecycleError> {
        let outcome = self
            .store
            .remove_payment_method(id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        info!(payment_method_id = %id, ?outcome, "payment method removed");
        Ok(outcome)
    }

    async fn ensure_active_payment_method(&self, id: PaymentMethodId) -> Result<(), LifecycleError> {
        if self.store.payment_method_is_active(id).await? {
            Ok(())
        } else {
            Err(LifecycleError::Validation(format!(
                "payment method {id} does not exist or is inactive"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReceivableStore;
    use gestao_core::{CustomerId, UserId};
    use gestao_receivables::DocumentKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lifecycle() -> ReceivableLifecycle<Arc<InMemoryReceivableStore>> {
        ReceivableLifecycle::new(Arc::new(InMemoryReceivableStore::new()))
    }

    fn open_request(original: i64, interest: i64) -> OpenReceivable {
        OpenReceivable {
            customer_id: CustomerId::new(10),
            document_number: "FAT-2026-001".to_string(),
            document_kind: DocumentKind::Fatura,
            issue_date: date(2026, 1, 5),
            due_date: date(2026, 2, 5),
            original_amount: Decimal::from(original),
            discount: None,
            interest: Some(Decimal::from(interest)),
            penalty: None,
            payment_method_id: None,
            notes: None,
        }
    }

    async fn payment_method(lc: &ReceivableLifecycle<Arc<InMemoryReceivableStore>>) -> PaymentMethodId {
        lc.create_payment_method(NewPaymentMethod { name: "PIX".to_string() })
            .await
            .unwrap()
            .id
    }

    fn settle_request(method: PaymentMethodId) -> SettleReceivable {
        SettleReceivable {
            receipt_date: Some(date(2026, 2, 20)),
            payment_method_id: Some(method),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn settling_overdue_receivable_zeroes_balance() {
        let lc = lifecycle();
        let method = payment_method(&lc).await;
        let account = lc.open(open_request(500, 25)).await.unwrap();

        assert_eq!(lc.refresh_overdue(date(2026, 2, 10)).await.unwrap(), 1);
        assert_eq!(lc.get(account.id).await.unwrap().status, ReceivableStatus::Overdue);

        let settled = lc
            .settle(
                account.id,
                SettleReceivable {
                    settled_by: Some(UserId::new(4)),
                    ..settle_request(method)
                },
            )
            .await
            .unwrap();

        assert_eq!(settled.received_amount, Decimal::from(525));
        assert_eq!(settled.status, ReceivableStatus::Received);
        assert_eq!(settled.balance, Decimal::ZERO);
        assert_eq!(settled.receipt_date, Some(date(2026, 2, 20)));
        assert_eq!(settled.settled_by, Some(UserId::new(4)));
    }

    #[tokio::test]
    async fn unknown_receivable_is_not_found() {
        let lc = lifecycle();
        let method = payment_method(&lc).await;
        let err = lc
            .settle(ReceivableId::new(404), settle_request(method))
            .await
            .unwrap_err();
        assert_eq!(err, LifecycleError::NotFound);
    }

    #[tokio::test]
    async fn missing_payment_method_is_rejected_before_lookup() {
        let lc = lifecycle();
        let err = lc
            .settle(
                ReceivableId::new(404),
                SettleReceivable {
                    receipt_date: Some(date(2026, 2, 20)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn inactive_or_unknown_payment_method_is_rejected() {
        let lc = lifecycle();
        let account = lc.open(open_request(100, 0)).await.unwrap();

        let err = lc
            .settle(account.id, settle_request(PaymentMethodId::new(77)))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        // Referenced by `other`, so removal only deactivates it.
        let method = payment_method(&lc).await;
        let mut other = open_request(50, 0);
        other.payment_method_id = Some(method);
        lc.open(other).await.unwrap();
        assert_eq!(
            lc.remove_payment_method(method).await.unwrap(),
            RemovalOutcome::Deactivated
        );

        let err = lc
            .settle(account.id, settle_request(method))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(lc.get(account.id).await.unwrap().status, ReceivableStatus::Open);
    }

    #[tokio::test]
    async fn settled_and_cancelled_receivables_are_terminal() {
        let lc = lifecycle();
        let method = payment_method(&lc).await;

        let settled = lc.open(open_request(100, 0)).await.unwrap();
        lc.settle(settled.id, settle_request(method)).await.unwrap();
        assert!(matches!(
            lc.settle(settled.id, settle_request(method)).await,
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            lc.cancel(settled.id, None).await,
            Err(LifecycleError::Validation(_))
        ));

        let cancelled = lc.open(open_request(100, 0)).await.unwrap();
        lc.cancel(cancelled.id, Some("duplicate".to_string())).await.unwrap();
        assert!(matches!(
            lc.settle(cancelled.id, settle_request(method)).await,
            Err(LifecycleError::Validation(_))
        ));
        assert_eq!(lc.refresh_overdue(date(2030, 1, 1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn partial_receipt_leaves_receivable_open() {
        let lc = lifecycle();
        let method = payment_method(&lc).await;
        let account = lc.open(open_request(1000, 0)).await.unwrap();

        let err = lc
            .settle(
                account.id,
                SettleReceivable {
                    received_amount: Some(Decimal::from(400)),
                    ..settle_request(method)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let reloaded = lc.get(account.id).await.unwrap();
        assert_eq!(reloaded.status, ReceivableStatus::Open);
        assert_eq!(reloaded.received_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn preview_reflects_live_adjustments() {
        let lc = lifecycle();
        let account = lc.open(open_request(1000, 0)).await.unwrap();

        let preview = lc
            .settlement_preview(
                account.id,
                Some(Decimal::from(100)),
                Some(Decimal::from(50)),
                Some(Decimal::from(20)),
            )
            .await
            .unwrap();
        assert!(preview.can_settle);
        assert_eq!(preview.total, Decimal::from(970));
    }

    #[tokio::test]
    async fn out_of_range_amounts_are_validation_errors() {
        let lc = lifecycle();
        let account = lc.open(open_request(1000, 0)).await.unwrap();

        let preview = lc
            .settlement_preview(account.id, None, Some(Decimal::MAX), None)
            .await;
        assert!(matches!(preview, Err(LifecycleError::Validation(_))));

        let mut req = open_request(0, 1);
        req.original_amount = Decimal::MAX;
        assert!(matches!(lc.open(req).await, Err(LifecycleError::Validation(_))));

        let mut req = settle_request(payment_method(&lc).await);
        req.discount = Some(Decimal::new(5, 3));
        assert!(matches!(lc.settle(account.id, req).await, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn open_rejects_unknown_payment_method() {
        let lc = lifecycle();
        let mut req = open_request(100, 0);
        req.payment_method_id = Some(PaymentMethodId::new(9));
        assert!(matches!(lc.open(req).await, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_is_hard_and_reports_missing_ids() {
        let lc = lifecycle();
        let account = lc.open(open_request(100, 0)).await.unwrap();
        lc.delete(account.id).await.unwrap();
        assert_eq!(lc.get(account.id).await.unwrap_err(), LifecycleError::NotFound);
        assert_eq!(lc.delete(account.id).await.unwrap_err(), LifecycleError::NotFound);
    }

    struct Always;

    impl OverdueClassifier for Always {
        fn is_overdue(&self, _account: &AccountReceivable, _today: NaiveDate) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn classifier_is_pluggable() {
        let lc = ReceivableLifecycle::with_classifier(
            Arc::new(InMemoryReceivableStore::new()),
            Arc::new(Always),
        );
        lc.open(open_request(100, 0)).await.unwrap();
        assert_eq!(lc.refresh_overdue(date(2026, 1, 5)).await.unwrap(), 1);
    }
}
