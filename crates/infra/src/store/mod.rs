//! Persistence boundary for receivables and the payment methods they reference.
//!
//! State transitions are exposed as **conditional updates**: the store applies a
//! change only if the receivable is still in a pending status, in one atomic
//! step, and reports what it found otherwise. Callers never do
//! read-check-write across two round trips.

use std::sync::Arc;

use gestao_core::{CustomerId, Entity, PaymentMethodId, ReceivableId};
use gestao_receivables::{
    AccountReceivable, Cancellation, NewPaymentMethod, NewReceivable, PaymentMethod,
    ReceivableStatus, RemovalOutcome, Settlement,
};

pub mod error;
pub mod in_memory;
pub mod postgres;

pub use error::StoreError;
pub use in_memory::InMemoryReceivableStore;
pub use postgres::PostgresReceivableStore;

/// Result of a conditional status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The change was applied; carries the updated record.
    Applied(AccountReceivable),
    /// No receivable with that id exists.
    NotFound,
    /// The receivable exists but its status does not allow the change.
    Rejected(ReceivableStatus),
}

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivableFilter {
    pub status: Option<ReceivableStatus>,
    pub customer_id: Option<CustomerId>,
}

impl ReceivableFilter {
    pub fn with_status(status: ReceivableStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, account: &AccountReceivable) -> bool {
        self.status.is_none_or(|s| s == account.status)
            && self.customer_id.is_none_or(|c| c == account.customer_id)
    }
}

/// Store abstraction used by the lifecycle service.
#[async_trait::async_trait]
pub trait ReceivableStore: Send + Sync {
    /// Persist a new ABERTO receivable and assign its identifier.
    async fn insert(&self, new: NewReceivable) -> Result<AccountReceivable, StoreError>;

    async fn find_by_id(&self, id: ReceivableId) -> Result<Option<AccountReceivable>, StoreError>;

    /// Receivables matching `filter`, ordered by due date then id.
    async fn list(&self, filter: &ReceivableFilter) -> Result<Vec<AccountReceivable>, StoreError>;

    /// Record a settlement iff the receivable is still ABERTO or VENCIDO.
    async fn settle(&self, id: ReceivableId, settlement: &Settlement) -> Result<Transition, StoreError>;

    /// Move to CANCELADO iff the receivable is still ABERTO or VENCIDO.
    async fn cancel(&self, id: ReceivableId, cancellation: &Cancellation) -> Result<Transition, StoreError>;

    /// Flip the given receivables from ABERTO to VENCIDO; others are left alone.
    ///
    /// Returns how many rows changed.
    async fn mark_overdue(&self, ids: &[ReceivableId]) -> Result<u64, StoreError>;

    /// Hard delete. Returns `false` when nothing was deleted.
    async fn delete(&self, id: ReceivableId) -> Result<bool, StoreError>;

    async fn insert_payment_method(&self, new: NewPaymentMethod) -> Result<PaymentMethod, StoreError>;

    async fn payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError>;

    async fn list_payment_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>, StoreError>;

    /// Settlement precondition: the method exists and is active.
    async fn payment_method_is_active(&self, id: PaymentMethodId) -> Result<bool, StoreError> {
        Ok(self.payment_method(id).await?.is_some_and(|m| m.is_active()))
    }

    /// Deactivate the method if any receivable references it, delete it otherwise.
    ///
    /// Returns `None` when the method does not exist.
    async fn remove_payment_method(&self, id: PaymentMethodId) -> Result<Option<RemovalOutcome>, StoreError>;
}

#[async_trait::async_trait]
impl<S> ReceivableStore for Arc<S>
where
    S: ReceivableStore + ?Sized,
{
    async fn insert(&self, new: NewReceivable) -> Result<AccountReceivable, StoreError> {
        (**self).insert(new).await
    }

    async fn find_by_id(&self, id: ReceivableId) -> Result<Option<AccountReceivable>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn list(&self, filter: &ReceivableFilter) -> Result<Vec<AccountReceivable>, StoreError> {
        (**self).list(filter).await
    }

    async fn settle(&self, id: ReceivableId, settlement: &Settlement) -> Result<Transition, StoreError> {
        (**self).settle(id, settlement).await
    }

    async fn cancel(&self, id: ReceivableId, cancellation: &Cancellation) -> Result<Transition, StoreError> {
        (**self).cancel(id, cancellation).await
    }

    async fn mark_overdue(&self, ids: &[ReceivableId]) -> Result<u64, StoreError> {
        (**self).mark_overdue(ids).await
    }

    async fn delete(&self, id: ReceivableId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn insert_payment_method(&self, new: NewPaymentMethod) -> Result<PaymentMethod, StoreError> {
        (**self).insert_payment_method(new).await
    }

    async fn payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError> {
        (**self).payment_method(id).await
    }

    async fn list_payment_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>, StoreError> {
        (**self).list_payment_methods(include_inactive).await
    }

    async fn payment_method_is_active(&self, id: PaymentMethodId) -> Result<bool, StoreError> {
        (**self).payment_method_is_active(id).await
    }

    async fn remove_payment_method(&self, id: PaymentMethodId) -> Result<Option<RemovalOutcome>, StoreError> {
        (**self).remove_payment_method(id).await
    }
}
