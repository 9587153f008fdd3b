use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use gestao_core::{Entity, PaymentMethodId, ReceivableId};
use gestao_receivables::{
    AccountReceivable, Cancellation, NewPaymentMethod, NewReceivable, PaymentMethod,
    RemovalOutcome, Settlement,
};

use super::{ReceivableFilter, ReceivableStore, StoreError, Transition};

#[derive(Debug, Default)]
struct State {
    receivables: BTreeMap<ReceivableId, AccountReceivable>,
    payment_methods: BTreeMap<PaymentMethodId, PaymentMethod>,
    last_receivable_id: i64,
    last_payment_method_id: i64,
}

/// In-memory store for tests/dev.
///
/// Each operation holds the lock for its whole check-and-mutate step, which
/// gives the same atomicity as the conditional updates of the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryReceivableStore {
    inner: RwLock<State>,
}

impl InMemoryReceivableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl ReceivableStore for InMemoryReceivableStore {
    async fn insert(&self, new: NewReceivable) -> Result<AccountReceivable, StoreError> {
        let mut state = self.write()?;

        if let Some(method_id) = new.payment_method_id {
            if !state.payment_methods.contains_key(&method_id) {
                return Err(StoreError::constraint(
                    "insert_receivable",
                    format!("payment method {method_id} does not exist"),
                ));
            }
        }

        state.last_receivable_id += 1;
        let id = ReceivableId::new(state.last_receivable_id);
        let account = new.into_account(id, Utc::now());
        state.receivables.insert(account.id(), account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: ReceivableId) -> Result<Option<AccountReceivable>, StoreError> {
        Ok(self.read()?.receivables.get(&id).cloned())
    }

    async fn list(&self, filter: &ReceivableFilter) -> Result<Vec<AccountReceivable>, StoreError> {
        let state = self.read()?;
        let mut items: Vec<AccountReceivable> = state
            .receivables
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn settle(&self, id: ReceivableId, settlement: &Settlement) -> Result<Transition, StoreError> {
        let mut state = self.write()?;
        let state = &mut *state;

        let Some(account) = state.receivables.get_mut(&id) else {
            return Ok(Transition::NotFound);
        };
        if !account.can_be_settled() {
            return Ok(Transition::Rejected(account.status));
        }

        let method_is_active = state
            .payment_methods
            .get(&settlement.payment_method_id)
            .is_some_and(|m| m.is_active());
        if !method_is_active {
            return Err(StoreError::constraint(
                "settle_receivable",
                format!(
                    "payment method {} does not exist or is inactive",
                    settlement.payment_method_id
                ),
            ));
        }

        account
            .apply_settlement(settlement, Utc::now())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Transition::Applied(account.clone()))
    }

    async fn cancel(&self, id: ReceivableId, cancellation: &Cancellation) -> Result<Transition, StoreError> {
        let mut state = self.write()?;
        let Some(account) = state.receivables.get_mut(&id) else {
            return Ok(Transition::NotFound);
        };
        if !account.status.is_pending() {
            return Ok(Transition::Rejected(account.status));
        }
        account
            .apply_cancellation(cancellation, Utc::now())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Transition::Applied(account.clone()))
    }

    async fn mark_overdue(&self, ids: &[ReceivableId]) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let now = Utc::now();
        let mut changed = 0;
        for id in ids {
            if let Some(account) = state.receivables.get_mut(id) {
                if account.mark_overdue(now) {
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: ReceivableId) -> Result<bool, StoreError> {
        Ok(self.write()?.receivables.remove(&id).is_some())
    }

    async fn insert_payment_method(&self, new: NewPaymentMethod) -> Result<PaymentMethod, StoreError> {
        let mut state = self.write()?;
        state.last_payment_method_id += 1;
        let id = PaymentMethodId::new(state.last_payment_method_id);
        let method = new.into_payment_method(id, Utc::now());
        state.payment_methods.insert(method.id(), method.clone());
        Ok(method)
    }

    async fn payment_method(&self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError> {
        Ok(self.read()?.payment_methods.get(&id).cloned())
    }

    async fn list_payment_methods(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>, StoreError> {
        Ok(self
            .read()?
            .payment_methods
            .values()
            .filter(|m| include_inactive || m.is_active())
            .cloned()
            .collect())
    }

    async fn remove_payment_method(&self, id: PaymentMethodId) -> Result<Option<RemovalOutcome>, StoreError> {
        let mut state = self.write()?;
        if !state.payment_methods.contains_key(&id) {
            return Ok(None);
        }

        let references = state
            .receivables
            .values()
            .filter(|a| a.payment_method_id == Some(id))
            .count() as u64;

        let outcome = RemovalOutcome::for_references(references);
        match outcome {
            RemovalOutcome::Deleted => {
                state.payment_methods.remove(&id);
            }
            RemovalOutcome::Deactivated => {
                if let Some(method) = state.payment_methods.get_mut(&id) {
                    method.active = false;
                    method.updated_at = Utc::now();
                }
            }
        }
        Ok(Some(outcome))
    }
}
