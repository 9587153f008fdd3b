//! Payment methods referenced by settlements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestao_core::{DomainError, DomainResult, Entity, PaymentMethodId};

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for PaymentMethod {
    type Id = PaymentMethodId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Request to register a payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub name: String,
}

impl NewPaymentMethod {
    /// Trims the name and checks it is non-blank and short enough.
    pub fn validate(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self { name })
    }

    pub fn into_payment_method(self, id: PaymentMethodId, now: DateTime<Utc>) -> PaymentMethod {
        PaymentMethod {
            id,
            name: self.name,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What removing a payment method actually did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// Still referenced by receivables: kept, but marked inactive.
    Deactivated,
    /// Unreferenced: removed for good.
    Deleted,
}

impl RemovalOutcome {
    /// Referenced records are soft-deleted, everything else is hard-deleted.
    pub fn for_references(reference_count: u64) -> Self {
        if reference_count > 0 {
            RemovalOutcome::Deactivated
        } else {
            RemovalOutcome::Deleted
        }
    }
}
