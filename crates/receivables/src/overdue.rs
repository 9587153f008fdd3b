//! Overdue classification (ABERTO → VENCIDO).
//!
//! What makes a receivable overdue is a policy decision, so it lives behind a
//! trait; the lifecycle service only asks the classifier and applies the flip.

use chrono::NaiveDate;

use crate::account::{AccountReceivable, ReceivableStatus};

/// Decides whether an open receivable should be marked VENCIDO on `today`.
pub trait OverdueClassifier: Send + Sync + 'static {
    fn is_overdue(&self, account: &AccountReceivable, today: NaiveDate) -> bool;
}

/// Default policy: an ABERTO receivable is overdue once `today` is past its due
/// date plus an optional grace period.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DueDateClassifier {
    grace_days: u32,
}

impl DueDateClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace_days(grace_days: u32) -> Self {
        Self { grace_days }
    }
}

impl OverdueClassifier for DueDateClassifier {
    fn is_overdue(&self, account: &AccountReceivable, today: NaiveDate) -> bool {
        if account.status != ReceivableStatus::Open {
            return false;
        }
        match account.due_date.checked_add_days(chrono::Days::new(u64::from(self.grace_days))) {
            Some(limit) => today > limit,
            None => false,
        }
    }
}
