//! Infrastructure layer: receivable storage, lifecycle orchestration and
//! background workers.

pub mod lifecycle;
pub mod store;
pub mod workers;

pub use lifecycle::{LifecycleError, ReceivableLifecycle, SettlementPreview};
pub use store::{
    InMemoryReceivableStore, PostgresReceivableStore, ReceivableFilter, ReceivableStore,
    StoreError, Transition,
};
