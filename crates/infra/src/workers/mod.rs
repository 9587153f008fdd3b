//! Background workers.

pub mod overdue_sweep;

pub use overdue_sweep::{OverdueSweep, SweepHandle};
