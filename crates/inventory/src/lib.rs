//! Inventory domain module.
//!
//! Per-SKU stock ledgers and the reason-coded adjustments applied to them,
//! implemented purely as deterministic domain logic (no IO, no timers).
//! Audit records leave the crate through a caller-supplied [`AuditSink`].

pub mod adjustment;
pub mod audit;
pub mod engine;
pub mod ledger;
pub mod variant;

pub use adjustment::{
    decide, Adjustment, AdjustmentCommand, AdjustmentError, AdjustmentTarget, BucketChange,
    DeltaBucket,
};
pub use audit::{AdjustmentRecord, AuditSink, InMemoryAuditLog, NoopAuditSink, TracingAuditSink};
pub use engine::{AdjustmentEngine, BatchError};
pub use ledger::{StockBucket, StockLedger, UnavailableBuckets, UnavailableReason};
pub use variant::ProductVariant;
