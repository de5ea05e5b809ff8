//! Adjustment engine: decide, stamp, audit.
//!
//! The engine wraps [`decide`] with the side effects a caller needs around a
//! successful adjustment: one [`AdjustmentRecord`] per changed bucket is sent
//! to the audit sink before `apply` returns, and an unbalanced result is
//! logged. The ledger passed in is never mutated.

use tracing::{debug, warn};

use shopdesk_core::{Clock, SkuId, SystemClock};

use crate::adjustment::{decide, AdjustmentCommand, AdjustmentError, BucketChange};
use crate::audit::{AdjustmentRecord, AuditSink};
use crate::ledger::StockLedger;

/// A batch command failed; nothing from the batch was applied or audited.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("adjustment #{index} ({kind}) rejected: {source}")]
pub struct BatchError {
    pub index: usize,
    pub kind: &'static str,
    #[source]
    pub source: AdjustmentError,
}

/// Stateless transformer from `(ledger, command)` to a new ledger.
#[derive(Debug)]
pub struct AdjustmentEngine<S, C = SystemClock> {
    sink: S,
    clock: C,
}

impl<S: AuditSink> AdjustmentEngine<S, SystemClock> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            clock: SystemClock,
        }
    }
}

impl<S: AuditSink, C: Clock> AdjustmentEngine<S, C> {
    pub fn with_clock(sink: S, clock: C) -> Self {
        Self { sink, clock }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Apply one command.
    ///
    /// Rejections leave `ledger` as it was and emit nothing. A successful
    /// command may still produce an inconsistent ledger (a recount); callers
    /// should check `is_consistent()` on the result.
    ///
    /// Records are emitted per changed bucket, so a command that changes
    /// nothing (transferring or clearing an empty bucket, setting a bucket to
    /// its current value, a zero delta) succeeds without an audit record.
    pub fn apply(
        &self,
        sku_id: SkuId,
        ledger: &StockLedger,
        command: &AdjustmentCommand,
    ) -> Result<StockLedger, AdjustmentError> {
        let adjustment = decide(ledger, command).map_err(|e| {
            debug!(%sku_id, command = command.kind(), error = %e, "adjustment rejected");
            e
        })?;

        let label = command.reason_label();
        self.emit(sku_id, &adjustment.changes, &label);
        self.report(sku_id, command.kind(), &adjustment.ledger);

        Ok(adjustment.ledger)
    }

    /// Apply several commands atomically, in order.
    ///
    /// Each command sees the ledger produced by the previous one. If any
    /// command is rejected, no records are emitted and the error names the
    /// failing position.
    pub fn apply_all(
        &self,
        sku_id: SkuId,
        ledger: &StockLedger,
        commands: &[AdjustmentCommand],
    ) -> Result<StockLedger, BatchError> {
        let mut current = *ledger;
        let mut staged = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            let adjustment = decide(&current, command).map_err(|source| BatchError {
                index,
                kind: command.kind(),
                source,
            })?;
            current = adjustment.ledger;
            staged.push((command.reason_label(), adjustment.changes));
        }

        for (label, changes) in &staged {
            self.emit(sku_id, changes, label);
        }
        self.report(sku_id, "batch", &current);

        Ok(current)
    }

    fn emit(&self, sku_id: SkuId, changes: &[BucketChange], label: &str) {
        let timestamp = self.clock.now();
        for change in changes {
            self.sink.record(AdjustmentRecord {
                timestamp,
                sku_id,
                target: change.target,
                previous_value: change.previous_value,
                new_value: change.new_value,
                reason_label: label.to_string(),
            });
        }
    }

    fn report(&self, sku_id: SkuId, kind: &str, ledger: &StockLedger) {
        if ledger.is_consistent() {
            debug!(%sku_id, command = kind, "adjustment applied");
        } else {
            warn!(
                %sku_id,
                command = kind,
                on_hand = ledger.on_hand(),
                discrepancy = ledger.discrepancy(),
                "ledger does not reconcile after adjustment"
            );
        }
    }
}
