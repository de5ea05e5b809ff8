//! Audit trail for ledger adjustments.
//!
//! Records are append-only and owned by whoever implements [`AuditSink`]; the
//! ledger itself keeps no history. Sinks are fire-and-forget: recording cannot
//! fail from the engine's point of view.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::SkuId;

use crate::adjustment::AdjustmentTarget;

/// One bucket change, stamped with time, SKU and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    pub timestamp: DateTime<Utc>,
    pub sku_id: SkuId,
    pub target: AdjustmentTarget,
    pub previous_value: i64,
    pub new_value: i64,
    pub reason_label: String,
}

impl AdjustmentRecord {
    pub fn delta(&self) -> i64 {
        self.new_value.saturating_sub(self.previous_value)
    }
}

/// Append-only destination for adjustment records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AdjustmentRecord);
}

impl<F> AuditSink for F
where
    F: Fn(AdjustmentRecord) + Send + Sync,
{
    fn record(&self, record: AdjustmentRecord) {
        self(record)
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: AdjustmentRecord) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AdjustmentRecord) {
        let payload = serde_json::to_string(&record).unwrap_or_default();
        tracing::info!(
            target: "shopdesk::audit",
            sku_id = %record.sku_id,
            target_bucket = %record.target,
            previous = record.previous_value,
            new = record.new_value,
            reason = %record.reason_label,
            record = %payload,
            "stock adjusted"
        );
    }
}

/// In-memory audit log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AdjustmentRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far, oldest first.
    pub fn records(&self) -> Vec<AdjustmentRecord> {
        self.lock().clone()
    }

    /// Records for one SKU, oldest first.
    pub fn records_for(&self, sku_id: SkuId) -> Vec<AdjustmentRecord> {
        self.lock()
            .iter()
            .filter(|r| r.sku_id == sku_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A poisoned log still holds valid records; keep serving them.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AdjustmentRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, record: AdjustmentRecord) {
        self.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ledger::{StockBucket, UnavailableReason};

    fn record(sku_id: SkuId, previous: i64, new: i64) -> AdjustmentRecord {
        AdjustmentRecord {
            timestamp: Utc::now(),
            sku_id,
            target: AdjustmentTarget::Bucket(StockBucket::Available),
            previous_value: previous,
            new_value: new,
            reason_label: "correction".to_string(),
        }
    }

    #[test]
    fn in_memory_log_keeps_append_order() {
        let log = InMemoryAuditLog::new();
        let sku = SkuId::new();
        log.record(record(sku, 0, 1));
        log.record(record(sku, 1, 5));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].new_value, 1);
        assert_eq!(records[1].delta(), 4);
    }

    #[test]
    fn records_for_filters_by_sku() {
        let log = InMemoryAuditLog::new();
        let a = SkuId::new();
        let b = SkuId::new();
        log.record(record(a, 0, 1));
        log.record(record(b, 0, 2));
        log.record(record(a, 1, 3));

        assert_eq!(log.records_for(a).len(), 2);
        assert_eq!(log.records_for(b).len(), 1);
    }

    #[test]
    fn closures_are_sinks() {
        let log = Arc::new(InMemoryAuditLog::new());
        let forward = {
            let log = Arc::clone(&log);
            move |r: AdjustmentRecord| log.record(r)
        };
        forward.record(record(SkuId::new(), 2, 0));
        log.record(record(SkuId::new(), 0, 2));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn record_serializes_target_and_labels() {
        let mut r = record(SkuId::new(), 3, 0);
        r.target = AdjustmentTarget::Unavailable(UnavailableReason::SafetyStock);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["target"]["kind"], "unavailable");
        assert_eq!(json["target"]["name"], "safetyStock");
        assert_eq!(json["previousValue"], 3);
        assert_eq!(json["reasonLabel"], "correction");
    }
}
