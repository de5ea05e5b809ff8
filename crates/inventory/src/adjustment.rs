//! Adjustment commands and the pure decision function behind them.
//!
//! `decide` is deterministic and performs no IO: given a ledger and a command
//! it returns the next ledger plus the list of bucket changes that produced
//! it. Stamping those changes into audit records is the engine's job.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{StockBucket, StockLedger, UnavailableReason};

/// Buckets that accept a free-form delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeltaBucket {
    Available,
    OnHand,
}

impl From<DeltaBucket> for StockBucket {
    fn from(value: DeltaBucket) -> Self {
        match value {
            DeltaBucket::Available => StockBucket::Available,
            DeltaBucket::OnHand => StockBucket::OnHand,
        }
    }
}

/// A request to change a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdjustmentCommand {
    /// The warehouse re-counted one reason bucket.
    #[serde(rename_all = "camelCase")]
    SetUnavailable {
        reason: UnavailableReason,
        new_value: i64,
    },
    /// Reclassify a whole reason bucket as sellable.
    TransferUnavailableToAvailable { reason: UnavailableReason },
    /// Write off a whole reason bucket (disposal).
    ClearUnavailable { reason: UnavailableReason },
    /// Low-level delta on one bucket; other buckets are untouched.
    AdjustByDelta {
        bucket: DeltaBucket,
        delta: i64,
        reason: String,
    },
}

impl AdjustmentCommand {
    pub const RECOUNT_LABEL: &'static str = "recount";
    pub const TRANSFER_LABEL: &'static str = "transfer_to_available";
    pub const WRITE_OFF_LABEL: &'static str = "write_off";

    pub fn set_unavailable(reason: UnavailableReason, new_value: i64) -> Self {
        Self::SetUnavailable { reason, new_value }
    }

    pub fn transfer(reason: UnavailableReason) -> Self {
        Self::TransferUnavailableToAvailable { reason }
    }

    pub fn clear(reason: UnavailableReason) -> Self {
        Self::ClearUnavailable { reason }
    }

    pub fn adjust(bucket: DeltaBucket, delta: i64, reason: impl Into<String>) -> Self {
        Self::AdjustByDelta {
            bucket,
            delta,
            reason: reason.into(),
        }
    }

    /// The compensating `on_hand` delta that brings an unbalanced ledger back
    /// to `on_hand == available + committed + total_unavailable`.
    ///
    /// Returns `None` when the ledger is already consistent.
    pub fn reconcile_on_hand(ledger: &StockLedger, reason: impl Into<String>) -> Option<Self> {
        match ledger.discrepancy() {
            0 => None,
            d => Some(Self::adjust(DeltaBucket::OnHand, d.saturating_neg(), reason)),
        }
    }

    /// Audit label attached to every record this command produces.
    pub fn reason_label(&self) -> Cow<'_, str> {
        match self {
            AdjustmentCommand::SetUnavailable { .. } => Cow::Borrowed(Self::RECOUNT_LABEL),
            AdjustmentCommand::TransferUnavailableToAvailable { .. } => {
                Cow::Borrowed(Self::TRANSFER_LABEL)
            }
            AdjustmentCommand::ClearUnavailable { .. } => Cow::Borrowed(Self::WRITE_OFF_LABEL),
            AdjustmentCommand::AdjustByDelta { reason, .. } => Cow::Owned(reason.trim().to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AdjustmentCommand::SetUnavailable { .. } => "set_unavailable",
            AdjustmentCommand::TransferUnavailableToAvailable { .. } => "transfer_to_available",
            AdjustmentCommand::ClearUnavailable { .. } => "clear_unavailable",
            AdjustmentCommand::AdjustByDelta { .. } => "adjust_by_delta",
        }
    }
}

/// Why a command was rejected. The input ledger is never modified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdjustmentError {
    /// A requested value is negative or outside the representable range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A delta adjustment arrived without an audit reason.
    #[error("an adjustment reason is required")]
    MissingReason,

    /// The command would drive a bucket below zero.
    #[error("{target} would become negative ({current} {delta:+})")]
    NegativeResult {
        target: AdjustmentTarget,
        current: i64,
        delta: i64,
    },
}

impl AdjustmentError {
    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }
}

/// The bucket an adjustment touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum AdjustmentTarget {
    Bucket(StockBucket),
    Unavailable(UnavailableReason),
}

impl core::fmt::Display for AdjustmentTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AdjustmentTarget::Bucket(b) => write!(f, "{b}"),
            AdjustmentTarget::Unavailable(r) => write!(f, "unavailable.{r}"),
        }
    }
}

/// One bucket's before/after values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketChange {
    pub target: AdjustmentTarget,
    pub previous_value: i64,
    pub new_value: i64,
}

/// Result of a successful decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub ledger: StockLedger,
    /// Empty when the command was a no-op.
    pub changes: Vec<BucketChange>,
}

impl Adjustment {
    fn unchanged(ledger: &StockLedger) -> Self {
        Self {
            ledger: *ledger,
            changes: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Decide the outcome of `command` against `ledger`.
pub fn decide(ledger: &StockLedger, command: &AdjustmentCommand) -> Result<Adjustment, AdjustmentError> {
    match command {
        AdjustmentCommand::SetUnavailable { reason, new_value } => {
            decide_set(ledger, *reason, *new_value)
        }
        AdjustmentCommand::TransferUnavailableToAvailable { reason } => {
            decide_transfer(ledger, *reason)
        }
        AdjustmentCommand::ClearUnavailable { reason } => decide_clear(ledger, *reason),
        AdjustmentCommand::AdjustByDelta {
            bucket,
            delta,
            reason,
        } => decide_delta(ledger, (*bucket).into(), *delta, reason),
    }
}

fn decide_set(
    ledger: &StockLedger,
    reason: UnavailableReason,
    new_value: i64,
) -> Result<Adjustment, AdjustmentError> {
    if new_value < 0 {
        return Err(AdjustmentError::invalid_quantity(format!(
            "{reason} cannot be set to {new_value}"
        )));
    }
    let previous = ledger.unavailable(reason);
    if previous == new_value {
        return Ok(Adjustment::unchanged(ledger));
    }

    // Non-negativity was checked above, so the ledger cannot refuse the value.
    let next = ledger
        .with_unavailable_set(reason, new_value)
        .map_err(|e| AdjustmentError::invalid_quantity(e.to_string()))?;

    Ok(Adjustment {
        ledger: next,
        changes: vec![BucketChange {
            target: AdjustmentTarget::Unavailable(reason),
            previous_value: previous,
            new_value,
        }],
    })
}

fn decide_transfer(
    ledger: &StockLedger,
    reason: UnavailableReason,
) -> Result<Adjustment, AdjustmentError> {
    let moved = ledger.unavailable(reason);
    if moved == 0 {
        return Ok(Adjustment::unchanged(ledger));
    }

    let available = ledger.available();
    let new_available = available
        .checked_add(moved)
        .ok_or_else(|| AdjustmentError::invalid_quantity("available overflows"))?;

    let next = ledger
        .with_unavailable_set(reason, 0)
        .and_then(|l| l.with_bucket_set(StockBucket::Available, new_available))
        .map_err(|e| AdjustmentError::invalid_quantity(e.to_string()))?;

    Ok(Adjustment {
        ledger: next,
        changes: vec![
            BucketChange {
                target: AdjustmentTarget::Unavailable(reason),
                previous_value: moved,
                new_value: 0,
            },
            BucketChange {
                target: AdjustmentTarget::Bucket(StockBucket::Available),
                previous_value: available,
                new_value: new_available,
            },
        ],
    })
}

fn decide_clear(
    ledger: &StockLedger,
    reason: UnavailableReason,
) -> Result<Adjustment, AdjustmentError> {
    let written_off = ledger.unavailable(reason);
    if written_off == 0 {
        return Ok(Adjustment::unchanged(ledger));
    }

    let on_hand = ledger.on_hand();
    let new_on_hand = on_hand - written_off;
    if new_on_hand < 0 {
        return Err(AdjustmentError::NegativeResult {
            target: AdjustmentTarget::Bucket(StockBucket::OnHand),
            current: on_hand,
            delta: -written_off,
        });
    }

    let next = ledger
        .with_unavailable_set(reason, 0)
        .and_then(|l| l.with_bucket_set(StockBucket::OnHand, new_on_hand))
        .map_err(|e| AdjustmentError::invalid_quantity(e.to_string()))?;

    Ok(Adjustment {
        ledger: next,
        changes: vec![
            BucketChange {
                target: AdjustmentTarget::Unavailable(reason),
                previous_value: written_off,
                new_value: 0,
            },
            BucketChange {
                target: AdjustmentTarget::Bucket(StockBucket::OnHand),
                previous_value: on_hand,
                new_value: new_on_hand,
            },
        ],
    })
}

fn decide_delta(
    ledger: &StockLedger,
    bucket: StockBucket,
    delta: i64,
    reason: &str,
) -> Result<Adjustment, AdjustmentError> {
    if reason.trim().is_empty() {
        return Err(AdjustmentError::MissingReason);
    }
    if delta == 0 {
        return Ok(Adjustment::unchanged(ledger));
    }

    let current = ledger.bucket(bucket);
    let new_value = current.checked_add(delta).ok_or_else(|| {
        AdjustmentError::invalid_quantity(format!("{bucket} {current} {delta:+} overflows"))
    })?;
    if new_value < 0 {
        return Err(AdjustmentError::NegativeResult {
            target: AdjustmentTarget::Bucket(bucket),
            current,
            delta,
        });
    }

    let next = ledger
        .with_bucket_set(bucket, new_value)
        .map_err(|e| AdjustmentError::invalid_quantity(e.to_string()))?;

    Ok(Adjustment {
        ledger: next,
        changes: vec![BucketChange {
            target: AdjustmentTarget::Bucket(bucket),
            previous_value: current,
            new_value,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_ledger() -> StockLedger {
        StockLedger::new(25, 5, 30).unwrap()
    }

    fn recounted() -> StockLedger {
        decide(
            &scenario_ledger(),
            &AdjustmentCommand::set_unavailable(UnavailableReason::Damaged, 3),
        )
        .unwrap()
        .ledger
    }

    #[test]
    fn set_unavailable_leaves_other_buckets_and_flags_mismatch() {
        let adj = decide(
            &scenario_ledger(),
            &AdjustmentCommand::set_unavailable(UnavailableReason::Damaged, 3),
        )
        .unwrap();

        assert_eq!(adj.ledger.available(), 25);
        assert_eq!(adj.ledger.committed(), 5);
        assert_eq!(adj.ledger.on_hand(), 30);
        assert_eq!(adj.ledger.unavailable(UnavailableReason::Damaged), 3);
        assert!(!adj.ledger.is_consistent());
        assert_eq!(
            adj.changes,
            vec![BucketChange {
                target: AdjustmentTarget::Unavailable(UnavailableReason::Damaged),
                previous_value: 0,
                new_value: 3,
            }]
        );
    }

    #[test]
    fn set_unavailable_rejects_negative_value() {
        let err = decide(
            &scenario_ledger(),
            &AdjustmentCommand::set_unavailable(UnavailableReason::Other, -2),
        )
        .unwrap_err();
        assert!(matches!(err, AdjustmentError::InvalidQuantity(_)));
    }

    #[test]
    fn set_unavailable_to_same_value_is_noop() {
        let adj = decide(
            &scenario_ledger(),
            &AdjustmentCommand::set_unavailable(UnavailableReason::Damaged, 0),
        )
        .unwrap();
        assert!(adj.is_noop());
        assert_eq!(adj.ledger, scenario_ledger());
    }

    #[test]
    fn transfer_moves_bucket_into_available() {
        let adj = decide(
            &recounted(),
            &AdjustmentCommand::transfer(UnavailableReason::Damaged),
        )
        .unwrap();

        assert_eq!(adj.ledger.available(), 28);
        assert_eq!(adj.ledger.on_hand(), 30);
        assert_eq!(adj.ledger.unavailable(UnavailableReason::Damaged), 0);
        // the recount mismatch is carried over, neither repaired nor widened
        assert_eq!(adj.ledger.discrepancy(), -3);
        assert_eq!(adj.changes.len(), 2);
    }

    #[test]
    fn transfer_keeps_a_reconciled_ledger_consistent() {
        let ledger = StockLedger::new(25, 5, 33)
            .unwrap()
            .with_unavailable_set(UnavailableReason::Damaged, 3)
            .unwrap();
        assert!(ledger.is_consistent());

        let adj = decide(&ledger, &AdjustmentCommand::transfer(UnavailableReason::Damaged)).unwrap();
        assert_eq!(adj.ledger.available(), 28);
        assert_eq!(adj.ledger.on_hand(), 33);
        assert!(adj.ledger.is_consistent());
    }

    #[test]
    fn transfer_of_empty_bucket_is_noop() {
        let adj = decide(
            &scenario_ledger(),
            &AdjustmentCommand::transfer(UnavailableReason::SafetyStock),
        )
        .unwrap();
        assert!(adj.is_noop());
    }

    #[test]
    fn clear_writes_off_and_reduces_on_hand() {
        let adj = decide(&recounted(), &AdjustmentCommand::clear(UnavailableReason::Damaged)).unwrap();

        assert_eq!(adj.ledger.available(), 25);
        assert_eq!(adj.ledger.committed(), 5);
        assert_eq!(adj.ledger.on_hand(), 27);
        assert_eq!(adj.ledger.unavailable(UnavailableReason::Damaged), 0);
        assert_eq!(adj.ledger.discrepancy(), -3);
    }

    #[test]
    fn clear_keeps_a_reconciled_ledger_consistent() {
        let ledger = StockLedger::new(25, 5, 33)
            .unwrap()
            .with_unavailable_set(UnavailableReason::Damaged, 3)
            .unwrap();

        let adj = decide(&ledger, &AdjustmentCommand::clear(UnavailableReason::Damaged)).unwrap();
        assert_eq!(adj.ledger.on_hand(), 30);
        assert_eq!(adj.ledger.unavailable(UnavailableReason::Damaged), 0);
        assert!(adj.ledger.is_consistent());
    }

    #[test]
    fn clear_rejects_write_off_larger_than_on_hand() {
        let ledger = StockLedger::new(0, 0, 1)
            .unwrap()
            .with_unavailable_set(UnavailableReason::Damaged, 4)
            .unwrap();
        let err = decide(&ledger, &AdjustmentCommand::clear(UnavailableReason::Damaged)).unwrap_err();
        assert_eq!(
            err,
            AdjustmentError::NegativeResult {
                target: AdjustmentTarget::Bucket(StockBucket::OnHand),
                current: 1,
                delta: -4,
            }
        );
    }

    #[test]
    fn delta_requires_reason() {
        for reason in ["", "   "] {
            let err = decide(
                &scenario_ledger(),
                &AdjustmentCommand::adjust(DeltaBucket::Available, 1, reason),
            )
            .unwrap_err();
            assert_eq!(err, AdjustmentError::MissingReason);
        }
    }

    #[test]
    fn delta_never_clamps_at_zero() {
        let err = decide(
            &scenario_ledger(),
            &AdjustmentCommand::adjust(DeltaBucket::Available, -30, "correction"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AdjustmentError::NegativeResult {
                target: AdjustmentTarget::Bucket(StockBucket::Available),
                current: 25,
                delta: -30,
            }
        );
    }

    #[test]
    fn delta_touches_only_named_bucket() {
        let adj = decide(
            &scenario_ledger(),
            &AdjustmentCommand::adjust(DeltaBucket::OnHand, 4, "cycle count"),
        )
        .unwrap();
        assert_eq!(adj.ledger.on_hand(), 34);
        assert_eq!(adj.ledger.available(), 25);
        assert!(!adj.ledger.is_consistent());
    }

    #[test]
    fn delta_overflow_is_invalid_quantity() {
        let err = decide(
            &scenario_ledger(),
            &AdjustmentCommand::adjust(DeltaBucket::OnHand, i64::MAX, "restock"),
        )
        .unwrap_err();
        assert!(matches!(err, AdjustmentError::InvalidQuantity(_)));
    }

    #[test]
    fn reconcile_on_hand_compensates_a_recount() {
        let ledger = recounted();
        let cmd = AdjustmentCommand::reconcile_on_hand(&ledger, "recount").unwrap();
        assert_eq!(cmd, AdjustmentCommand::adjust(DeltaBucket::OnHand, 3, "recount"));

        let reconciled = decide(&ledger, &cmd).unwrap().ledger;
        assert!(reconciled.is_consistent());
        assert_eq!(reconciled.on_hand(), 33);

        assert!(AdjustmentCommand::reconcile_on_hand(&reconciled, "recount").is_none());
    }

    #[test]
    fn reason_labels_are_stable() {
        assert_eq!(
            AdjustmentCommand::transfer(UnavailableReason::Damaged).reason_label(),
            "transfer_to_available"
        );
        assert_eq!(
            AdjustmentCommand::adjust(DeltaBucket::Available, 1, "  found in back room ").reason_label(),
            "found in back room"
        );
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let json = r#"{"type":"setUnavailable","reason":"qualityControl","newValue":7}"#;
        let cmd: AdjustmentCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            AdjustmentCommand::set_unavailable(UnavailableReason::QualityControl, 7)
        );

        let json = r#"{"type":"adjustByDelta","bucket":"onHand","delta":-2,"reason":"shrinkage"}"#;
        let cmd: AdjustmentCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd, AdjustmentCommand::adjust(DeltaBucket::OnHand, -2, "shrinkage"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn reason() -> impl Strategy<Value = UnavailableReason> {
            prop::sample::select(UnavailableReason::ALL.to_vec())
        }

        /// Consistent ledgers with arbitrary bucket splits.
        fn consistent_ledger() -> impl Strategy<Value = StockLedger> {
            (0i64..10_000, 0i64..10_000, prop::array::uniform4(0i64..10_000)).prop_map(
                |(available, committed, held)| {
                    let mut ledger = StockLedger::balanced(available, committed).unwrap();
                    let mut extra = 0;
                    for (reason, qty) in UnavailableReason::ALL.into_iter().zip(held) {
                        ledger = ledger.with_unavailable_set(reason, qty).unwrap();
                        extra += qty;
                    }
                    ledger
                        .with_bucket_set(StockBucket::OnHand, available + committed + extra)
                        .unwrap()
                },
            )
        }

        fn any_ledger() -> impl Strategy<Value = StockLedger> {
            (0i64..1_000_000, 0i64..1_000_000, 0i64..1_000_000, reason(), 0i64..1_000_000)
                .prop_map(|(a, c, o, r, q)| {
                    StockLedger::new(a, c, o)
                        .unwrap()
                        .with_unavailable_set(r, q)
                        .unwrap()
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: transfers and write-offs keep a consistent ledger consistent.
            #[test]
            fn transfer_and_clear_preserve_consistency(ledger in consistent_ledger(), r in reason()) {
                prop_assert!(ledger.is_consistent());

                let transferred = decide(&ledger, &AdjustmentCommand::transfer(r)).unwrap().ledger;
                prop_assert!(transferred.is_consistent());

                let cleared = decide(&ledger, &AdjustmentCommand::clear(r)).unwrap().ledger;
                prop_assert!(cleared.is_consistent());
            }

            /// Property: a second transfer of the same bucket changes nothing.
            #[test]
            fn transfer_is_idempotent(ledger in any_ledger(), r in reason()) {
                let once = decide(&ledger, &AdjustmentCommand::transfer(r)).unwrap();
                let twice = decide(&once.ledger, &AdjustmentCommand::transfer(r)).unwrap();
                prop_assert_eq!(twice.ledger, once.ledger);
                prop_assert!(twice.is_noop());
            }

            /// Property: a huge decrease is rejected and never clamped.
            #[test]
            fn huge_decrease_is_rejected(ledger in any_ledger()) {
                let before = ledger;
                let err = decide(
                    &ledger,
                    &AdjustmentCommand::adjust(DeltaBucket::Available, -1_000_000_000, "x"),
                )
                .unwrap_err();
                let is_negative_result = matches!(err, AdjustmentError::NegativeResult { .. });
                prop_assert!(is_negative_result);
                prop_assert_eq!(ledger, before);
            }

            /// Property: every recorded change matches the returned ledger.
            #[test]
            fn changes_describe_the_new_ledger(ledger in any_ledger(), r in reason(), v in 0i64..1000) {
                for cmd in [
                    AdjustmentCommand::set_unavailable(r, v),
                    AdjustmentCommand::transfer(r),
                    AdjustmentCommand::clear(r),
                ] {
                    if let Ok(adj) = decide(&ledger, &cmd) {
                        for change in &adj.changes {
                            let now = match change.target {
                                AdjustmentTarget::Bucket(b) => adj.ledger.bucket(b),
                                AdjustmentTarget::Unavailable(r) => adj.ledger.unavailable(r),
                            };
                            prop_assert_eq!(now, change.new_value);
                        }
                    }
                }
            }
        }
    }
}
