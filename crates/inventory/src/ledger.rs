//! Stock ledger: the quantity buckets tracked for one SKU.
//!
//! The ledger is a pure value. It validates what it stores (no negative
//! buckets) but does not enforce the reconciliation invariant
//! `on_hand == available + committed + total_unavailable`; some adjustments
//! (a warehouse recount of a single bucket) legitimately leave it unbalanced
//! until the caller applies a compensating adjustment. `is_consistent()` and
//! `discrepancy()` report the state, they never coerce it.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use shopdesk_core::{DomainError, DomainResult, ValueObject};

/// Why a quantity is held back from sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnavailableReason {
    Damaged,
    QualityControl,
    SafetyStock,
    Other,
}

impl UnavailableReason {
    /// Every reason, in display order.
    pub const ALL: [UnavailableReason; 4] = [
        UnavailableReason::Damaged,
        UnavailableReason::QualityControl,
        UnavailableReason::SafetyStock,
        UnavailableReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::Damaged => "damaged",
            UnavailableReason::QualityControl => "qualityControl",
            UnavailableReason::SafetyStock => "safetyStock",
            UnavailableReason::Other => "other",
        }
    }

    fn index(self) -> usize {
        match self {
            UnavailableReason::Damaged => 0,
            UnavailableReason::QualityControl => 1,
            UnavailableReason::SafetyStock => 2,
            UnavailableReason::Other => 3,
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnavailableReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnavailableReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown unavailable reason: {s}")))
    }
}

/// A top-level quantity bucket of a ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockBucket {
    Available,
    Committed,
    OnHand,
}

impl StockBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockBucket::Available => "available",
            StockBucket::Committed => "committed",
            StockBucket::OnHand => "onHand",
        }
    }
}

impl fmt::Display for StockBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantities held back, one bucket per [`UnavailableReason`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBuckets")]
pub struct UnavailableBuckets {
    damaged: i64,
    quality_control: i64,
    safety_stock: i64,
    other: i64,
}

impl UnavailableBuckets {
    pub fn get(&self, reason: UnavailableReason) -> i64 {
        self.as_array()[reason.index()]
    }

    /// Sum of all reason buckets, saturating at `i64::MAX`.
    pub fn total(&self) -> i64 {
        i64::try_from(self.exact_total()).unwrap_or(i64::MAX)
    }

    fn exact_total(&self) -> i128 {
        self.as_array().iter().copied().map(i128::from).sum()
    }

    /// `(reason, quantity)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (UnavailableReason, i64)> + '_ {
        UnavailableReason::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    fn as_array(&self) -> [i64; 4] {
        [self.damaged, self.quality_control, self.safety_stock, self.other]
    }

    fn set(&mut self, reason: UnavailableReason, value: i64) {
        let slot = match reason {
            UnavailableReason::Damaged => &mut self.damaged,
            UnavailableReason::QualityControl => &mut self.quality_control,
            UnavailableReason::SafetyStock => &mut self.safety_stock,
            UnavailableReason::Other => &mut self.other,
        };
        *slot = value;
    }
}

/// Raw wire shape of [`UnavailableBuckets`], validated on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuckets {
    damaged: i64,
    quality_control: i64,
    safety_stock: i64,
    other: i64,
}

impl TryFrom<RawBuckets> for UnavailableBuckets {
    type Error = DomainError;

    fn try_from(raw: RawBuckets) -> Result<Self, Self::Error> {
        let buckets = Self {
            damaged: raw.damaged,
            quality_control: raw.quality_control,
            safety_stock: raw.safety_stock,
            other: raw.other,
        };
        for (reason, qty) in buckets.iter() {
            ensure_non_negative(reason.as_str(), qty)?;
        }
        Ok(buckets)
    }
}

/// Quantity buckets for one sellable unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLedger")]
pub struct StockLedger {
    available: i64,
    committed: i64,
    on_hand: i64,
    unavailable: UnavailableBuckets,
}

impl ValueObject for StockLedger {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLedger {
    available: i64,
    committed: i64,
    on_hand: i64,
    unavailable: UnavailableBuckets,
}

impl TryFrom<RawLedger> for StockLedger {
    type Error = DomainError;

    fn try_from(raw: RawLedger) -> Result<Self, Self::Error> {
        let mut ledger = Self::new(raw.available, raw.committed, raw.on_hand)?;
        ledger.unavailable = raw.unavailable;
        Ok(ledger)
    }
}

impl StockLedger {
    /// Build a ledger with empty unavailable buckets.
    pub fn new(available: i64, committed: i64, on_hand: i64) -> DomainResult<Self> {
        ensure_non_negative("available", available)?;
        ensure_non_negative("committed", committed)?;
        ensure_non_negative("onHand", on_hand)?;
        Ok(Self {
            available,
            committed,
            on_hand,
            unavailable: UnavailableBuckets::default(),
        })
    }

    /// A ledger whose on-hand count exactly covers the given buckets.
    pub fn balanced(available: i64, committed: i64) -> DomainResult<Self> {
        let on_hand = available
            .checked_add(committed)
            .ok_or_else(|| DomainError::validation("onHand overflows"))?;
        Self::new(available, committed, on_hand)
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn committed(&self) -> i64 {
        self.committed
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn bucket(&self, bucket: StockBucket) -> i64 {
        match bucket {
            StockBucket::Available => self.available,
            StockBucket::Committed => self.committed,
            StockBucket::OnHand => self.on_hand,
        }
    }

    pub fn unavailable(&self, reason: UnavailableReason) -> i64 {
        self.unavailable.get(reason)
    }

    pub fn unavailable_buckets(&self) -> &UnavailableBuckets {
        &self.unavailable
    }

    /// Replace one reason bucket. Leaves every other bucket untouched; whether
    /// to compensate `available` or `on_hand` is the caller's decision.
    pub fn with_unavailable_set(&self, reason: UnavailableReason, value: i64) -> DomainResult<Self> {
        ensure_non_negative(reason.as_str(), value)?;
        let mut next = *self;
        next.unavailable.set(reason, value);
        Ok(next)
    }

    /// Replace one top-level bucket.
    pub fn with_bucket_set(&self, bucket: StockBucket, value: i64) -> DomainResult<Self> {
        ensure_non_negative(bucket.as_str(), value)?;
        let mut next = *self;
        match bucket {
            StockBucket::Available => next.available = value,
            StockBucket::Committed => next.committed = value,
            StockBucket::OnHand => next.on_hand = value,
        }
        Ok(next)
    }

    pub fn total_unavailable(&self) -> i64 {
        self.unavailable.total()
    }

    /// `on_hand == available + committed + total_unavailable`.
    pub fn is_consistent(&self) -> bool {
        self.exact_discrepancy() == 0
    }

    /// How far `on_hand` is from the sum of the classified buckets.
    ///
    /// Positive: more physically present than classified. Negative: more
    /// classified than physically present.
    ///
    /// Saturates at the `i64` bounds.
    pub fn discrepancy(&self) -> i64 {
        let diff = self.exact_discrepancy();
        i64::try_from(diff).unwrap_or(if diff > 0 { i64::MAX } else { i64::MIN })
    }

    fn exact_discrepancy(&self) -> i128 {
        let classified = i128::from(self.available)
            + i128::from(self.committed)
            + self.unavailable.exact_total();
        i128::from(self.on_hand) - classified
    }
}

impl<'a> core::iter::Sum<&'a StockLedger> for StockLedger {
    /// Product-level totals across variant ledgers (saturating).
    fn sum<I: Iterator<Item = &'a StockLedger>>(iter: I) -> Self {
        iter.fold(StockLedger::default(), |mut acc, l| {
            acc.available = acc.available.saturating_add(l.available);
            acc.committed = acc.committed.saturating_add(l.committed);
            acc.on_hand = acc.on_hand.saturating_add(l.on_hand);
            for (reason, qty) in l.unavailable.iter() {
                let total = acc.unavailable.get(reason).saturating_add(qty);
                acc.unavailable.set(reason, total);
            }
            acc
        })
    }
}

fn ensure_non_negative(bucket: &str, value: i64) -> DomainResult<()> {
    if value < 0 {
        return Err(DomainError::validation(format!(
            "{bucket} cannot be negative (got {value})"
        )));
    }
    Ok(())
}
