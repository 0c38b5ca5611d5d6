//! Per-session usage accounting sink.

use layer0::usage::UsageRecord;
use rust_decimal::Decimal;
use std::sync::Mutex;

/// Accumulates `UsageRecord`s for a single session.
///
/// Shared between a coordinator and its `CostTrackingClient` via `Arc`.
/// Appending is the only mutation — records are never edited or removed
/// once written.
pub struct CostTracker {
    records: Mutex<Vec<UsageRecord>>,
}

impl CostTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Append a usage record.
    pub fn record(&self, record: UsageRecord) {
        self.records.lock().unwrap().push(record);
    }

    /// Snapshot all recorded usage, in recording order.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Sum of `total_cost` across every recorded usage.
    pub fn total_cost(&self) -> Decimal {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.total_cost)
            .sum()
    }

    /// Sum of `total_tokens` across every recorded usage.
    pub fn total_tokens(&self) -> u64 {
        self.records.lock().unwrap().iter().map(|r| r.total_tokens).sum()
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer0::id::SessionId;

    fn usage(session: &str, cost: Decimal) -> UsageRecord {
        UsageRecord::new(
            SessionId::new(session),
            "test-model",
            "unknown",
            10,
            5,
            cost,
            Decimal::ZERO,
            0,
        )
    }

    #[test]
    fn starts_empty() {
        let tracker = CostTracker::new();
        assert!(tracker.records().is_empty());
        assert_eq!(tracker.total_cost(), Decimal::ZERO);
    }

    #[test]
    fn accumulates_records_in_order() {
        let tracker = CostTracker::new();
        tracker.record(usage("s1", Decimal::new(1, 0)));
        tracker.record(usage("s1", Decimal::new(2, 0)));

        assert_eq!(tracker.records().len(), 2);
        assert_eq!(tracker.total_cost(), Decimal::new(3, 0));
        assert_eq!(tracker.total_tokens(), 30);
    }
}
