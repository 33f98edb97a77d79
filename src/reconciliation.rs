// ⚖️ Reconciliation Engine - Remove purchases whose value was returned
//
// The ledger has no transaction identifier, so a return is matched to a
// purchase through a weak key: (merchant, amount_cents, calendar date).
//
// The policy decides what happens when several purchases share a key:
//   ExistenceBased       - every purchase whose key has any return is dropped
//   OneToOne             - each return consumes at most one purchase
//   RequireTransactionId - only explicit id matches count

use crate::db::{TransactionKind, TransactionRecord};
use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

// ============================================================================
// MATCH POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Over-matches: one return can suppress several same-key purchases
    #[default]
    ExistenceBased,

    /// Each return suppresses at most one purchase (earliest first)
    OneToOne,

    /// Return and purchase must carry the same transaction id
    RequireTransactionId,
}

impl MatchPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            MatchPolicy::ExistenceBased => "existence_based",
            MatchPolicy::OneToOne => "one_to_one",
            MatchPolicy::RequireTransactionId => "require_transaction_id",
        }
    }
}

/// Weak match key shared by a purchase and the return that cancels it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub merchant_type_code: i64,
    pub amount_cents: i64,
    pub date: NaiveDate,
}

impl MatchKey {
    pub fn of(record: &TransactionRecord) -> Self {
        MatchKey {
            merchant_type_code: record.merchant_type_code,
            amount_cents: record.amount_cents,
            date: record.date(),
        }
    }
}

// ============================================================================
// NET PURCHASE RECORD
// ============================================================================

/// A purchase that survived reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPurchaseRecord {
    pub merchant_type_code: i64,
    pub amount_cents: i64,
    pub timestamp: NaiveDateTime,
}

impl NetPurchaseRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

impl From<&TransactionRecord> for NetPurchaseRecord {
    fn from(record: &TransactionRecord) -> Self {
        NetPurchaseRecord {
            merchant_type_code: record.merchant_type_code,
            amount_cents: record.amount_cents,
            timestamp: record.timestamp,
        }
    }
}

// ============================================================================
// RECONCILIATION OUTCOME
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationOutcome {
    pub net_purchases: Vec<NetPurchaseRecord>,
    /// Purchases removed because a return matched them
    pub suppressed_purchases: Vec<TransactionRecord>,
    pub matched_returns: Vec<TransactionRecord>,
    /// Returns with no purchase counterpart (no effect on net purchases)
    pub unmatched_returns: Vec<TransactionRecord>,
}

impl ReconciliationOutcome {
    pub fn purchase_total_cents(&self) -> i64 {
        self.net_purchases.iter().map(|p| p.amount_cents).sum::<i64>()
            + self.suppressed_purchases.iter().map(|p| p.amount_cents).sum::<i64>()
    }

    pub fn net_total_cents(&self) -> i64 {
        self.net_purchases.iter().map(|p| p.amount_cents).sum()
    }

    pub fn matched_return_total_cents(&self) -> i64 {
        self.matched_returns.iter().map(|r| r.amount_cents).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} net purchases, {} suppressed, {} returns matched, {} unmatched",
            self.net_purchases.len(),
            self.suppressed_purchases.len(),
            self.matched_returns.len(),
            self.unmatched_returns.len()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    pub policy: MatchPolicy,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        ReconciliationEngine { policy }
    }

    /// Match returns to purchases and report every side of the match
    ///
    /// Pure function of its input. Shape errors abort before any output.
    pub fn reconcile_detailed(&self, records: &[TransactionRecord]) -> Result<ReconciliationOutcome> {
        for record in records {
            record.validate()?;
        }

        let (purchases, returns): (Vec<&TransactionRecord>, Vec<&TransactionRecord>) =
            records.iter().partition(|r| r.kind == TransactionKind::Purchase);

        let (suppressed, matched) = match self.policy {
            MatchPolicy::ExistenceBased => match_existence(&purchases, &returns),
            MatchPolicy::OneToOne => match_one_to_one(&purchases, &returns),
            MatchPolicy::RequireTransactionId => match_transaction_id(&purchases, &returns),
        };

        let mut outcome = ReconciliationOutcome::default();
        for (i, purchase) in purchases.iter().enumerate() {
            if suppressed[i] {
                outcome.suppressed_purchases.push((*purchase).clone());
            } else {
                outcome.net_purchases.push(NetPurchaseRecord::from(*purchase));
            }
        }
        for (i, ret) in returns.iter().enumerate() {
            if matched[i] {
                outcome.matched_returns.push((*ret).clone());
            } else {
                outcome.unmatched_returns.push((*ret).clone());
            }
        }

        debug!(policy = self.policy.name(), "{}", outcome.summary());
        Ok(outcome)
    }

    pub fn reconcile(&self, records: &[TransactionRecord]) -> Result<Vec<NetPurchaseRecord>> {
        Ok(self.reconcile_detailed(records)?.net_purchases)
    }
}

/// Shorthand for `ReconciliationEngine::with_policy(policy).reconcile(records)`
pub fn reconcile(records: &[TransactionRecord], policy: MatchPolicy) -> Result<Vec<NetPurchaseRecord>> {
    ReconciliationEngine::with_policy(policy).reconcile(records)
}

/// Any purchase sharing a key with any return is dropped
fn match_existence(
    purchases: &[&TransactionRecord],
    returns: &[&TransactionRecord],
) -> (Vec<bool>, Vec<bool>) {
    let return_keys: HashSet<MatchKey> = returns.iter().map(|r| MatchKey::of(r)).collect();
    let purchase_keys: HashSet<MatchKey> = purchases.iter().map(|p| MatchKey::of(p)).collect();

    let suppressed: Vec<bool> = purchases
        .iter()
        .map(|p| return_keys.contains(&MatchKey::of(p)))
        .collect();
    let matched: Vec<bool> = returns
        .iter()
        .map(|r| purchase_keys.contains(&MatchKey::of(r)))
        .collect();

    (suppressed, matched)
}

/// Each return consumes the earliest unconsumed purchase with its key
fn match_one_to_one(
    purchases: &[&TransactionRecord],
    returns: &[&TransactionRecord],
) -> (Vec<bool>, Vec<bool>) {
    let mut candidates: HashMap<MatchKey, Vec<usize>> = HashMap::new();
    for (i, p) in purchases.iter().enumerate() {
        candidates.entry(MatchKey::of(p)).or_default().push(i);
    }
    // Reverse order so pop() yields the earliest (timestamp, user_id, position)
    for indices in candidates.values_mut() {
        indices.sort_by(|&a, &b| {
            let (pa, pb) = (purchases[a], purchases[b]);
            (pb.timestamp, pb.user_id, b).cmp(&(pa.timestamp, pa.user_id, a))
        });
    }

    let mut suppressed = vec![false; purchases.len()];
    let matched: Vec<bool> = returns
        .iter()
        .map(|r| {
            match candidates.get_mut(&MatchKey::of(r)).and_then(|c| c.pop()) {
                Some(i) => {
                    suppressed[i] = true;
                    true
                }
                None => false,
            }
        })
        .collect();

    (suppressed, matched)
}

/// Only (merchant, transaction_id) pairs match; records without an id never do
fn match_transaction_id(
    purchases: &[&TransactionRecord],
    returns: &[&TransactionRecord],
) -> (Vec<bool>, Vec<bool>) {
    let id_key = |r: &TransactionRecord| {
        r.transaction_id
            .as_deref()
            .map(|id| (r.merchant_type_code, id.to_string()))
    };

    let return_ids: HashSet<(i64, String)> = returns.iter().filter_map(|r| id_key(*r)).collect();
    let purchase_ids: HashSet<(i64, String)> = purchases.iter().filter_map(|p| id_key(*p)).collect();

    let suppressed: Vec<bool> = purchases
        .iter()
        .map(|p| id_key(*p).is_some_and(|k| return_ids.contains(&k)))
        .collect();
    let matched: Vec<bool> = returns
        .iter()
        .map(|r| id_key(*r).is_some_and(|k| purchase_ids.contains(&k)))
        .collect();

    (suppressed, matched)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::parse_timestamp;
    use crate::error::LedgerError;

    fn record(kind: TransactionKind, user: i64, amount: i64, when: &str) -> TransactionRecord {
        TransactionRecord::new(user, 5732, amount, parse_timestamp(when).unwrap(), kind)
    }

    fn purchase(amount: i64, when: &str) -> TransactionRecord {
        record(TransactionKind::Purchase, 1, amount, when)
    }

    fn refund(amount: i64, when: &str) -> TransactionRecord {
        record(TransactionKind::Return, 1, amount, when)
    }

    #[test]
    fn test_drops_matched_purchase() {
        let ledger = vec![
            purchase(5000, "2023-01-01 08:00:00"),
            purchase(3000, "2023-01-02 09:00:00"),
            refund(5000, "2023-01-01 17:00:00"),
        ];

        let net = reconcile(&ledger, MatchPolicy::ExistenceBased).unwrap();

        assert_eq!(net.len(), 1);
        assert_eq!(net[0].amount_cents, 3000);
        assert_eq!(net[0].date(), NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
    }

    #[test]
    fn test_different_day_does_not_match() {
        let ledger = vec![
            purchase(5000, "2023-01-01 23:59:00"),
            refund(5000, "2023-01-02 00:01:00"),
        ];

        let outcome = ReconciliationEngine::new().reconcile_detailed(&ledger).unwrap();

        assert_eq!(outcome.net_purchases.len(), 1);
        assert_eq!(outcome.unmatched_returns.len(), 1);
        assert!(outcome.matched_returns.is_empty());
    }

    #[test]
    fn test_different_merchant_does_not_match() {
        let mut other = refund(5000, "2023-01-01 12:00:00");
        other.merchant_type_code = 4000;
        let ledger = vec![purchase(5000, "2023-01-01 08:00:00"), other];

        let net = reconcile(&ledger, MatchPolicy::ExistenceBased).unwrap();
        assert_eq!(net.len(), 1);
    }

    #[test]
    fn test_existence_based_over_matches() {
        // Two same-key purchases, one return: both purchases go
        let ledger = vec![
            purchase(2500, "2023-03-01 08:00:00"),
            purchase(2500, "2023-03-01 14:00:00"),
            refund(2500, "2023-03-01 18:00:00"),
        ];

        let outcome = ReconciliationEngine::with_policy(MatchPolicy::ExistenceBased)
            .reconcile_detailed(&ledger)
            .unwrap();

        assert!(outcome.net_purchases.is_empty());
        assert_eq!(outcome.suppressed_purchases.len(), 2);
        assert_eq!(outcome.matched_returns.len(), 1);
    }

    #[test]
    fn test_one_to_one_consumes_earliest() {
        let ledger = vec![
            purchase(2500, "2023-03-01 14:00:00"),
            purchase(2500, "2023-03-01 08:00:00"),
            refund(2500, "2023-03-01 18:00:00"),
        ];

        let outcome = ReconciliationEngine::with_policy(MatchPolicy::OneToOne)
            .reconcile_detailed(&ledger)
            .unwrap();

        assert_eq!(outcome.net_purchases.len(), 1);
        assert_eq!(
            outcome.net_purchases[0].timestamp,
            parse_timestamp("2023-03-01 14:00:00").unwrap()
        );
        assert_eq!(outcome.suppressed_purchases.len(), 1);
        assert_eq!(
            outcome.purchase_total_cents() - outcome.matched_return_total_cents(),
            outcome.net_total_cents()
        );
    }

    #[test]
    fn test_one_to_one_extra_return_unmatched() {
        let ledger = vec![
            purchase(2500, "2023-03-01 08:00:00"),
            refund(2500, "2023-03-01 10:00:00"),
            refund(2500, "2023-03-01 11:00:00"),
        ];

        let outcome = ReconciliationEngine::with_policy(MatchPolicy::OneToOne)
            .reconcile_detailed(&ledger)
            .unwrap();

        assert!(outcome.net_purchases.is_empty());
        assert_eq!(outcome.matched_returns.len(), 1);
        assert_eq!(outcome.unmatched_returns.len(), 1);
    }

    #[test]
    fn test_transaction_id_policy() {
        let ledger = vec![
            purchase(2500, "2023-03-01 08:00:00").with_transaction_id("tx-1"),
            purchase(2500, "2023-03-01 09:00:00").with_transaction_id("tx-2"),
            purchase(2500, "2023-03-01 10:00:00"),
            refund(2500, "2023-03-05 10:00:00").with_transaction_id("tx-2"),
            refund(2500, "2023-03-01 10:00:00"),
        ];

        let outcome = ReconciliationEngine::with_policy(MatchPolicy::RequireTransactionId)
            .reconcile_detailed(&ledger)
            .unwrap();

        // Only tx-2 matches, even though the dates differ
        assert_eq!(outcome.net_purchases.len(), 2);
        assert_eq!(outcome.suppressed_purchases.len(), 1);
        assert_eq!(outcome.suppressed_purchases[0].transaction_id.as_deref(), Some("tx-2"));
        assert_eq!(outcome.unmatched_returns.len(), 1);
    }

    #[test]
    fn test_empty_ledger() {
        for policy in [
            MatchPolicy::ExistenceBased,
            MatchPolicy::OneToOne,
            MatchPolicy::RequireTransactionId,
        ] {
            assert!(reconcile(&[], policy).unwrap().is_empty());
        }
    }

    #[test]
    fn test_negative_amount_is_shape_error() {
        let ledger = vec![purchase(100, "2023-01-01 08:00:00"), refund(-100, "2023-01-01 09:00:00")];
        let err = reconcile(&ledger, MatchPolicy::ExistenceBased).unwrap_err();
        assert!(matches!(err, LedgerError::DataShape(_)));
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&MatchPolicy::RequireTransactionId).unwrap();
        assert_eq!(json, "\"require_transaction_id\"");
        assert_eq!(MatchPolicy::default(), MatchPolicy::ExistenceBased);
    }
}
