// 📅 Aggregator - Daily net amounts per merchant
//
// Sums stay in integer cents. Days without transactions are not invented
// here; resampling to a fixed frequency belongs to the forecaster.

use crate::db::TransactionRecord;
use crate::error::{LedgerError, Result};
use crate::reconciliation::NetPurchaseRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNetEntry {
    pub date: NaiveDate,
    pub merchant_type_code: i64,
    pub net_amount_cents: i64,
}

/// Entries ordered by (date, merchant); per merchant the dates strictly increase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyNetSeries {
    entries: Vec<DailyNetEntry>,
}

impl DailyNetSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series, rejecting unsorted input and duplicate (date, merchant) pairs
    pub fn from_entries(entries: Vec<DailyNetEntry>) -> Result<Self> {
        for pair in entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if (a.date, a.merchant_type_code) >= (b.date, b.merchant_type_code) {
                return Err(LedgerError::data_shape(format!(
                    "series entries out of order or duplicated at {} / merchant {}",
                    b.date, b.merchant_type_code
                )));
            }
        }
        Ok(DailyNetSeries { entries })
    }

    pub fn entries(&self) -> &[DailyNetEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DailyNetEntry> {
        self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DailyNetEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.entries.first().map(|e| e.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.entries.last().map(|e| e.date)
    }

    pub fn merchants(&self) -> BTreeSet<i64> {
        self.entries.iter().map(|e| e.merchant_type_code).collect()
    }

    pub fn is_single_merchant(&self) -> bool {
        self.merchants().len() <= 1
    }

    pub fn for_merchant(&self, merchant_type_code: i64) -> DailyNetSeries {
        DailyNetSeries {
            entries: self
                .entries
                .iter()
                .filter(|e| e.merchant_type_code == merchant_type_code)
                .copied()
                .collect(),
        }
    }

    /// (entries[..index], entries[index..]); index past the end is clamped
    pub fn split_at(&self, index: usize) -> (DailyNetSeries, DailyNetSeries) {
        let index = index.min(self.entries.len());
        let (head, tail) = self.entries.split_at(index);
        (
            DailyNetSeries { entries: head.to_vec() },
            DailyNetSeries { entries: tail.to_vec() },
        )
    }

    pub fn amounts_cents(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.net_amount_cents).collect()
    }

    /// Net-amount column as floats, for the statistical stages
    pub fn amounts(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.net_amount_cents as f64).collect()
    }

    pub fn total_cents(&self) -> i64 {
        self.entries.iter().map(|e| e.net_amount_cents).sum()
    }

    /// True when some calendar day between consecutive dates has no entry
    pub fn has_gaps(&self) -> bool {
        let dates: BTreeSet<NaiveDate> = self.entries.iter().map(|e| e.date).collect();
        dates
            .iter()
            .zip(dates.iter().skip(1))
            .any(|(a, b)| (*b - *a).num_days() > 1)
    }
}

impl<'a> IntoIterator for &'a DailyNetSeries {
    type Item = &'a DailyNetEntry;
    type IntoIter = std::slice::Iter<'a, DailyNetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn collect_series(groups: BTreeMap<(NaiveDate, i64), i64>) -> DailyNetSeries {
    DailyNetSeries {
        entries: groups
            .into_iter()
            .map(|((date, merchant_type_code), net_amount_cents)| DailyNetEntry {
                date,
                merchant_type_code,
                net_amount_cents,
            })
            .collect(),
    }
}

/// Group by (calendar date, merchant) and sum amounts
pub fn aggregate(purchases: &[NetPurchaseRecord]) -> DailyNetSeries {
    let mut groups: BTreeMap<(NaiveDate, i64), i64> = BTreeMap::new();
    for p in purchases {
        *groups.entry((p.date(), p.merchant_type_code)).or_insert(0) += p.amount_cents;
    }
    collect_series(groups)
}

/// Like `aggregate`, with each return counted as a negative contribution
///
/// Pass the unmatched returns of a reconciliation; matched ones have already
/// removed their purchase.
pub fn aggregate_net(
    purchases: &[NetPurchaseRecord],
    returns: &[TransactionRecord],
) -> Result<DailyNetSeries> {
    let mut groups: BTreeMap<(NaiveDate, i64), i64> = BTreeMap::new();
    for p in purchases {
        *groups.entry((p.date(), p.merchant_type_code)).or_insert(0) += p.amount_cents;
    }
    for r in returns {
        if !r.is_return() {
            return Err(LedgerError::data_shape(format!(
                "aggregate_net expects returns, got {} for user {}",
                r.kind, r.user_id
            )));
        }
        *groups.entry((r.date(), r.merchant_type_code)).or_insert(0) -= r.amount_cents;
    }
    Ok(collect_series(groups))
}
