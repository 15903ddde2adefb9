//! Run summary and score diagnostics.
//!
//! Both accumulators consume records batch by batch, so a streamed run
//! never needs the whole table in memory.

use crate::record::TransactionRecord;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunSummary {
    pub transactions: u64,
    pub failed: u64,
    pub retryable: u64,
    pub recovered: u64,
    /// Retryable failures that were not recovered.
    pub recoverable: u64,
    pub revenue_leakage_usd: f64,
    pub failures_by_category: BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn observe(&mut self, record: &TransactionRecord<'_>) {
        self.transactions += 1;
        if !record.is_failed() {
            return;
        }
        self.failed += 1;
        *self
            .failures_by_category
            .entry(record.merchant_category.to_string())
            .or_insert(0) += 1;
        if record.is_retryable {
            self.retryable += 1;
        }
        if record.retry_recovered {
            self.recovered += 1;
        }
        if record.is_recoverable {
            self.recoverable += 1;
            self.revenue_leakage_usd += record.amount_usd;
        }
    }

    pub fn observe_all<'a, 'g: 'a>(&mut self, records: impl IntoIterator<Item = &'a TransactionRecord<'g>>) {
        for r in records {
            self.observe(r);
        }
    }

    pub fn failure_rate(&self) -> f64 {
        ratio(self.failed, self.transactions)
    }

    /// Retryable failures as a share of all transactions.
    pub fn retryable_share(&self) -> f64 {
        ratio(self.retryable, self.transactions)
    }

    pub fn recoverable_share(&self) -> f64 {
        ratio(self.recoverable, self.transactions)
    }

    /// Recovered retries as a share of retryable failures.
    pub fn recovery_rate(&self) -> f64 {
        ratio(self.recovered, self.retryable)
    }

    /// Category with the most failures; ties go to the first name in
    /// lexical order.
    pub fn top_failing_category(&self) -> Option<(&str, u64)> {
        self.failures_by_category
            .iter()
            .fold(None, |best: Option<(&str, u64)>, (name, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((name.as_str(), count)),
            })
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve of the risk score against the realized
/// outcome (failure = positive class). Rank-based, ties averaged.
#[derive(Debug, Clone, Default)]
pub struct AucAccumulator {
    pairs: Vec<(f64, bool)>,
}

impl AucAccumulator {
    pub fn with_capacity(n: usize) -> Self {
        Self { pairs: Vec::with_capacity(n) }
    }

    pub fn push(&mut self, score: f64, failed: bool) {
        self.pairs.push((score, failed));
    }

    pub fn observe(&mut self, record: &TransactionRecord<'_>) {
        self.push(record.pre_auth_risk_score, record.is_failed());
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// None when either class is absent.
    pub fn finish(mut self) -> Option<f64> {
        let positives = self.pairs.iter().filter(|(_, f)| *f).count();
        let negatives = self.pairs.len() - positives;
        if positives == 0 || negatives == 0 {
            return None;
        }

        self.pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut positive_rank_sum = 0.0;
        let mut i = 0;
        while i < self.pairs.len() {
            let mut j = i;
            while j < self.pairs.len() && self.pairs[j].0 == self.pairs[i].0 {
                j += 1;
            }
            // Ranks i+1..=j share their average.
            let avg_rank = (i + 1 + j) as f64 / 2.0;
            let tied_positives = self.pairs[i..j].iter().filter(|(_, f)| *f).count();
            positive_rank_sum += avg_rank * tied_positives as f64;
            i = j;
        }

        let p = positives as f64;
        let n = negatives as f64;
        Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
    }
}

/// Convenience over a full table.
pub fn score_auc<'a, 'g: 'a>(records: impl IntoIterator<Item = &'a TransactionRecord<'g>>) -> Option<f64> {
    let mut acc = AucAccumulator::default();
    for r in records {
        acc.observe(r);
    }
    acc.finish()
}
