//! Record assembly: one immutable output row per transaction.
//!
//! RULE: no business logic here. The assembler only copies sampled and
//! derived values into the fixed column set below.

use crate::{
    attribute_sampler::TransactionAttributes,
    outcome::Outcome,
    tables::DistributionTables,
    temporal::TemporalFields,
    types::{Status, TxnIndex},
};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;

/// Output columns, in order.
pub const COLUMNS: [&str; 19] = [
    "transaction_id",
    "timestamp",
    "merchant_id",
    "merchant_category",
    "geography",
    "currency",
    "payment_method",
    "amount_usd",
    "pre_auth_risk_score",
    "status",
    "failure_code",
    "is_retryable",
    "retry_recovered",
    "is_recoverable",
    "hour_of_day",
    "day_of_week",
    "is_weekend",
    "month",
    "year",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Names borrow from the generator's tables and merchant pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord<'g> {
    pub transaction_id: String,
    pub timestamp: NaiveDateTime,
    pub merchant_id: &'g str,
    pub merchant_category: &'g str,
    pub geography: &'g str,
    pub currency: &'g str,
    pub payment_method: &'g str,
    pub amount_usd: f64,
    pub pre_auth_risk_score: f64,
    pub status: Status,
    pub failure_code: Option<&'g str>,
    pub is_retryable: bool,
    pub retry_recovered: bool,
    pub is_recoverable: bool,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub month: u32,
    pub year: i32,
}

impl TransactionRecord<'_> {
    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// Header line matching `csv_row`.
    pub fn csv_header() -> String {
        COLUMNS.join(",")
    }

    /// Canonical flat rendering: booleans as 0/1, amount to cents,
    /// score to four decimals, empty field for a missing failure code.
    pub fn csv_row(&self) -> String {
        let mut row = String::with_capacity(192);
        // Writing into a String cannot fail.
        let _ = write!(
            row,
            "{},{},{},{},{},{},{},{:.2},{:.4},{},{},{},{},{},{},{},{},{},{}",
            self.transaction_id,
            self.timestamp.format(TIMESTAMP_FORMAT),
            csv_field(self.merchant_id),
            csv_field(self.merchant_category),
            csv_field(self.geography),
            csv_field(self.currency),
            csv_field(self.payment_method),
            self.amount_usd,
            self.pre_auth_risk_score,
            self.status.as_str(),
            self.failure_code.map(csv_field).unwrap_or_default(),
            self.is_retryable as u8,
            self.retry_recovered as u8,
            self.is_recoverable as u8,
            self.hour_of_day,
            self.day_of_week,
            self.is_weekend as u8,
            self.month,
            self.year,
        );
        row
    }
}

/// Quote a field if it carries a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn transaction_id(index: TxnIndex) -> String {
    format!("TXN_{index:07}")
}

pub struct RecordAssembler<'g> {
    tables: &'g DistributionTables,
}

impl<'g> RecordAssembler<'g> {
    pub fn new(tables: &'g DistributionTables) -> Self {
        Self { tables }
    }

    pub fn assemble(
        &self,
        index: TxnIndex,
        attrs: &TransactionAttributes<'g>,
        temporal: &TemporalFields,
        score: f64,
        outcome: Outcome,
    ) -> TransactionRecord<'g> {
        let t = self.tables;
        TransactionRecord {
            transaction_id: transaction_id(index),
            timestamp: temporal.timestamp,
            merchant_id: &attrs.merchant.merchant_id,
            merchant_category: t.category_name(attrs.category),
            geography: t.geography_name(attrs.geography),
            currency: t.currency(attrs.geography),
            payment_method: t.method_name(attrs.payment_method),
            amount_usd: attrs.amount_usd,
            pre_auth_risk_score: score,
            status: if outcome.is_failed() { Status::Failed } else { Status::Success },
            failure_code: outcome.failure_code().map(|c| t.failure_code(c).code.as_str()),
            is_retryable: outcome.is_retryable(),
            retry_recovered: outcome.retry_recovered(),
            is_recoverable: outcome.is_recoverable(),
            hour_of_day: temporal.hour_of_day,
            day_of_week: temporal.day_of_week,
            is_weekend: temporal.is_weekend,
            month: temporal.month,
            year: temporal.year,
        }
    }
}

/// Append-only output table.
#[derive(Debug, Clone, Default)]
pub struct OutputTable<'g> {
    rows: Vec<TransactionRecord<'g>>,
}

impl<'g> OutputTable<'g> {
    pub fn with_capacity(n: usize) -> Self {
        Self { rows: Vec::with_capacity(n) }
    }

    pub fn append(&mut self, record: TransactionRecord<'g>) {
        self.rows.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = TransactionRecord<'g>>) {
        self.rows.extend(records);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TransactionRecord<'g>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TransactionRecord<'g>> {
        self.rows
    }

    /// Whole table as CSV text, header first.
    pub fn to_csv(&self) -> String {
        let mut out = TransactionRecord::csv_header();
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.csv_row());
            out.push('\n');
        }
        out
    }
}
