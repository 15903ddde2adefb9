//! Shared primitive types used across the generator.

use serde::{Deserialize, Serialize};

/// Position of a transaction in the output table. Stable for a given
/// seed and count; also the source of the transaction identifier.
pub type TxnIndex = u64;

/// Index into one of the calibrated enumerations (category, geography,
/// payment method, failure code).
pub type DimIndex = usize;

/// Terminal payment outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed  => "failed",
        }
    }
}
