//! Outcome simulation.
//!
//! STATES:
//!   scored ──► success                        (terminal)
//!          └─► failed(code) ──► recovered     (terminal, retryable only)
//!                           └─► not recovered (terminal)
//!
//! The score never acts as a probability directly. A FailureBoundary maps
//! it to a failure probability, so the boundary shape can be tuned or
//! swapped without touching the scorer.

use crate::{
    attribute_sampler::TransactionAttributes,
    config::BoundaryConfig,
    risk_scorer::sigmoid,
    rng::StreamRng,
    tables::DistributionTables,
    types::DimIndex,
};

/// Monotonic map from risk score to failure probability.
pub trait FailureBoundary: Send + Sync {
    fn fail_probability(&self, score: f64) -> f64;
}

/// `floor + (ceiling - floor) · sigmoid((score - threshold) / width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticBoundary {
    pub threshold: f64,
    pub width: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl From<&BoundaryConfig> for LogisticBoundary {
    fn from(cfg: &BoundaryConfig) -> Self {
        Self {
            threshold: cfg.threshold,
            width: cfg.width,
            floor: cfg.floor,
            ceiling: cfg.ceiling,
        }
    }
}

impl FailureBoundary for LogisticBoundary {
    fn fail_probability(&self, score: f64) -> f64 {
        let p = self.floor + (self.ceiling - self.floor) * sigmoid((score - self.threshold) / self.width);
        p.clamp(self.floor, self.ceiling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryResult {
    NotRetryable,
    Recovered,
    NotRecovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed { code: DimIndex, retry: RetryResult },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn failure_code(&self) -> Option<DimIndex> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            Self::Success => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Failed { retry: RetryResult::Recovered | RetryResult::NotRecovered, .. }
        )
    }

    pub fn retry_recovered(&self) -> bool {
        matches!(self, Self::Failed { retry: RetryResult::Recovered, .. })
    }

    /// Retryable but not recovered: revenue still leaking.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failed { retry: RetryResult::NotRecovered, .. })
    }
}

pub struct OutcomeSimulator<'a> {
    tables: &'a DistributionTables,
    boundary: &'a dyn FailureBoundary,
}

impl<'a> OutcomeSimulator<'a> {
    pub fn new(tables: &'a DistributionTables, boundary: &'a dyn FailureBoundary) -> Self {
        Self { tables, boundary }
    }

    pub fn decide(&self, attrs: &TransactionAttributes<'_>, score: f64, rng: &mut StreamRng) -> Outcome {
        let p_fail = self.boundary.fail_probability(score);
        if rng.next_f64() >= p_fail {
            return Outcome::Success;
        }

        let code = self
            .tables
            .sample_failure_code(attrs.category, attrs.geography, attrs.payment_method, rng);
        let cfg = self.tables.failure_code(code);

        let retry = if !cfg.retryable {
            RetryResult::NotRetryable
        } else if rng.chance(cfg.recovery_rate) {
            RetryResult::Recovered
        } else {
            RetryResult::NotRecovered
        };
        Outcome::Failed { code, retry }
    }
}
