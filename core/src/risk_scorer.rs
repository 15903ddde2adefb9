//! Pre-authorization risk score.
//!
//! score = sigmoid(intercept
//!                 + category_weight · baseline_risk(category)
//!                 + context_weight  · ln(geo_mult · method_mult)
//!                 + amount_weight   · ln(amount / pivot)
//!                 + latent)
//!
//! `latent` ~ N(0, noise_sigma) stands for card-level factors the
//! categorical and amount features cannot see. The weights are tuned so
//! the score separates failures from successes at an AUC of roughly
//! 0.82–0.85 under the default calibration.

use crate::{
    attribute_sampler::TransactionAttributes,
    config::ScoringConfig,
    error::{GenError, GenResult},
    rng::StreamRng,
    tables::DistributionTables,
};
use rand::distributions::Distribution;
use rand_distr::Normal;

/// Decimal places kept on the published score.
const SCORE_DECIMALS: i32 = 4;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: ScoringConfig,
    latent: Normal<f64>,
}

impl RiskScorer {
    pub fn new(tables: &DistributionTables) -> GenResult<Self> {
        let weights = tables.calibration().scoring.clone();
        let latent = Normal::new(0.0, weights.noise_sigma)
            .map_err(|e| GenError::calibration("scoring", "noise_sigma", e.to_string()))?;
        Ok(Self { weights, latent })
    }

    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }

    /// Deterministic part of the linear predictor.
    pub fn linear_predictor(&self, tables: &DistributionTables, attrs: &TransactionAttributes<'_>) -> f64 {
        let w = &self.weights;
        let context = tables.context_multiplier(attrs.geography, attrs.payment_method);
        w.intercept
            + w.category_weight * tables.baseline_risk(attrs.category)
            + w.context_weight * context.ln()
            + w.amount_weight * (attrs.amount_usd / w.amount_pivot_usd).ln()
    }

    /// Full score in [0, 1], rounded to the published precision.
    pub fn score(
        &self,
        tables: &DistributionTables,
        attrs: &TransactionAttributes<'_>,
        rng: &mut StreamRng,
    ) -> f64 {
        let z = self.linear_predictor(tables, attrs) + self.latent.sample(rng);
        round_score(sigmoid(z))
    }
}

/// Clamp into [0, 1] and round. NaN maps to the neutral midpoint.
fn round_score(raw: f64) -> f64 {
    if raw.is_nan() {
        log::warn!("risk score came out NaN; using 0.5");
        return 0.5;
    }
    let scale = 10f64.powi(SCORE_DECIMALS);
    (raw.clamp(0.0, 1.0) * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Calibration, merchant_population::Merchant};

    fn tables() -> DistributionTables {
        DistributionTables::compile(Calibration::bundled().unwrap()).unwrap()
    }

    fn attrs(merchant: &Merchant, geography: usize, payment_method: usize, amount_usd: f64) -> TransactionAttributes<'_> {
        TransactionAttributes {
            merchant,
            category: merchant.category,
            geography,
            payment_method,
            amount_usd,
        }
    }

    #[test]
    fn larger_amounts_score_riskier() {
        let tables = tables();
        let scorer = RiskScorer::new(&tables).unwrap();
        let m = Merchant { merchant_id: "MID_00000".into(), category: 0, weight: 1.0 };
        let small = scorer.linear_predictor(&tables, &attrs(&m, 0, 0, 20.0));
        let large = scorer.linear_predictor(&tables, &attrs(&m, 0, 0, 2_000.0));
        assert!(large > small);
    }

    #[test]
    fn riskier_context_scores_higher() {
        let tables = tables();
        let scorer = RiskScorer::new(&tables).unwrap();
        let m = Merchant { merchant_id: "MID_00000".into(), category: 0, weight: 1.0 };
        // US + Digital Wallet vs BR + BNPL in the bundled tables.
        let safe = scorer.linear_predictor(&tables, &attrs(&m, 0, 2, 80.0));
        let risky = scorer.linear_predictor(&tables, &attrs(&m, 4, 4, 80.0));
        assert!(risky > safe);
    }

    #[test]
    fn scores_are_bounded_and_rounded() {
        let tables = tables();
        let scorer = RiskScorer::new(&tables).unwrap();
        let m = Merchant { merchant_id: "MID_00000".into(), category: 2, weight: 1.0 };
        let mut rng = StreamRng::new(1, 1);
        for amount in [1.0, 50.0, 1_000.0, 1_000_000.0] {
            let s = scorer.score(&tables, &attrs(&m, 4, 4, amount), &mut rng);
            assert!((0.0..=1.0).contains(&s));
            assert_eq!(s, (s * 10_000.0).round() / 10_000.0);
        }
    }

    #[test]
    fn degenerate_scores_are_clamped() {
        assert_eq!(round_score(f64::NAN), 0.5);
        assert_eq!(round_score(1.7), 1.0);
        assert_eq!(round_score(-0.3), 0.0);
        assert_eq!(round_score(0.123_456), 0.1235);
    }

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) > 0.999_999);
        assert!(sigmoid(-40.0) < 1e-6);
    }
}
