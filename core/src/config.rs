//! Calibration document: the Distribution Tables as structured data.
//!
//! RULE: Every tunable number the generator uses lives here.
//! Components receive a compiled copy (see tables.rs) at construction;
//! nothing reads calibration from ambient state.
//!
//! Sparse maps (conditional code weights, hour weights, day profiles)
//! treat a missing key as the neutral weight 1.0.

use crate::error::{GenError, GenResult};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// The default calibration shipped with the crate.
const BUNDLED_CALIBRATION: &str = include_str!("../../data/calibration/default.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    /// Relative share of merchants assigned to this category.
    pub popularity: f64,
    /// Anchor of the log-normal amount distribution (its median), in USD.
    pub avg_amount: f64,
    pub amount_sigma: f64,
    pub baseline_risk: f64,
    /// Name of a day-of-week profile in `seasonality.day_profiles`.
    #[serde(default)]
    pub day_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeographyConfig {
    pub name: String,
    pub popularity: f64,
    pub fail_multiplier: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodConfig {
    pub name: String,
    pub popularity: f64,
    pub fail_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureCodeConfig {
    pub code: String,
    pub retryable: bool,
    /// Probability that a retry of this code recovers the payment.
    /// Ignored for non-retryable codes.
    pub recovery_rate: f64,
    pub base_weight: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub geography_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub method_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeasonalityConfig {
    /// Hour of day (0–23) → weight.
    #[serde(default)]
    pub hour_weights: BTreeMap<u32, f64>,
    /// Profile name → (day of week, 0 = Monday) → weight.
    #[serde(default)]
    pub day_profiles: BTreeMap<String, BTreeMap<u32, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeWindowConfig {
    pub start: NaiveDate,
    pub months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationConfig {
    pub merchant_count: usize,
    pub pareto_alpha: f64,
    /// Upper clamp on a single raw Pareto draw (x_min = 1).
    pub weight_cap: f64,
}

/// Linear weights of the pre-authorization risk score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub intercept: f64,
    pub category_weight: f64,
    pub context_weight: f64,
    pub amount_weight: f64,
    pub amount_pivot_usd: f64,
    pub noise_sigma: f64,
}

/// Shape of the score → failure-probability boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundaryConfig {
    pub threshold: f64,
    pub width: f64,
    pub floor: f64,
    pub ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmountConfig {
    pub floor_usd: f64,
    pub ceiling_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Calibration {
    pub version: String,
    pub categories: Vec<CategoryConfig>,
    pub geographies: Vec<GeographyConfig>,
    pub payment_methods: Vec<PaymentMethodConfig>,
    pub failure_codes: Vec<FailureCodeConfig>,
    #[serde(default)]
    pub seasonality: SeasonalityConfig,
    pub time_window: TimeWindowConfig,
    pub population: PopulationConfig,
    pub scoring: ScoringConfig,
    pub boundary: BoundaryConfig,
    pub amounts: AmountConfig,
}

/// Reproducibility control for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    pub seed: u64,
    pub transaction_count: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            transaction_count: 1_000_000,
        }
    }
}

impl Calibration {
    /// Load a calibration document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read calibration {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> GenResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// The default calibration compiled into the library.
    pub fn bundled() -> GenResult<Self> {
        Self::from_json(BUNDLED_CALIBRATION)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn geography_names(&self) -> impl Iterator<Item = &str> {
        self.geographies.iter().map(|g| g.name.as_str())
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.payment_methods.iter().map(|m| m.name.as_str())
    }

    /// Copy of this calibration restricted to a single category,
    /// geography and payment method. Conditional weights naming removed
    /// members are dropped.
    pub fn narrowed(&self, category: &str, geography: &str, method: &str) -> GenResult<Self> {
        let mut narrowed = self.clone();

        narrowed.categories.retain(|c| c.name == category);
        if narrowed.categories.is_empty() {
            return Err(GenError::calibration("categories", category, "unknown category"));
        }
        narrowed.geographies.retain(|g| g.name == geography);
        if narrowed.geographies.is_empty() {
            return Err(GenError::calibration("geographies", geography, "unknown geography"));
        }
        narrowed.payment_methods.retain(|m| m.name == method);
        if narrowed.payment_methods.is_empty() {
            return Err(GenError::calibration("payment_methods", method, "unknown payment method"));
        }

        for code in &mut narrowed.failure_codes {
            code.category_weights.retain(|k, _| k == category);
            code.geography_weights.retain(|k, _| k == geography);
            code.method_weights.retain(|k, _| k == method);
        }
        Ok(narrowed)
    }

    /// Check every table. Generation refuses to start on the first error.
    pub fn validate(&self) -> GenResult<()> {
        check_enumeration(
            "categories",
            self.categories.iter().map(|c| (c.name.as_str(), c.popularity)),
        )?;
        check_enumeration(
            "geographies",
            self.geographies.iter().map(|g| (g.name.as_str(), g.popularity)),
        )?;
        check_enumeration(
            "payment_methods",
            self.payment_methods.iter().map(|m| (m.name.as_str(), m.popularity)),
        )?;

        for cat in &self.categories {
            check_positive("categories", &cat.name, "avg_amount", cat.avg_amount)?;
            check_non_negative("categories", &cat.name, "amount_sigma", cat.amount_sigma)?;
            check_finite("categories", &cat.name, "baseline_risk", cat.baseline_risk)?;
            if let Some(profile) = &cat.day_profile {
                if !self.seasonality.day_profiles.contains_key(profile) {
                    return Err(GenError::calibration(
                        "categories",
                        &cat.name,
                        format!("day_profile '{profile}' is not defined in seasonality.day_profiles"),
                    ));
                }
            }
        }
        for geo in &self.geographies {
            check_positive("geographies", &geo.name, "fail_multiplier", geo.fail_multiplier)?;
            if geo.currency.trim().is_empty() {
                return Err(GenError::calibration("geographies", &geo.name, "currency is empty"));
            }
        }
        for method in &self.payment_methods {
            check_positive("payment_methods", &method.name, "fail_multiplier", method.fail_multiplier)?;
        }

        self.validate_failure_codes()?;
        self.validate_seasonality()?;
        self.validate_scalars()
    }

    fn validate_failure_codes(&self) -> GenResult<()> {
        const TABLE: &str = "failure_codes";
        if self.failure_codes.is_empty() {
            return Err(GenError::calibration(TABLE, "*", "enumeration is empty"));
        }

        let categories: HashSet<&str> = self.category_names().collect();
        let geographies: HashSet<&str> = self.geography_names().collect();
        let methods: HashSet<&str> = self.method_names().collect();
        let mut seen = HashSet::new();

        for code in &self.failure_codes {
            if code.code.trim().is_empty() {
                return Err(GenError::calibration(TABLE, "*", "code name is empty"));
            }
            if !seen.insert(code.code.as_str()) {
                return Err(GenError::calibration(TABLE, &code.code, "duplicate code"));
            }
            check_non_negative(TABLE, &code.code, "base_weight", code.base_weight)?;
            if !(0.0..=1.0).contains(&code.recovery_rate) {
                return Err(GenError::calibration(
                    TABLE,
                    &code.code,
                    format!("recovery_rate {} is outside [0, 1]", code.recovery_rate),
                ));
            }
            check_conditional(&code.code, "category_weights", &code.category_weights, &categories)?;
            check_conditional(&code.code, "geography_weights", &code.geography_weights, &geographies)?;
            check_conditional(&code.code, "method_weights", &code.method_weights, &methods)?;
        }
        Ok(())
    }

    fn validate_seasonality(&self) -> GenResult<()> {
        const TABLE: &str = "seasonality";
        for (&hour, &w) in &self.seasonality.hour_weights {
            let key = format!("hour_weights.{hour}");
            if hour > 23 {
                return Err(GenError::calibration(TABLE, key, "hour must be in 0..=23"));
            }
            check_non_negative(TABLE, &key, "weight", w)?;
        }
        let hour_total: f64 = (0..24).map(|h| self.hour_weight(h)).sum();
        if hour_total <= 0.0 {
            return Err(GenError::calibration(TABLE, "hour_weights", "weights sum to zero"));
        }

        for (profile, days) in &self.seasonality.day_profiles {
            for (&day, &w) in days {
                let key = format!("day_profiles.{profile}.{day}");
                if day > 6 {
                    return Err(GenError::calibration(TABLE, key, "day of week must be in 0..=6"));
                }
                check_non_negative(TABLE, &key, "weight", w)?;
            }
            let total: f64 = (0..7).map(|d| days.get(&d).copied().unwrap_or(1.0)).sum();
            if total <= 0.0 {
                return Err(GenError::calibration(
                    TABLE,
                    format!("day_profiles.{profile}"),
                    "weights sum to zero",
                ));
            }
        }
        Ok(())
    }

    fn validate_scalars(&self) -> GenResult<()> {
        if self.time_window.months == 0 {
            return Err(GenError::calibration("time_window", "months", "window must span at least one month"));
        }

        let pop = &self.population;
        if pop.merchant_count == 0 {
            return Err(GenError::calibration("population", "merchant_count", "pool must not be empty"));
        }
        check_positive("population", "pareto_alpha", "value", pop.pareto_alpha)?;
        if !(pop.weight_cap.is_finite() && pop.weight_cap >= 1.0) {
            return Err(GenError::calibration("population", "weight_cap", "must be finite and >= 1"));
        }

        let s = &self.scoring;
        for (key, v) in [
            ("intercept", s.intercept),
            ("category_weight", s.category_weight),
            ("context_weight", s.context_weight),
            ("amount_weight", s.amount_weight),
        ] {
            check_finite("scoring", key, "value", v)?;
        }
        check_positive("scoring", "amount_pivot_usd", "value", s.amount_pivot_usd)?;
        check_non_negative("scoring", "noise_sigma", "value", s.noise_sigma)?;

        let b = &self.boundary;
        check_finite("boundary", "threshold", "value", b.threshold)?;
        check_positive("boundary", "width", "value", b.width)?;
        if !(0.0 <= b.floor && b.floor <= b.ceiling && b.ceiling <= 1.0) {
            return Err(GenError::calibration(
                "boundary",
                "floor/ceiling",
                format!("need 0 <= floor ({}) <= ceiling ({}) <= 1", b.floor, b.ceiling),
            ));
        }

        let a = &self.amounts;
        check_positive("amounts", "floor_usd", "value", a.floor_usd)?;
        if !(a.ceiling_usd.is_finite() && a.ceiling_usd > a.floor_usd) {
            return Err(GenError::calibration("amounts", "ceiling_usd", "must be finite and above floor_usd"));
        }
        Ok(())
    }

    /// Hour-of-day weight, neutral when not calibrated.
    pub fn hour_weight(&self, hour: u32) -> f64 {
        self.seasonality.hour_weights.get(&hour).copied().unwrap_or(1.0)
    }

    /// Day-of-week weight (0 = Monday) for a category, neutral when the
    /// category has no profile or the profile omits the day.
    pub fn day_weight(&self, category: &CategoryConfig, day: u32) -> f64 {
        category
            .day_profile
            .as_ref()
            .and_then(|p| self.seasonality.day_profiles.get(p))
            .and_then(|days| days.get(&day))
            .copied()
            .unwrap_or(1.0)
    }
}

impl FailureCodeConfig {
    /// Relative weight of this code for one (category, geography, method)
    /// combination. Missing conditional keys are neutral.
    pub fn weight_for(&self, category: &str, geography: &str, method: &str) -> f64 {
        self.base_weight
            * self.category_weights.get(category).copied().unwrap_or(1.0)
            * self.geography_weights.get(geography).copied().unwrap_or(1.0)
            * self.method_weights.get(method).copied().unwrap_or(1.0)
    }
}

fn check_enumeration<'a>(
    table: &'static str,
    members: impl Iterator<Item = (&'a str, f64)>,
) -> GenResult<()> {
    let mut seen = HashSet::new();
    let mut total = 0.0;
    for (name, popularity) in members {
        if name.trim().is_empty() {
            return Err(GenError::calibration(table, "*", "member name is empty"));
        }
        if !seen.insert(name) {
            return Err(GenError::calibration(table, name, "duplicate member"));
        }
        check_non_negative(table, name, "popularity", popularity)?;
        total += popularity;
    }
    if seen.is_empty() {
        return Err(GenError::calibration(table, "*", "enumeration is empty"));
    }
    if total <= 0.0 {
        return Err(GenError::calibration(table, "popularity", "weights sum to zero"));
    }
    Ok(())
}

fn check_conditional(
    code: &str,
    field: &str,
    weights: &BTreeMap<String, f64>,
    members: &HashSet<&str>,
) -> GenResult<()> {
    for (key, &w) in weights {
        let location = format!("{code}.{field}.{key}");
        if !members.contains(key.as_str()) {
            return Err(GenError::calibration("failure_codes", location, "names no enumeration member"));
        }
        check_non_negative("failure_codes", &location, "weight", w)?;
    }
    Ok(())
}

fn check_finite(table: &'static str, key: &str, field: &str, value: f64) -> GenResult<()> {
    if !value.is_finite() {
        return Err(GenError::calibration(table, key, format!("{field} is not finite")));
    }
    Ok(())
}

fn check_non_negative(table: &'static str, key: &str, field: &str, value: f64) -> GenResult<()> {
    check_finite(table, key, field, value)?;
    if value < 0.0 {
        return Err(GenError::calibration(table, key, format!("{field} {value} is negative")));
    }
    Ok(())
}

fn check_positive(table: &'static str, key: &str, field: &str, value: f64) -> GenResult<()> {
    check_finite(table, key, field, value)?;
    if value <= 0.0 {
        return Err(GenError::calibration(table, key, format!("{field} {value} must be positive")));
    }
    Ok(())
}
