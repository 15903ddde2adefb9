//! Synthetic payment-failure dataset generator.
//!
//! Produces transaction tables with known, tunable structure: category,
//! geography and method failure multipliers, a calibrated pre-authorization
//! risk score, a failure-code taxonomy with retry recovery, and temporal
//! seasonality. Same seed + same calibration + same count = same table.

pub mod attribute_sampler;
pub mod config;
pub mod engine;
pub mod error;
pub mod merchant_population;
pub mod outcome;
pub mod record;
pub mod risk_scorer;
pub mod rng;
pub mod store;
pub mod summary;
pub mod tables;
pub mod temporal;
pub mod types;

pub use config::{Calibration, GenerationConfig};
pub use engine::{Generator, RunStatus};
pub use error::{GenError, GenResult};
pub use record::TransactionRecord;
