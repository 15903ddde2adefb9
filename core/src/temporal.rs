//! Temporal assignment: timestamp plus fields derived from it.
//!
//! Only the timestamp is sampled. Hour, weekday, month, year and the
//! weekend flag are always computed from it.

use crate::{
    error::{GenError, GenResult},
    rng::StreamRng,
    tables::DistributionTables,
    types::DimIndex,
};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike};
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemporalFields {
    pub timestamp: NaiveDateTime,
    pub hour_of_day: u32,
    /// 0 = Monday … 6 = Sunday.
    pub day_of_week: u32,
    pub month: u32,
    pub year: i32,
    pub is_weekend: bool,
}

impl TemporalFields {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            timestamp,
            hour_of_day: timestamp.hour(),
            day_of_week,
            month: timestamp.month(),
            year: timestamp.year(),
            is_weekend: day_of_week >= 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemporalAssigner {
    origin: NaiveDateTime,
    end: NaiveDateTime,
    /// Per category: day offset within the window.
    day_samplers: Vec<WeightedIndex<f64>>,
    hour_sampler: WeightedIndex<f64>,
}

impl TemporalAssigner {
    pub fn new(tables: &DistributionTables) -> GenResult<Self> {
        let window = &tables.calibration().time_window;
        let (origin, end) = window_bounds(window.start, window.months)?;
        let days = (end - origin).num_days();

        let weekdays: Vec<usize> = (0..days)
            .map(|d| (origin.date() + Duration::days(d)).weekday().num_days_from_monday() as usize)
            .collect();

        let day_samplers = (0..tables.category_count())
            .map(|cat| {
                let profile = tables.day_weights(cat);
                WeightedIndex::new(weekdays.iter().map(|&wd| profile[wd])).map_err(|e| {
                    GenError::calibration(
                        "seasonality",
                        format!("day_profiles for {}", tables.category_name(cat)),
                        e.to_string(),
                    )
                })
            })
            .collect::<GenResult<Vec<_>>>()?;

        let hour_sampler = WeightedIndex::new(tables.hour_weights().iter().copied())
            .map_err(|e| GenError::calibration("seasonality", "hour_weights", e.to_string()))?;

        Ok(Self {
            origin,
            end,
            day_samplers,
            hour_sampler,
        })
    }

    /// First instant of the window (inclusive).
    pub fn window_start(&self) -> NaiveDateTime {
        self.origin
    }

    /// End of the window (exclusive).
    pub fn window_end(&self) -> NaiveDateTime {
        self.end
    }

    /// Draw a day weighted by the category's weekday profile, an hour from
    /// the hour weights, and a uniform second within that hour.
    pub fn assign(&self, category: DimIndex, rng: &mut StreamRng) -> TemporalFields {
        let day = self.day_samplers[category].sample(rng) as i64;
        let hour = self.hour_sampler.sample(rng) as i64;
        let second = rng.next_u64_below(SECONDS_PER_HOUR) as i64;

        let offset = day * SECONDS_PER_DAY + hour * SECONDS_PER_HOUR as i64 + second;
        TemporalFields::from_timestamp(self.origin + Duration::seconds(offset))
    }
}

fn window_bounds(start: NaiveDate, months: u32) -> GenResult<(NaiveDateTime, NaiveDateTime)> {
    let end = start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| GenError::calibration("time_window", "months", "window end is out of range"))?;
    let midnight = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .ok_or_else(|| GenError::calibration("time_window", "start", "invalid date"))
    };
    Ok((midnight(start)?, midnight(end)?))
}
