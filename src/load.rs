//! Daily physiological cost from logged sessions
//!
//! Each session contributes
//! `effort^1.5 × duration^0.75 × clamp(power / baseline, 0.25, 4.0)^0.5 × 0.3`
//! where the baseline is the average power of the most recent prior sessions.
//! Multiple sessions on the same calendar date sum their contributions.

use crate::models::Session;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Built-in base power used when neither history nor configuration provide one
pub const DEFAULT_BASE_POWER: f64 = 200.0;

/// Load aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Fallback baseline power in watts (program base power)
    pub base_power: f64,

    /// Number of prior sessions averaged into the trailing baseline
    pub baseline_window: usize,

    /// Exponent applied to perceived effort
    pub effort_exponent: f64,

    /// Exponent applied to duration in minutes
    pub duration_exponent: f64,

    /// Exponent applied to the clamped power ratio
    pub power_ratio_exponent: f64,

    /// Overall scaling factor
    pub scale: f64,

    /// Lower clamp for the power ratio
    pub min_power_ratio: f64,

    /// Upper clamp for the power ratio
    pub max_power_ratio: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            base_power: DEFAULT_BASE_POWER,
            baseline_window: 5,
            effort_exponent: 1.5,
            duration_exponent: 0.75,
            power_ratio_exponent: 0.5,
            scale: 0.3,
            min_power_ratio: 0.25,
            max_power_ratio: 4.0,
        }
    }
}

/// Aggregated cost for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    pub date: NaiveDate,

    /// Summed physiological cost of all sessions on the date
    pub cost: f64,

    /// Number of sessions contributing
    pub session_count: usize,

    /// Baseline power the sessions were normalized against
    pub baseline_power: f64,
}

/// Where a critical power estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineSource {
    /// Averaged from prior sessions
    History,
    /// Configured program base power
    Fallback,
}

/// Baseline power used to normalize session load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalPowerEstimate {
    pub watts: f64,
    pub sample_count: usize,
    pub source: BaselineSource,
}

impl CriticalPowerEstimate {
    /// Estimate from the sessions strictly before `before`
    ///
    /// `sessions` must be sorted by date.
    pub fn from_history(sessions: &[Session], before: NaiveDate, config: &LoadConfig) -> Self {
        let prior_end = sessions.partition_point(|s| s.date < before);
        let powers: Vec<f64> = sessions[..prior_end]
            .iter()
            .rev()
            .map(|s| s.power)
            .filter(|p| p.is_finite() && *p > 0.0)
            .take(config.baseline_window.max(1))
            .collect();

        if powers.is_empty() {
            return Self::fallback(config);
        }

        let watts = powers.iter().sum::<f64>() / powers.len() as f64;
        Self {
            watts,
            sample_count: powers.len(),
            source: BaselineSource::History,
        }
    }

    /// Estimate that uses the configured base power
    pub fn fallback(config: &LoadConfig) -> Self {
        Self {
            watts: LoadAggregator::fallback_power(config),
            sample_count: 0,
            source: BaselineSource::Fallback,
        }
    }
}

/// Converts sessions into daily physiological cost
#[derive(Debug, Clone)]
pub struct LoadAggregator {
    config: LoadConfig,
}

impl LoadAggregator {
    pub fn new() -> Self {
        Self::with_config(LoadConfig::default())
    }

    pub fn with_config(config: LoadConfig) -> Self {
        LoadAggregator { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Usable fallback power: configured base power, or the built-in default
    pub fn fallback_power(config: &LoadConfig) -> f64 {
        if config.base_power.is_finite() && config.base_power > 0.0 {
            config.base_power
        } else {
            DEFAULT_BASE_POWER
        }
    }

    /// Contribution of a single session
    pub fn session_load(&self, effort: f64, duration: f64, power_ratio: f64) -> f64 {
        let c = &self.config;
        let effort = if effort.is_finite() { effort.clamp(0.0, 10.0) } else { 0.0 };
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let ratio = if power_ratio.is_finite() {
            power_ratio.clamp(c.min_power_ratio, c.max_power_ratio)
        } else {
            1.0
        };

        effort.powf(c.effort_exponent)
            * duration.powf(c.duration_exponent)
            * ratio.powf(c.power_ratio_exponent)
            * c.scale
    }

    /// Cost of all sessions on one date against a trailing power baseline
    ///
    /// A zero, negative or undefined baseline is replaced by the configured base power.
    pub fn cost(&self, _date: NaiveDate, sessions_on_date: &[Session], recent_avg_power: f64) -> f64 {
        let baseline = if recent_avg_power.is_finite() && recent_avg_power > 0.0 {
            recent_avg_power
        } else {
            Self::fallback_power(&self.config)
        };

        sessions_on_date
            .iter()
            .map(|s| {
                let power = if s.power.is_finite() { s.power.max(0.0) } else { 0.0 };
                self.session_load(s.perceived_effort, s.duration, power / baseline)
            })
            .sum::<f64>()
            .max(0.0)
    }

    /// Aggregate daily cost for every date that has sessions
    pub fn aggregate_daily_costs(&self, sessions: &[Session]) -> BTreeMap<NaiveDate, DailyCost> {
        let mut sorted = sessions.to_vec();
        sorted.sort_by_key(|s| s.date);

        let invalid = sorted
            .iter()
            .filter(|s| !(s.power.is_finite() && s.duration.is_finite()))
            .count();
        if invalid > 0 {
            warn!(invalid, "Sessions with non-finite power or duration contribute zero load");
        }

        let mut daily = BTreeMap::new();
        let mut start = 0;
        while start < sorted.len() {
            let date = sorted[start].date;
            let end = start + sorted[start..].partition_point(|s| s.date == date);
            let baseline = CriticalPowerEstimate::from_history(&sorted, date, &self.config);
            let cost = self.cost(date, &sorted[start..end], baseline.watts);

            daily.insert(
                date,
                DailyCost {
                    date,
                    cost,
                    session_count: end - start,
                    baseline_power: baseline.watts,
                },
            );
            start = end;
        }

        daily
    }
}

impl Default for LoadAggregator {
    fn default() -> Self {
        Self::new()
    }
}
