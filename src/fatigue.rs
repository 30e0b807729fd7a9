//! Dual-compartment fatigue model
//!
//! Two bounded accumulators track training fatigue:
//!
//! - **Metabolic**: fast compartment (2-day half-life) for short-term energetic fatigue.
//! - **Structural**: slow compartment (10-day half-life) for cumulative mechanical and
//!   connective-tissue load, scaled by an impact constant.
//!
//! Both decay toward zero at a rate modulated by the recovery efficiency φ ∈ [0.5, 1.5]
//! and saturate toward their capacity under load:
//!
//! ```text
//! M_d  = M · exp(-φ · ln2 / T_m)
//! M'   = capM - (capM - M_d) · exp(-cost / capM)
//! S_d  = S · exp(-φ_s · ln2 / T_s),   φ_s = 1 + (φ - 1) · 0.5
//! S'   = capS - (capS - S_d) · exp(-σ · cost / capS)
//! ```
//!
//! Fatigue is `100 × (0.6·M/capM + 0.4·S/capS)` and readiness is its inversion, adjusted
//! by questionnaire corrections, a decaying wellness carryover and a detraining penalty.

use crate::error::{LoadCycleError, Result};
use crate::load::LoadAggregator;
use crate::models::{fields, QuestionnaireResponse, Session};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::LN_2;
use tracing::{debug, warn};

/// Recovery efficiency without any subjective information
pub const DEFAULT_PHI_RECOVERY: f64 = 1.0;
pub const MIN_PHI_RECOVERY: f64 = 0.5;
pub const MAX_PHI_RECOVERY: f64 = 1.5;
pub const DEFAULT_CAP_METABOLIC: f64 = 100.0;
pub const DEFAULT_CAP_STRUCTURAL: f64 = 100.0;
/// Impact scaling of daily cost into the structural compartment
pub const SIGMA_IMPACT: f64 = 0.35;

/// Fatigue model coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueModelConfig {
    pub metabolic_capacity: f64,
    pub structural_capacity: f64,

    /// Days for the metabolic compartment to halve at φ = 1
    pub metabolic_half_life_days: f64,

    /// Days for the structural compartment to halve at φ = 1
    pub structural_half_life_days: f64,

    pub sigma_impact: f64,

    /// Fraction of φ's deviation from 1 applied to structural recovery
    pub structural_phi_damping: f64,

    /// Weight of the metabolic ratio in the fatigue/readiness scores
    pub metabolic_weight: f64,

    /// Trust placed in a questionnaire answer vs. the model estimate (0-1)
    pub correction_weight: f64,

    /// Half-life of the questionnaire carryover in days
    pub wellness_half_life_days: f64,

    /// Minimum gap without penalty
    pub detraining_grace_days: f64,

    /// Readiness points lost per day beyond the grace period
    pub detraining_per_day: f64,

    pub detraining_max_penalty: f64,

    /// Number of recent session days considered
    pub detraining_history: usize,
}

impl Default for FatigueModelConfig {
    fn default() -> Self {
        Self {
            metabolic_capacity: DEFAULT_CAP_METABOLIC,
            structural_capacity: DEFAULT_CAP_STRUCTURAL,
            metabolic_half_life_days: 2.0,
            structural_half_life_days: 10.0,
            sigma_impact: SIGMA_IMPACT,
            structural_phi_damping: 0.5,
            metabolic_weight: 0.6,
            correction_weight: 0.35,
            wellness_half_life_days: 3.0,
            detraining_grace_days: 3.0,
            detraining_per_day: 1.5,
            detraining_max_penalty: 25.0,
            detraining_history: 5,
        }
    }
}

impl FatigueModelConfig {
    /// Replace invalid values by their defaults, returning a description of each fallback
    pub fn sanitized(&self) -> (Self, Vec<String>) {
        let defaults = Self::default();
        let mut config = self.clone();
        let mut fallbacks = Vec::new();

        let mut positive = |name: &str, value: &mut f64, default: f64| {
            if !(value.is_finite() && *value > 0.0) {
                fallbacks.push(format!("{}={} replaced by {}", name, value, default));
                *value = default;
            }
        };
        positive("metabolic_capacity", &mut config.metabolic_capacity, defaults.metabolic_capacity);
        positive("structural_capacity", &mut config.structural_capacity, defaults.structural_capacity);
        positive(
            "metabolic_half_life_days",
            &mut config.metabolic_half_life_days,
            defaults.metabolic_half_life_days,
        );
        positive(
            "structural_half_life_days",
            &mut config.structural_half_life_days,
            defaults.structural_half_life_days,
        );
        positive("sigma_impact", &mut config.sigma_impact, defaults.sigma_impact);
        positive(
            "wellness_half_life_days",
            &mut config.wellness_half_life_days,
            defaults.wellness_half_life_days,
        );

        let mut unit = |name: &str, value: &mut f64, default: f64| {
            if !(value.is_finite() && (0.0..=1.0).contains(value)) {
                fallbacks.push(format!("{}={} replaced by {}", name, value, default));
                *value = default;
            }
        };
        unit("metabolic_weight", &mut config.metabolic_weight, defaults.metabolic_weight);
        unit("correction_weight", &mut config.correction_weight, defaults.correction_weight);
        unit(
            "structural_phi_damping",
            &mut config.structural_phi_damping,
            defaults.structural_phi_damping,
        );

        if !(config.detraining_grace_days.is_finite() && config.detraining_grace_days >= 0.0) {
            fallbacks.push("detraining_grace_days replaced by default".to_string());
            config.detraining_grace_days = defaults.detraining_grace_days;
        }
        if !(config.detraining_per_day.is_finite() && config.detraining_per_day >= 0.0) {
            fallbacks.push("detraining_per_day replaced by default".to_string());
            config.detraining_per_day = defaults.detraining_per_day;
        }
        if !(config.detraining_max_penalty.is_finite() && config.detraining_max_penalty >= 0.0) {
            fallbacks.push("detraining_max_penalty replaced by default".to_string());
            config.detraining_max_penalty = defaults.detraining_max_penalty;
        }
        if config.detraining_history == 0 {
            fallbacks.push("detraining_history replaced by default".to_string());
            config.detraining_history = defaults.detraining_history;
        }

        (config, fallbacks)
    }
}

/// State of the two compartments for one timeline
///
/// Invariant: `0 ≤ metabolic ≤ metabolic_capacity` and `0 ≤ structural ≤ structural_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueState {
    pub metabolic: f64,
    pub structural: f64,
    pub metabolic_capacity: f64,
    pub structural_capacity: f64,

    /// Day index of the last update, `None` before day 0
    pub last_updated: Option<u32>,
}

impl FatigueState {
    pub fn new(metabolic_capacity: f64, structural_capacity: f64) -> Self {
        Self {
            metabolic: 0.0,
            structural: 0.0,
            metabolic_capacity,
            structural_capacity,
            last_updated: None,
        }
    }

    pub fn metabolic_ratio(&self) -> f64 {
        self.metabolic / self.metabolic_capacity
    }

    pub fn structural_ratio(&self) -> f64 {
        self.structural / self.structural_capacity
    }
}

/// Recent session day indices, oldest first
#[derive(Debug, Clone, Default)]
pub struct SessionRecency {
    days: VecDeque<u32>,
    limit: usize,
}

impl SessionRecency {
    pub fn new(limit: usize) -> Self {
        Self {
            days: VecDeque::with_capacity(limit.max(1)),
            limit: limit.max(1),
        }
    }

    pub fn record(&mut self, day: u32) {
        if self.days.back() == Some(&day) {
            return;
        }
        if self.days.len() == self.limit {
            self.days.pop_front();
        }
        self.days.push_back(day);
    }

    pub fn last(&self) -> Option<u32> {
        self.days.back().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Mean spacing between the recorded sessions
    pub fn mean_interval(&self) -> Option<f64> {
        let first = *self.days.front()?;
        let last = *self.days.back()?;
        if self.days.len() < 2 {
            return None;
        }
        Some((last - first) as f64 / (self.days.len() - 1) as f64)
    }
}

/// Decaying residue of a questionnaire adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WellnessCarryover {
    pub fatigue_delta: f64,
    pub readiness_delta: f64,
    pub origin_day: u32,
}

impl WellnessCarryover {
    /// Deltas still in effect on `day`
    pub fn at(&self, day: u32, half_life_days: f64) -> (f64, f64) {
        let elapsed = day.saturating_sub(self.origin_day) as f64;
        let factor = 0.5_f64.powf(elapsed / half_life_days);
        (self.fatigue_delta * factor, self.readiness_delta * factor)
    }
}

/// The recurrence and its scoring
#[derive(Debug, Clone)]
pub struct FatigueModel {
    config: FatigueModelConfig,
}

impl FatigueModel {
    pub fn new() -> Self {
        Self {
            config: FatigueModelConfig::default(),
        }
    }

    /// Create a model, replacing invalid coefficients with documented defaults
    pub fn with_config(config: FatigueModelConfig) -> Self {
        let (config, fallbacks) = config.sanitized();
        for fallback in &fallbacks {
            warn!(fallback = %fallback, "Invalid fatigue model configuration");
        }
        Self { config }
    }

    pub fn config(&self) -> &FatigueModelConfig {
        &self.config
    }

    /// Fresh day-zero state
    pub fn initial_state(&self) -> FatigueState {
        FatigueState::new(self.config.metabolic_capacity, self.config.structural_capacity)
    }

    /// Clamp a recovery efficiency into [0.5, 1.5]
    pub fn clamp_phi(phi: f64) -> f64 {
        if phi.is_finite() {
            phi.clamp(MIN_PHI_RECOVERY, MAX_PHI_RECOVERY)
        } else {
            DEFAULT_PHI_RECOVERY
        }
    }

    /// Recovery efficiency from sleep, nutrition and stress answers
    pub fn phi_from_questionnaire(questionnaire: Option<&QuestionnaireResponse>) -> f64 {
        let Some(q) = questionnaire else {
            return DEFAULT_PHI_RECOVERY;
        };
        let normalized = |v: f64| (v - 1.0) / 4.0;
        let sleep = normalized(q.get_or_neutral(fields::SLEEP));
        let nutrition = normalized(q.get_or_neutral(fields::NUTRITION));
        let calm = normalized(6.0 - q.get_or_neutral(fields::STRESS));

        Self::clamp_phi(MIN_PHI_RECOVERY + (sleep + nutrition + calm) / 3.0)
    }

    /// Next metabolic level after one day
    pub fn update_metabolic(&self, current: f64, capacity: f64, cost: f64, phi: f64) -> f64 {
        let phi = Self::clamp_phi(phi);
        let cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        let decayed = current * (-phi * LN_2 / self.config.metabolic_half_life_days).exp();
        let next = capacity - (capacity - decayed) * (-cost / capacity).exp();
        next.clamp(0.0, capacity)
    }

    /// Next structural level after one day
    pub fn update_structural(&self, current: f64, capacity: f64, cost: f64, phi: f64) -> f64 {
        let phi = Self::clamp_phi(phi);
        let cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        let phi_s = 1.0 + (phi - 1.0) * self.config.structural_phi_damping;
        let decayed = current * (-phi_s * LN_2 / self.config.structural_half_life_days).exp();
        let next = capacity - (capacity - decayed) * (-self.config.sigma_impact * cost / capacity).exp();
        next.clamp(0.0, capacity)
    }

    /// Advance the state by exactly one day
    pub fn step(&self, state: &FatigueState, cost: f64, phi: f64) -> FatigueState {
        FatigueState {
            metabolic: self.update_metabolic(state.metabolic, state.metabolic_capacity, cost, phi),
            structural: self.update_structural(state.structural, state.structural_capacity, cost, phi),
            metabolic_capacity: state.metabolic_capacity,
            structural_capacity: state.structural_capacity,
            last_updated: Some(state.last_updated.map_or(0, |d| d + 1)),
        }
    }

    /// Weighted depletion ratio in [0, 1]
    fn depletion(&self, state: &FatigueState) -> f64 {
        let w = self.config.metabolic_weight;
        (w * state.metabolic_ratio() + (1.0 - w) * state.structural_ratio()).clamp(0.0, 1.0)
    }

    /// Fatigue score (0-100)
    pub fn fatigue_score(&self, state: &FatigueState) -> f64 {
        100.0 * self.depletion(state)
    }

    /// Readiness score (0-100) before carryover and detraining
    pub fn readiness_score(&self, state: &FatigueState) -> f64 {
        100.0 * (1.0 - self.depletion(state))
    }

    /// Blend the model's structural estimate toward the level implied by reported soreness
    ///
    /// Soreness of 1 implies 80% depletion, 2 implies 60%. Higher answers carry no
    /// information about hidden depletion and leave the state untouched.
    pub fn apply_structural_correction(&self, state: &mut FatigueState, soreness: f64) {
        if let Some(observed) = Self::implied_depletion(soreness) {
            state.structural = self.posterior(
                state.structural,
                observed * state.structural_capacity,
                state.structural_capacity,
            );
        }
    }

    /// Blend the model's metabolic estimate toward the level implied by reported energy
    pub fn apply_metabolic_correction(&self, state: &mut FatigueState, energy: f64) {
        if let Some(observed) = Self::implied_depletion(energy) {
            state.metabolic = self.posterior(
                state.metabolic,
                observed * state.metabolic_capacity,
                state.metabolic_capacity,
            );
        }
    }

    fn implied_depletion(answer: f64) -> Option<f64> {
        if !answer.is_finite() || answer > 2.0 {
            return None;
        }
        // 1 → 0.8, 2 → 0.6
        Some((1.0 - 0.2 * answer.max(1.0)).clamp(0.0, 1.0))
    }

    fn posterior(&self, prior: f64, observed: f64, capacity: f64) -> f64 {
        if observed <= prior {
            return prior;
        }
        (prior + self.config.correction_weight * (observed - prior)).clamp(0.0, capacity)
    }

    /// Readiness penalty for time since the last session
    pub fn detraining_penalty(&self, day: u32, recency: &SessionRecency) -> f64 {
        let Some(last) = recency.last() else {
            return 0.0;
        };
        let gap = day.saturating_sub(last) as f64;
        let grace = recency
            .mean_interval()
            .map(|interval| (1.5 * interval).max(self.config.detraining_grace_days))
            .unwrap_or(self.config.detraining_grace_days);

        if gap <= grace {
            return 0.0;
        }
        (self.config.detraining_per_day * (gap - grace)).min(self.config.detraining_max_penalty)
    }
}

impl Default for FatigueModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-day output of a fatigue timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,

    /// Days since the start of the recurrence
    pub day_index: u32,

    pub daily_cost: f64,

    /// Recovery efficiency applied on this day
    pub phi: f64,

    pub metabolic: f64,
    pub structural: f64,

    /// Model fatigue without subjective adjustments
    pub raw_fatigue: f64,

    /// Model readiness without subjective adjustments or detraining
    pub raw_readiness: f64,

    pub detraining_penalty: f64,
    pub has_questionnaire: bool,

    /// Displayed fatigue (0-100), `None` before data exists or after the as-of date
    pub fatigue: Option<f64>,

    /// Displayed readiness (0-100), `None` before data exists or after the as-of date
    pub readiness: Option<f64>,
}

/// Sequential fatigue timeline over a session history
#[derive(Debug, Clone, Default)]
pub struct FatigueTimeline {
    model: FatigueModel,
    aggregator: LoadAggregator,
}

impl FatigueTimeline {
    pub fn new(model: FatigueModel, aggregator: LoadAggregator) -> Self {
        Self { model, aggregator }
    }

    pub fn model(&self) -> &FatigueModel {
        &self.model
    }

    /// Calculate daily metrics for `start..=end`
    pub fn calculate(
        &self,
        sessions: &[Session],
        questionnaires: &[QuestionnaireResponse],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyMetrics>> {
        self.calculate_as_of(sessions, questionnaires, start, end, None)
    }

    /// Calculate daily metrics, hiding scores after `as_of`
    ///
    /// The recurrence starts at the earlier of `start` and the first session so that
    /// history before the requested window still contributes to the state.
    pub fn calculate_as_of(
        &self,
        sessions: &[Session],
        questionnaires: &[QuestionnaireResponse],
        start: NaiveDate,
        end: NaiveDate,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<DailyMetrics>> {
        if start > end {
            return Err(LoadCycleError::Validation(
                "Start date must be before end date".to_string(),
            ));
        }

        let daily_costs = self.aggregator.aggregate_daily_costs(sessions);
        let first_session = daily_costs.keys().next().copied();
        let questionnaire_by_date: BTreeMap<NaiveDate, &QuestionnaireResponse> =
            questionnaires.iter().map(|q| (q.date, q)).collect();
        if questionnaire_by_date.len() < questionnaires.len() {
            debug!("Multiple questionnaires on one date, keeping the last of each");
        }

        let origin = first_session.map_or(start, |first| first.min(start));
        let half_life = self.model.config.wellness_half_life_days;

        let mut state = self.model.initial_state();
        let mut recency = SessionRecency::new(self.model.config.detraining_history);
        let mut carryover: Option<WellnessCarryover> = None;
        let mut series = Vec::new();

        let mut date = origin;
        let mut day: u32 = 0;
        while date <= end {
            let questionnaire = questionnaire_by_date.get(&date).copied();
            let phi = FatigueModel::phi_from_questionnaire(questionnaire);
            let cost = daily_costs.get(&date).map_or(0.0, |d| d.cost);
            if daily_costs.contains_key(&date) {
                recency.record(day);
            }

            state = self.model.step(&state, cost, phi);
            let raw_fatigue = self.model.fatigue_score(&state);
            let raw_readiness = self.model.readiness_score(&state);

            let (mut fatigue, mut readiness) = (raw_fatigue, raw_readiness);
            if let Some(q) = questionnaire {
                let mut adjusted = state;
                self.model
                    .apply_structural_correction(&mut adjusted, q.get_or_neutral(fields::SORENESS));
                self.model
                    .apply_metabolic_correction(&mut adjusted, q.get_or_neutral(fields::ENERGY));
                fatigue = self.model.fatigue_score(&adjusted);
                readiness = self.model.readiness_score(&adjusted);
                carryover = Some(WellnessCarryover {
                    fatigue_delta: fatigue - raw_fatigue,
                    readiness_delta: readiness - raw_readiness,
                    origin_day: day,
                });
            } else if let Some(residue) = carryover {
                let (df, dr) = residue.at(day, half_life);
                if df.abs() < 0.5 && dr.abs() < 0.5 {
                    carryover = None;
                } else {
                    fatigue += df;
                    readiness += dr;
                }
            }

            let detraining_penalty = self.model.detraining_penalty(day, &recency);
            readiness -= detraining_penalty;

            if date >= start {
                let visible = first_session.is_some_and(|first| date >= first)
                    && as_of.map_or(true, |limit| date <= limit);

                series.push(DailyMetrics {
                    date,
                    day_index: day,
                    daily_cost: cost,
                    phi,
                    metabolic: state.metabolic,
                    structural: state.structural,
                    raw_fatigue,
                    raw_readiness,
                    detraining_penalty,
                    has_questionnaire: questionnaire.is_some(),
                    fatigue: visible.then(|| fatigue.clamp(0.0, 100.0)),
                    readiness: visible.then(|| readiness.clamp(0.0, 100.0)),
                });
            }

            let Some(next) = date.succ_opt() else {
                break;
            };
            date = next;
            day += 1;
        }

        Ok(series)
    }
}

/// Visible fatigue and readiness values of a timeline, in date order
pub fn score_series(metrics: &[DailyMetrics]) -> (Vec<f64>, Vec<f64>) {
    metrics
        .iter()
        .filter_map(|m| Some((m.fatigue?, m.readiness?)))
        .unzip()
}

/// Session power aligned with [`score_series`]
///
/// Rest days carry the most recent session power forward; several sessions on one day
/// contribute their highest power.
pub fn power_series(metrics: &[DailyMetrics], sessions: &[Session]) -> Vec<f64> {
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for session in sessions.iter().filter(|s| s.power.is_finite() && s.power > 0.0) {
        let entry = daily.entry(session.date).or_insert(0.0);
        *entry = entry.max(session.power);
    }

    metrics
        .iter()
        .filter(|m| m.fatigue.is_some() && m.readiness.is_some())
        .map(|m| {
            daily
                .range(..=m.date)
                .next_back()
                .map(|(_, &power)| power)
                .unwrap_or(0.0)
        })
        .collect()
}
