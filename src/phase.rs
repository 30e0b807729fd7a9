//! Probabilistic cycle-phase detection over a fatigue/readiness history
//!
//! Each call is a pure function of the full history plus the previously detected phase:
//!
//! 1. Nine z-scored features are extracted from the most recent 8 points.
//! 2. Every phase is scored as a weighted sum of features and the scores are
//!    softmax-normalized into observation likelihoods.
//! 3. The prior is the transition-matrix row of the previous phase (uniform without one),
//!    nudged by program progress.
//! 4. The posterior picks the phase; confidence is scaled by how much data is available.
//! 5. A stability guard holds the previous phase when a switch is only weakly supported.

use crate::models::CyclePhase;
use crate::signal::linear_fit;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub const FEATURE_COUNT: usize = 9;

/// Detector constants, injected rather than global so they can be tuned and tested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDetectorConfig {
    /// Row = previous phase, column = next phase (ascending, peak, descending, trough)
    pub transition_matrix: [[f64; 4]; 4],

    /// Row = phase, column = feature (see [`PhaseFeatures::as_array`])
    pub feature_weights: [[f64; FEATURE_COUNT]; 4],

    /// Points required before any phase is reported
    pub min_points: usize,

    /// Points used for windowed features and full confidence
    pub window: usize,

    /// Confidence below which a switch away from the previous phase is questioned
    pub switch_confidence: f64,

    /// Confidence below which a first detection is flagged as low confidence
    pub initial_confidence: f64,

    /// Posterior ratio (candidate / previous) required to switch on low confidence
    pub switch_ratio: f64,

    /// Multiplier applied to the confidence of a held phase
    pub hold_damping: f64,

    /// Progress fraction below which ascending is favoured
    pub early_progress: f64,

    /// Progress fraction above which peak and descending are favoured
    pub late_progress: f64,

    pub early_bias: f64,
    pub late_bias: f64,
}

impl Default for PhaseDetectorConfig {
    fn default() -> Self {
        Self {
            transition_matrix: [
                [0.55, 0.30, 0.10, 0.05],
                [0.10, 0.20, 0.65, 0.05],
                [0.05, 0.05, 0.55, 0.35],
                [0.60, 0.05, 0.05, 0.30],
            ],
            // level, readiness, velocity, acceleration, slope, power, consistency, variance, progress
            feature_weights: [
                [0.2, -0.1, 1.0, 0.3, 0.8, 0.4, 0.5, 0.1, -0.3],
                [1.0, -0.6, 0.2, -0.8, 0.3, 0.1, -0.2, 0.2, 0.4],
                [0.3, 0.2, -1.0, -0.3, -0.8, -0.4, -0.5, 0.1, 0.3],
                [-1.0, 0.8, -0.2, 0.8, -0.3, -0.1, -0.2, -0.1, -0.1],
            ],
            min_points: 5,
            window: 8,
            switch_confidence: 0.35,
            initial_confidence: 0.25,
            switch_ratio: 1.5,
            hold_damping: 0.9,
            early_progress: 0.25,
            late_progress: 0.75,
            early_bias: 0.3,
            late_bias: 0.2,
        }
    }
}

/// Z-scored features of the most recent window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseFeatures {
    pub fatigue_level: f64,
    pub readiness_level: f64,
    pub fatigue_velocity: f64,
    pub fatigue_acceleration: f64,
    pub ctl_slope: f64,
    pub power_trend: f64,

    /// R² of a linear fit, signed by the fitted slope
    pub trend_consistency: f64,

    /// Log of recent over historical variance; negative values indicate adaptation
    pub variance_ratio: f64,

    /// Program progress mapped to [-1, 1]
    pub progress: f64,
}

impl PhaseFeatures {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.fatigue_level,
            self.readiness_level,
            self.fatigue_velocity,
            self.fatigue_acceleration,
            self.ctl_slope,
            self.power_trend,
            self.trend_consistency,
            self.variance_ratio,
            self.progress,
        ]
    }
}

/// History handed to the detector
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseInput<'a> {
    pub fatigue: &'a [f64],
    pub readiness: &'a [f64],

    /// Per-step session power; may be empty
    pub power: &'a [f64],

    /// Fraction of the program completed (0-1), when known
    pub progress: Option<f64>,
}

/// Result of one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDetection {
    /// `None` when the history is too short
    pub phase: Option<CyclePhase>,
    pub confidence: f64,
    pub posterior: [f64; 4],
    pub features: Option<PhaseFeatures>,

    /// The stability guard kept the previous phase
    pub held_previous: bool,

    /// First detection below the initial confidence threshold
    pub low_confidence: bool,

    pub data_points: usize,
}

impl PhaseDetection {
    pub fn undetermined(data_points: usize) -> Self {
        Self {
            phase: None,
            confidence: 0.0,
            posterior: [0.0; 4],
            features: None,
            held_previous: false,
            low_confidence: false,
            data_points,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.phase.is_some()
    }
}

/// Bayesian phase detector
#[derive(Debug, Clone, Default)]
pub struct PhaseDetector {
    config: PhaseDetectorConfig,
}

impl PhaseDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PhaseDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseDetectorConfig {
        &self.config
    }

    /// Detect the current phase given the previously detected one
    pub fn detect(&self, input: &PhaseInput<'_>, previous: Option<CyclePhase>) -> PhaseDetection {
        let n = input.fatigue.len();
        if n < self.config.min_points.max(2) {
            return PhaseDetection::undetermined(n);
        }

        let features = self.extract_features(input);
        let likelihood = self.likelihood(&features);
        let mut detection = self.resolve(likelihood, previous, input.progress, n);
        detection.features = Some(features);
        detection
    }

    /// Detect a phase for every step of a history, threading the previous phase along
    pub fn detect_series(
        &self,
        fatigue: &[f64],
        readiness: &[f64],
        power: &[f64],
        total_steps: Option<usize>,
    ) -> Vec<PhaseDetection> {
        let mut previous = None;
        (1..=fatigue.len())
            .map(|end| {
                let input = PhaseInput {
                    fatigue: &fatigue[..end],
                    readiness: &readiness[..end.min(readiness.len())],
                    power: &power[..end.min(power.len())],
                    progress: total_steps
                        .filter(|&total| total > 0)
                        .map(|total| (end as f64 / total as f64).min(1.0)),
                };
                let detection = self.detect(&input, previous);
                if detection.phase.is_some() {
                    previous = detection.phase;
                }
                detection
            })
            .collect()
    }

    /// Softmax of the per-phase weighted feature scores
    pub fn likelihood(&self, features: &PhaseFeatures) -> [f64; 4] {
        let values = features.as_array();
        let mut scores = [0.0; 4];
        for (phase, weights) in self.config.feature_weights.iter().enumerate() {
            scores[phase] = weights.iter().zip(values.iter()).map(|(w, f)| w * f).sum();
        }
        softmax(scores)
    }

    /// Transition prior for the next step, nudged by program progress
    pub fn prior(&self, previous: Option<CyclePhase>, progress: Option<f64>) -> [f64; 4] {
        let mut prior = match previous {
            Some(phase) => self.config.transition_matrix[phase.index()],
            None => [0.25; 4],
        };

        if let Some(p) = progress.filter(|p| p.is_finite()) {
            if p < self.config.early_progress {
                prior[CyclePhase::Ascending.index()] *= 1.0 + self.config.early_bias;
            } else if p > self.config.late_progress {
                prior[CyclePhase::Peak.index()] *= 1.0 + self.config.late_bias;
                prior[CyclePhase::Descending.index()] *= 1.0 + self.config.late_bias;
            }
        }
        normalize(prior).unwrap_or([0.25; 4])
    }

    /// Combine a likelihood with the transition prior and apply the stability guard
    pub fn resolve(
        &self,
        likelihood: [f64; 4],
        previous: Option<CyclePhase>,
        progress: Option<f64>,
        data_points: usize,
    ) -> PhaseDetection {
        let prior = self.prior(previous, progress);
        let mut unnormalized = [0.0; 4];
        for i in 0..4 {
            unnormalized[i] = likelihood[i] * prior[i];
        }
        let posterior = normalize(unnormalized).unwrap_or(prior);

        let candidate_index = argmax(&posterior);
        let candidate = CyclePhase::ALL[candidate_index];
        let data_factor = (data_points as f64 / self.config.window.max(1) as f64).min(1.0);
        let confidence = posterior[candidate_index] * data_factor;

        let mut detection = PhaseDetection {
            phase: Some(candidate),
            confidence,
            posterior,
            features: None,
            held_previous: false,
            low_confidence: false,
            data_points,
        };

        match previous {
            Some(prev) if prev != candidate => {
                let prev_posterior = posterior[prev.index()];
                let ratio = if prev_posterior > 0.0 {
                    posterior[candidate_index] / prev_posterior
                } else {
                    f64::INFINITY
                };
                if confidence < self.config.switch_confidence && ratio < self.config.switch_ratio {
                    detection.phase = Some(prev);
                    detection.confidence = prev_posterior * data_factor * self.config.hold_damping;
                    detection.held_previous = true;
                }
            }
            Some(_) => {}
            None => {
                detection.low_confidence = confidence < self.config.initial_confidence;
            }
        }
        detection
    }

    /// Feature extraction; requires at least two fatigue points
    pub fn extract_features(&self, input: &PhaseInput<'_>) -> PhaseFeatures {
        let fatigue = input.fatigue;
        let n = fatigue.len();
        let window_len = self.config.window.max(2);
        let window = &fatigue[n.saturating_sub(window_len)..];
        let readiness_window = &input.readiness[input.readiness.len().saturating_sub(window_len)..];
        let scale = window.iter().population_std_dev().max(1.0);
        let last = window[window.len() - 1];

        let diffs: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let second_diffs: Vec<f64> = diffs.windows(2).map(|w| w[1] - w[0]).collect();

        let ewma = ewma(fatigue, 2.0 / (self.config.window as f64 + 1.0));
        let ctl_slope = if ewma.len() >= 3 {
            (ewma[ewma.len() - 1] - ewma[ewma.len() - 3]) / 2.0
        } else {
            ewma[ewma.len() - 1] - ewma[0]
        };

        let (slope, r_squared) = linear_fit(window);

        // Per-step rates are expressed as half-window change in window deviations
        let span = diffs.len() as f64 / 2.0;

        PhaseFeatures {
            fatigue_level: clamp_z(z_score(last, window)),
            readiness_level: readiness_window
                .last()
                .map(|&r| clamp_z(z_score(r, readiness_window)))
                .unwrap_or(0.0),
            fatigue_velocity: clamp_z(weighted_recent(&diffs) * span / scale),
            fatigue_acceleration: clamp_z(weighted_recent(&second_diffs) * span / scale),
            ctl_slope: clamp_z(ctl_slope * span / scale),
            power_trend: power_trend(input.power, self.config.window),
            trend_consistency: r_squared * slope.signum() * (slope.abs() > 1e-9) as u8 as f64,
            variance_ratio: variance_ratio(window),
            progress: input
                .progress
                .filter(|p| p.is_finite())
                .map(|p| 2.0 * p.clamp(0.0, 1.0) - 1.0)
                .unwrap_or(0.0),
        }
    }
}

fn clamp_z(z: f64) -> f64 {
    if z.is_finite() {
        z.clamp(-3.0, 3.0)
    } else {
        0.0
    }
}

/// Z-score of `value` against `history`, with a one-point floor on the deviation
fn z_score(value: f64, history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let mean = history.iter().mean();
    let std = history.iter().population_std_dev().max(1.0);
    (value - mean) / std
}

/// Linearly weighted mean favouring the most recent values
fn weighted_recent(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let (total, weights) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(t, w), (i, v)| {
            let weight = (i + 1) as f64;
            (t + v * weight, w + weight)
        });
    total / weights
}

fn ewma(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut current = values.first().copied().unwrap_or(0.0);
    values
        .iter()
        .map(|&v| {
            current += alpha * (v - current);
            current
        })
        .collect()
}

/// Fractional power change across the window, ten percent mapping to one unit
fn power_trend(power: &[f64], window: usize) -> f64 {
    let recent: Vec<f64> = power[power.len().saturating_sub(window)..]
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    if recent.len() < 2 {
        return 0.0;
    }
    let mean = recent.iter().mean();
    let (slope, _) = linear_fit(&recent);
    clamp_z(slope * (recent.len() - 1) as f64 / mean * 10.0)
}

fn variance_ratio(window: &[f64]) -> f64 {
    let historical = window.iter().population_variance();
    if !(historical > 1e-9) || window.len() < 4 {
        return 0.0;
    }
    let recent = window[window.len() - 4..].iter().population_variance();
    if recent <= 1e-9 {
        return -3.0;
    }
    clamp_z((recent / historical).ln())
}

fn softmax(scores: [f64; 4]) -> [f64; 4] {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut exp = [0.0; 4];
    for i in 0..4 {
        exp[i] = (scores[i] - max).exp();
    }
    normalize(exp).unwrap_or([0.25; 4])
}

fn normalize(values: [f64; 4]) -> Option<[f64; 4]> {
    let total: f64 = values.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let mut out = values;
    for v in out.iter_mut() {
        *v /= total;
    }
    Some(out)
}

fn argmax(values: &[f64; 4]) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}
