//! Monte Carlo simulation of program templates
//!
//! Every trial generates a randomized session history for the whole program (2-4
//! sessions per week on distinct days, with jitter on power, effort and duration),
//! runs it through the fatigue model from a fresh state and records the terminal
//! fatigue and readiness of every week. Trials are split into chunks that run on a
//! rayon pool; each chunk owns a deterministically seeded RNG.

use crate::error::SimulationError;
use crate::fatigue::{FatigueModel, SessionRecency, DEFAULT_PHI_RECOVERY};
use crate::load::LoadAggregator;
use crate::signal::PercentileBand;
use crate::template::WeekDefinition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type SimResult<T> = std::result::Result<T, SimulationError>;

/// Monte Carlo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of simulated trials
    pub iterations: usize,

    /// Program base power in watts
    pub base_power: f64,

    /// Trials per parallel chunk
    pub chunk_size: usize,

    /// Seed for reproducible runs; random when unset
    pub seed: Option<u64>,

    pub min_sessions_per_week: usize,
    pub max_sessions_per_week: usize,

    /// Relative power jitter (0.05 = ±5%)
    pub power_jitter: f64,

    /// Absolute effort jitter in RPE points
    pub rpe_jitter: f64,

    /// Relative duration jitter
    pub duration_jitter: f64,

    /// Worker threads; rayon's default when unset
    pub num_threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            base_power: 200.0,
            chunk_size: 5_000,
            seed: None,
            min_sessions_per_week: 2,
            max_sessions_per_week: 4,
            power_jitter: 0.05,
            rpe_jitter: 0.5,
            duration_jitter: 0.1,
            num_threads: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> SimResult<()> {
        let invalid = |parameter: &str, value: String| SimulationError::InvalidParameter {
            parameter: parameter.to_string(),
            value,
        };

        if self.iterations == 0 {
            return Err(invalid("iterations", self.iterations.to_string()));
        }
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", self.chunk_size.to_string()));
        }
        if !(self.base_power.is_finite() && self.base_power > 0.0) {
            return Err(invalid("base_power", self.base_power.to_string()));
        }
        if self.min_sessions_per_week == 0
            || self.min_sessions_per_week > self.max_sessions_per_week
            || self.max_sessions_per_week > 7
        {
            return Err(invalid(
                "sessions_per_week",
                format!("{}..={}", self.min_sessions_per_week, self.max_sessions_per_week),
            ));
        }
        for (name, value) in [
            ("power_jitter", self.power_jitter),
            ("rpe_jitter", self.rpe_jitter),
            ("duration_jitter", self.duration_jitter),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(name, value.to_string()));
            }
        }
        if self.power_jitter >= 1.0 || self.duration_jitter >= 1.0 {
            return Err(invalid(
                "jitter",
                format!("power {} duration {}", self.power_jitter, self.duration_jitter),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(invalid("num_threads", "0".to_string()));
        }
        Ok(())
    }

    fn chunk_count(&self) -> usize {
        self.iterations.div_ceil(self.chunk_size)
    }
}

/// Cooperative cancellation flag shared with a running simulation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One generated session, placed by day within its week
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedSession {
    pub day: usize,
    pub power: f64,
    pub duration: f64,
    pub effort: f64,
}

/// Randomized session generator; the RNG is injected for reproducibility
pub struct SessionGenerator<'a, R: Rng> {
    rng: R,
    config: &'a SimulationConfig,
}

impl<'a, R: Rng> SessionGenerator<'a, R> {
    pub fn new(rng: R, config: &'a SimulationConfig) -> Self {
        Self { rng, config }
    }

    fn jitter(&mut self, amount: f64) -> f64 {
        if amount > 0.0 {
            self.rng.gen_range(-amount..=amount)
        } else {
            0.0
        }
    }

    /// Sessions for one week, sorted by day
    pub fn week_sessions(&mut self, week: &WeekDefinition, out: &mut Vec<SimulatedSession>) {
        out.clear();
        let count = self
            .rng
            .gen_range(self.config.min_sessions_per_week..=self.config.max_sessions_per_week);
        let mut days = rand::seq::index::sample(&mut self.rng, 7, count).into_vec();
        days.sort_unstable();

        for day in days {
            let power_jitter = self.jitter(self.config.power_jitter);
            let rpe_jitter = self.jitter(self.config.rpe_jitter);
            let duration_jitter = self.jitter(self.config.duration_jitter);

            out.push(SimulatedSession {
                day,
                power: self.config.base_power * week.power_multiplier * (1.0 + power_jitter),
                duration: week.duration_minutes * (1.0 + duration_jitter),
                effort: (week.target_rpe + rpe_jitter).clamp(1.0, 10.0),
            });
        }
    }
}

/// Distribution of terminal values for one program week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDistribution {
    pub week_number: u32,
    pub fatigue: PercentileBand,
    pub readiness: PercentileBand,
    pub fatigue_mean: f64,
    pub readiness_mean: f64,
    pub fatigue_std: f64,
    pub readiness_std: f64,
}

/// Aggregated output of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub run_id: Uuid,
    pub iterations: usize,
    pub seed: u64,
    pub weeks: Vec<WeekDistribution>,

    /// Mean fatigue for every program day
    pub daily_fatigue_mean: Vec<f64>,

    /// Mean readiness for every program day
    pub daily_readiness_mean: Vec<f64>,

    /// Lowest and highest fatigue seen on every program day
    pub daily_fatigue_min: Vec<f64>,
    pub daily_fatigue_max: Vec<f64>,

    /// Lowest and highest readiness seen on every program day
    pub daily_readiness_min: Vec<f64>,
    pub daily_readiness_max: Vec<f64>,

    pub elapsed_ms: u128,
}

/// Daily-mean ranges of one program week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekRange {
    pub week_number: u32,
    pub fatigue_mean: f64,
    pub fatigue_min: f64,
    pub fatigue_max: f64,
    pub readiness_mean: f64,
    pub readiness_min: f64,
    pub readiness_max: f64,
}

/// Whole-program statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgramOverview {
    pub fatigue_mean: f64,
    pub readiness_mean: f64,
    pub peak_fatigue: f64,
    pub peak_fatigue_week: u32,
    pub lowest_readiness: f64,
    pub lowest_readiness_week: u32,
}

/// Day counts of the expected fatigue/readiness trajectory in risky territory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub days: usize,

    /// Mean fatigue above 60
    pub elevated_fatigue_days: usize,

    /// Mean fatigue above 80
    pub overreaching_days: usize,

    /// Mean readiness below 50
    pub low_readiness_days: usize,
}

pub const ELEVATED_FATIGUE: f64 = 60.0;
pub const OVERREACHING_FATIGUE: f64 = 80.0;
pub const LOW_READINESS: f64 = 50.0;

impl RiskSummary {
    pub fn from_daily(fatigue_mean: &[f64], readiness_mean: &[f64]) -> Self {
        Self {
            days: fatigue_mean.len(),
            elevated_fatigue_days: fatigue_mean.iter().filter(|&&f| f > ELEVATED_FATIGUE).count(),
            overreaching_days: fatigue_mean.iter().filter(|&&f| f > OVERREACHING_FATIGUE).count(),
            low_readiness_days: readiness_mean.iter().filter(|&&r| r < LOW_READINESS).count(),
        }
    }

    /// Share of program days, in percent
    pub fn share(&self, count: usize) -> f64 {
        if self.days == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.days as f64
        }
    }
}

impl SimulationResult {
    pub fn fatigue_bands(&self) -> Vec<PercentileBand> {
        self.weeks.iter().map(|w| w.fatigue).collect()
    }

    pub fn readiness_bands(&self) -> Vec<PercentileBand> {
        self.weeks.iter().map(|w| w.readiness).collect()
    }

    pub fn risk(&self) -> RiskSummary {
        RiskSummary::from_daily(&self.daily_fatigue_mean, &self.daily_readiness_mean)
    }

    /// Mean and extremes of every week's seven days
    pub fn week_ranges(&self) -> Vec<WeekRange> {
        self.weeks
            .iter()
            .enumerate()
            .map(|(index, week)| {
                let days = index * 7..(index + 1) * 7;
                WeekRange {
                    week_number: week.week_number,
                    fatigue_mean: self.daily_fatigue_mean[days.clone()].iter().mean(),
                    fatigue_min: self.daily_fatigue_min[days.clone()].iter().copied().fold(f64::INFINITY, f64::min),
                    fatigue_max: self.daily_fatigue_max[days.clone()].iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    readiness_mean: self.daily_readiness_mean[days.clone()].iter().mean(),
                    readiness_min: self.daily_readiness_min[days.clone()].iter().copied().fold(f64::INFINITY, f64::min),
                    readiness_max: self.daily_readiness_max[days].iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect()
    }

    pub fn overview(&self) -> ProgramOverview {
        let week_of = |day: usize| (day / 7) as u32 + 1;
        let (peak_day, peak_fatigue) = self
            .daily_fatigue_max
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (day, v)| if v > best.1 { (day, v) } else { best });
        let (low_day, lowest_readiness) = self
            .daily_readiness_min
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (day, v)| if v < best.1 { (day, v) } else { best });

        ProgramOverview {
            fatigue_mean: self.daily_fatigue_mean.iter().mean(),
            readiness_mean: self.daily_readiness_mean.iter().mean(),
            peak_fatigue,
            peak_fatigue_week: week_of(peak_day),
            lowest_readiness,
            lowest_readiness_week: week_of(low_day),
        }
    }
}

/// Samples collected by one chunk
struct ChunkSamples {
    fatigue: Vec<Vec<f64>>,
    readiness: Vec<Vec<f64>>,
    daily_fatigue: Vec<f64>,
    daily_readiness: Vec<f64>,
    fatigue_min: Vec<f64>,
    fatigue_max: Vec<f64>,
    readiness_min: Vec<f64>,
    readiness_max: Vec<f64>,
}

impl ChunkSamples {
    fn new(weeks: usize, trials: usize) -> Self {
        let days = weeks * 7;
        Self {
            fatigue: vec![Vec::with_capacity(trials); weeks],
            readiness: vec![Vec::with_capacity(trials); weeks],
            daily_fatigue: vec![0.0; days],
            daily_readiness: vec![0.0; days],
            fatigue_min: vec![f64::INFINITY; days],
            fatigue_max: vec![f64::NEG_INFINITY; days],
            readiness_min: vec![f64::INFINITY; days],
            readiness_max: vec![f64::NEG_INFINITY; days],
        }
    }

    fn record_day(&mut self, day: usize, fatigue: f64, readiness: f64) {
        self.daily_fatigue[day] += fatigue;
        self.daily_readiness[day] += readiness;
        self.fatigue_min[day] = self.fatigue_min[day].min(fatigue);
        self.fatigue_max[day] = self.fatigue_max[day].max(fatigue);
        self.readiness_min[day] = self.readiness_min[day].min(readiness);
        self.readiness_max[day] = self.readiness_max[day].max(readiness);
    }

    fn merge(&mut self, other: ChunkSamples) {
        for (mine, theirs) in self.fatigue.iter_mut().zip(other.fatigue) {
            mine.extend(theirs);
        }
        for (mine, theirs) in self.readiness.iter_mut().zip(other.readiness) {
            mine.extend(theirs);
        }
        for (mine, theirs) in self.daily_fatigue.iter_mut().zip(other.daily_fatigue) {
            *mine += theirs;
        }
        for (mine, theirs) in self.daily_readiness.iter_mut().zip(other.daily_readiness) {
            *mine += theirs;
        }
        for (mine, theirs) in self.fatigue_min.iter_mut().zip(other.fatigue_min) {
            *mine = mine.min(theirs);
        }
        for (mine, theirs) in self.fatigue_max.iter_mut().zip(other.fatigue_max) {
            *mine = mine.max(theirs);
        }
        for (mine, theirs) in self.readiness_min.iter_mut().zip(other.readiness_min) {
            *mine = mine.min(theirs);
        }
        for (mine, theirs) in self.readiness_max.iter_mut().zip(other.readiness_max) {
            *mine = mine.max(theirs);
        }
    }
}

/// Parallel Monte Carlo simulator
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: SimulationConfig,
    model: FatigueModel,
    aggregator: LoadAggregator,
}

impl MonteCarloSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_models(config, FatigueModel::new(), LoadAggregator::new())
    }

    pub fn with_models(config: SimulationConfig, model: FatigueModel, aggregator: LoadAggregator) -> Self {
        Self {
            config,
            model,
            aggregator,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run without progress reporting or cancellation
    pub fn run(&self, weeks: &[WeekDefinition]) -> SimResult<SimulationResult> {
        self.run_with_progress(weeks, &CancellationToken::new(), |_| {})
    }

    /// Run all trials, reporting percent complete after every chunk
    ///
    /// Cancellation is checked before each chunk starts; a cancelled run returns
    /// [`SimulationError::Cancelled`] and no partial results.
    pub fn run_with_progress<F>(
        &self,
        weeks: &[WeekDefinition],
        token: &CancellationToken,
        progress: F,
    ) -> SimResult<SimulationResult>
    where
        F: Fn(u8) + Sync,
    {
        self.config.validate()?;
        validate_weeks(weeks)?;

        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let total_chunks = self.config.chunk_count();
        let completed = AtomicUsize::new(0);
        let reported = Mutex::new(0u8);

        info!(
            %run_id,
            iterations = self.config.iterations,
            weeks = weeks.len(),
            chunks = total_chunks,
            seed,
            "Starting Monte Carlo simulation"
        );

        let run_chunks = || -> SimResult<Vec<ChunkSamples>> {
            (0..total_chunks)
                .into_par_iter()
                .map(|chunk_index| {
                    if token.is_cancelled() {
                        return Err(SimulationError::Cancelled {
                            completed_chunks: completed.load(Ordering::Relaxed),
                            total_chunks,
                        });
                    }

                    let offset = chunk_index * self.config.chunk_size;
                    let trials = self.config.chunk_size.min(self.config.iterations - offset);
                    let samples = self.run_chunk(weeks, trials, seed.wrapping_add(chunk_index as u64));

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(chunk_index, trials, done, "Chunk complete");
                    let percent = (done * 100 / total_chunks) as u8;
                    if let Ok(mut last) = reported.lock() {
                        // Chunks finish out of order; only report forward progress
                        if percent > *last {
                            *last = percent;
                            progress(percent);
                        }
                    }
                    Ok(samples)
                })
                .collect()
        };

        let chunks = match self.config.num_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SimulationError::WorkerFailure {
                    reason: format!("Failed to create thread pool: {}", e),
                })?
                .install(run_chunks),
            None => run_chunks(),
        };

        let chunks = match chunks {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(%run_id, "Simulation aborted: {}", e);
                return Err(e);
            }
        };

        let result = self.summarize(run_id, seed, weeks, chunks, start)?;
        info!(
            %run_id,
            elapsed_ms = result.elapsed_ms as u64,
            "Monte Carlo simulation complete"
        );
        Ok(result)
    }

    fn run_chunk(&self, weeks: &[WeekDefinition], trials: usize, seed: u64) -> ChunkSamples {
        let mut generator = SessionGenerator::new(StdRng::seed_from_u64(seed), &self.config);
        let mut samples = ChunkSamples::new(weeks.len(), trials);
        let mut sessions = Vec::with_capacity(self.config.max_sessions_per_week);

        for _ in 0..trials {
            self.simulate_trial(&mut generator, weeks, &mut sessions, &mut samples);
        }
        samples
    }

    fn simulate_trial<R: Rng>(
        &self,
        generator: &mut SessionGenerator<'_, R>,
        weeks: &[WeekDefinition],
        sessions: &mut Vec<SimulatedSession>,
        samples: &mut ChunkSamples,
    ) {
        let mut state = self.model.initial_state();
        let mut recency = SessionRecency::new(self.model.config().detraining_history);
        let base_power = self.config.base_power;

        for (week_index, week) in weeks.iter().enumerate() {
            generator.week_sessions(week, sessions);

            let mut day_costs = [0.0; 7];
            let mut trained = [false; 7];
            for session in sessions.iter() {
                day_costs[session.day] +=
                    self.aggregator
                        .session_load(session.effort, session.duration, session.power / base_power);
                trained[session.day] = true;
            }

            let (mut fatigue, mut readiness) = (0.0, 0.0);
            for day in 0..7 {
                let day_index = week_index * 7 + day;
                if trained[day] {
                    recency.record(day_index as u32);
                }
                state = self.model.step(&state, day_costs[day], DEFAULT_PHI_RECOVERY);
                fatigue = self.model.fatigue_score(&state);
                readiness = (self.model.readiness_score(&state)
                    - self.model.detraining_penalty(day_index as u32, &recency))
                .clamp(0.0, 100.0);

                samples.record_day(day_index, fatigue, readiness);
            }

            samples.fatigue[week_index].push(fatigue);
            samples.readiness[week_index].push(readiness);
        }
    }

    fn summarize(
        &self,
        run_id: Uuid,
        seed: u64,
        weeks: &[WeekDefinition],
        chunks: Vec<ChunkSamples>,
        start: Instant,
    ) -> SimResult<SimulationResult> {
        let mut all = ChunkSamples::new(weeks.len(), self.config.iterations);
        for chunk in chunks {
            all.merge(chunk);
        }

        let n = self.config.iterations as f64;
        let mut distributions = Vec::with_capacity(weeks.len());
        for (index, week) in weeks.iter().enumerate() {
            let fatigue_samples = &mut all.fatigue[index];
            let fatigue_mean = fatigue_samples.iter().mean();
            let fatigue_std = fatigue_samples.iter().population_std_dev();
            let fatigue = PercentileBand::from_samples(fatigue_samples);

            let readiness_samples = &mut all.readiness[index];
            let readiness_mean = readiness_samples.iter().mean();
            let readiness_std = readiness_samples.iter().population_std_dev();
            let readiness = PercentileBand::from_samples(readiness_samples);

            let (Some(fatigue), Some(readiness)) = (fatigue, readiness) else {
                return Err(SimulationError::WorkerFailure {
                    reason: format!("week {} produced no finite samples", week.week_number),
                });
            };

            distributions.push(WeekDistribution {
                week_number: week.week_number,
                fatigue,
                readiness,
                fatigue_mean,
                readiness_mean,
                fatigue_std,
                readiness_std,
            });
        }

        Ok(SimulationResult {
            run_id,
            iterations: self.config.iterations,
            seed,
            weeks: distributions,
            daily_fatigue_mean: all.daily_fatigue.iter().map(|s| s / n).collect(),
            daily_readiness_mean: all.daily_readiness.iter().map(|s| s / n).collect(),
            daily_fatigue_min: all.fatigue_min,
            daily_fatigue_max: all.fatigue_max,
            daily_readiness_min: all.readiness_min,
            daily_readiness_max: all.readiness_max,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }
}

/// Reject week definitions the simulator cannot run
pub fn validate_weeks(weeks: &[WeekDefinition]) -> SimResult<()> {
    if weeks.is_empty() {
        return Err(SimulationError::MalformedWeek {
            week: 0,
            reason: "program has no weeks".to_string(),
        });
    }
    for week in weeks {
        week.validate().map_err(|e| SimulationError::MalformedWeek {
            week: week.week_number,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Handle to a simulation running on the blocking pool
pub struct SimulationHandle {
    progress: watch::Receiver<u8>,
    token: CancellationToken,
    join: JoinHandle<SimResult<SimulationResult>>,
}

impl SimulationHandle {
    /// Receiver that observes percent complete
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> SimResult<SimulationResult> {
        self.join.await.map_err(|e| SimulationError::WorkerFailure {
            reason: format!("simulation task failed: {}", e),
        })?
    }
}

/// Start a simulation on tokio's blocking pool
///
/// Must be called from within a tokio runtime.
pub fn simulate_async(simulator: Arc<MonteCarloSimulator>, weeks: Arc<Vec<WeekDefinition>>) -> SimulationHandle {
    let (tx, rx) = watch::channel(0u8);
    let token = CancellationToken::new();
    let task_token = token.clone();

    let join = tokio::task::spawn_blocking(move || {
        simulator.run_with_progress(&weeks, &task_token, |percent| {
            let _ = tx.send(percent);
        })
    });

    SimulationHandle {
        progress: rx,
        token,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStyle;

    fn weeks(multipliers: &[f64]) -> Vec<WeekDefinition> {
        multipliers
            .iter()
            .enumerate()
            .map(|(i, &m)| {
                let mut week = WeekDefinition::default_for(i as u32 + 1, 20.0, SessionStyle::Interval);
                week.power_multiplier = m;
                week
            })
            .collect()
    }

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            iterations: 400,
            chunk_size: 100,
            seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_session_generator_respects_bounds() {
        let config = SimulationConfig::default();
        let mut generator = SessionGenerator::new(StdRng::seed_from_u64(7), &config);
        let week = &weeks(&[1.0])[0];
        let mut sessions = Vec::new();

        for _ in 0..200 {
            generator.week_sessions(week, &mut sessions);
            assert!((2..=4).contains(&sessions.len()));
            assert!(sessions.windows(2).all(|w| w[0].day < w[1].day));
            for s in &sessions {
                assert!(s.day < 7);
                assert!(s.power >= 190.0 && s.power <= 210.0);
                assert!(s.effort >= 5.5 && s.effort <= 6.5);
                assert!(s.duration >= 18.0 && s.duration <= 22.0);
            }
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let program = weeks(&[1.0, 1.1, 1.2, 0.8]);
        let a = MonteCarloSimulator::new(small_config(42)).run(&program).unwrap();
        let b = MonteCarloSimulator::new(small_config(42)).run(&program).unwrap();

        assert_eq!(a.weeks, b.weeks);
        assert_eq!(a.daily_fatigue_mean, b.daily_fatigue_mean);
        assert_eq!(a.seed, 42);
    }

    #[test]
    fn test_bands_are_ordered_and_bounded() {
        let program = weeks(&[1.0, 1.2, 1.4, 0.7, 1.0, 1.3]);
        let result = MonteCarloSimulator::new(small_config(3)).run(&program).unwrap();

        assert_eq!(result.weeks.len(), 6);
        assert_eq!(result.daily_fatigue_mean.len(), 42);
        for week in &result.weeks {
            assert!(week.fatigue.is_ordered());
            assert!(week.readiness.is_ordered());
            assert!(week.fatigue.p15 >= 0.0 && week.fatigue.p85 <= 100.0);
            assert!(week.readiness.p15 >= 0.0 && week.readiness.p85 <= 100.0);
        }
    }

    #[test]
    fn test_daily_ranges_bracket_means() {
        let result = MonteCarloSimulator::new(small_config(9))
            .run(&weeks(&[1.0, 1.2, 0.8]))
            .unwrap();

        assert_eq!(result.daily_fatigue_min.len(), 21);
        for day in 0..21 {
            assert!(result.daily_fatigue_min[day] <= result.daily_fatigue_mean[day] + 1e-9);
            assert!(result.daily_fatigue_mean[day] <= result.daily_fatigue_max[day] + 1e-9);
            assert!(result.daily_readiness_min[day] <= result.daily_readiness_mean[day] + 1e-9);
            assert!(result.daily_readiness_mean[day] <= result.daily_readiness_max[day] + 1e-9);
        }

        let ranges = result.week_ranges();
        assert_eq!(ranges.len(), 3);
        assert!(ranges
            .iter()
            .all(|r| r.fatigue_min <= r.fatigue_mean + 1e-9 && r.fatigue_mean <= r.fatigue_max + 1e-9));

        let overview = result.overview();
        let peak = result.daily_fatigue_max.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(overview.peak_fatigue, peak);
        assert!((1..=3).contains(&overview.peak_fatigue_week));
        assert!((1..=3).contains(&overview.lowest_readiness_week));
    }

    #[test]
    fn test_risk_counts() {
        let fatigue = [10.0, 60.0, 61.0, 80.0, 85.0, 95.0];
        let readiness = [90.0, 50.0, 49.9, 20.0, 15.0, 5.0];
        let risk = RiskSummary::from_daily(&fatigue, &readiness);

        assert_eq!(risk.days, 6);
        assert_eq!(risk.elevated_fatigue_days, 4);
        assert_eq!(risk.overreaching_days, 2);
        assert_eq!(risk.low_readiness_days, 4);
        assert!((risk.share(risk.overreaching_days) - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(RiskSummary::from_daily(&[], &[]).share(0), 0.0);
    }

    #[test]
    fn test_risk_of_seeded_run_matches_daily_means() {
        let result = MonteCarloSimulator::new(small_config(5))
            .run(&weeks(&[1.3, 1.4, 1.5, 1.5]))
            .unwrap();
        let risk = result.risk();

        assert_eq!(risk.days, 28);
        let elevated = result.daily_fatigue_mean.iter().filter(|&&f| f > 60.0).count();
        let low = result.daily_readiness_mean.iter().filter(|&&r| r < 50.0).count();
        assert_eq!(risk.elevated_fatigue_days, elevated);
        assert_eq!(risk.low_readiness_days, low);
        assert!(risk.overreaching_days <= risk.elevated_fatigue_days);

        // Same seed, same counts
        let again = MonteCarloSimulator::new(small_config(5))
            .run(&weeks(&[1.3, 1.4, 1.5, 1.5]))
            .unwrap();
        assert_eq!(again.risk(), risk);
    }

    #[test]
    fn test_harder_weeks_raise_fatigue() {
        let easy = MonteCarloSimulator::new(small_config(9))
            .run(&weeks(&[0.6, 0.6, 0.6]))
            .unwrap();
        let mut hard_program = weeks(&[0.6, 0.6, 0.6]);
        for week in &mut hard_program {
            week.target_rpe = 9.0;
            week.duration_minutes = 60.0;
        }
        let hard = MonteCarloSimulator::new(small_config(9)).run(&hard_program).unwrap();

        assert!(hard.weeks[2].fatigue.p50 > easy.weeks[2].fatigue.p50);
    }

    #[test]
    fn test_progress_reaches_one_hundred() {
        let reports = Mutex::new(Vec::new());
        let simulator = MonteCarloSimulator::new(small_config(1));
        simulator
            .run_with_progress(&weeks(&[1.0, 1.0]), &CancellationToken::new(), |p| {
                reports.lock().unwrap().push(p)
            })
            .unwrap();

        let reports = reports.into_inner().unwrap();
        assert!(!reports.is_empty() && reports.len() <= 4);
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(reports.last().copied(), Some(100));
    }

    #[test]
    fn test_cancelled_run_returns_no_results() {
        let token = CancellationToken::new();
        token.cancel();
        let result = MonteCarloSimulator::new(small_config(1)).run_with_progress(&weeks(&[1.0]), &token, |_| {});
        assert!(matches!(result, Err(SimulationError::Cancelled { .. })));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let config = SimulationConfig {
            iterations: 0,
            ..SimulationConfig::default()
        };
        let result = MonteCarloSimulator::new(config).run(&weeks(&[1.0]));
        assert!(matches!(result, Err(SimulationError::InvalidParameter { .. })));

        let config = SimulationConfig {
            min_sessions_per_week: 5,
            max_sessions_per_week: 3,
            ..small_config(1)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_week_is_rejected() {
        let mut program = weeks(&[1.0, 1.0]);
        program[1].power_multiplier = 0.0;
        let result = MonteCarloSimulator::new(small_config(1)).run(&program);
        assert!(matches!(result, Err(SimulationError::MalformedWeek { week: 2, .. })));

        assert!(matches!(validate_weeks(&[]), Err(SimulationError::MalformedWeek { .. })));
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let config = SimulationConfig {
            num_threads: Some(2),
            ..small_config(5)
        };
        let pooled = MonteCarloSimulator::new(config).run(&weeks(&[1.0, 1.1])).unwrap();
        let default = MonteCarloSimulator::new(small_config(5)).run(&weeks(&[1.0, 1.1])).unwrap();
        assert_eq!(pooled.weeks, default.weeks);
    }

    #[tokio::test]
    async fn test_simulate_async_reports_progress() {
        let simulator = Arc::new(MonteCarloSimulator::new(small_config(11)));
        let handle = simulate_async(simulator, Arc::new(weeks(&[1.0, 1.2, 0.9])));
        let progress = handle.progress();

        let result = handle.wait().await.unwrap();
        assert_eq!(result.weeks.len(), 3);
        assert_eq!(*progress.borrow(), 100);
    }
}
