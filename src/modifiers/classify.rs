//! Week analysis and deterministic cycle-phase classification
//!
//! Template weeks are labelled from what the program says about itself: recovery
//! focus, phase-name keywords, the shape of planned work capacity and finally the
//! week's position in the program. Simulated percentile curves are then smoothed and
//! differentiated so every week carries its distribution, slope and turning points.

use super::generate::ModifierConfig;
use crate::models::{CyclePhase, PhasePosition, SessionStyle};
use crate::signal::{
    acceleration, calculate_adaptive_windows, local_extrema, triangular_smooth, velocity, Cusum, Extremum,
    PercentileBand,
};
use crate::simulation::SimulationResult;
use crate::template::WeekDefinition;
use serde::{Deserialize, Serialize};

const TROUGH_KEYWORDS: [&str; 4] = ["recovery", "deload", "taper", "rest"];
const PEAK_KEYWORDS: [&str; 4] = ["peak", "max", "test", "race"];
const ASCENDING_KEYWORDS: [&str; 4] = ["build", "base", "progress", "load"];

/// Relative change in work capacity treated as a drop
const DROP_THRESHOLD: f64 = 0.15;

/// Relative change in work capacity treated as a rise
const RISE_THRESHOLD: f64 = 0.10;

/// Simulated and planned picture of one program week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekAnalysis {
    pub week_number: u32,
    pub phase_name: String,
    pub power_multiplier: f64,
    pub work_capacity: f64,
    pub fatigue: PercentileBand,
    pub readiness: PercentileBand,

    /// Velocity of the smoothed median fatigue curve
    pub fatigue_velocity: f64,
    pub fatigue_acceleration: f64,

    pub cycle_phase: CyclePhase,

    /// Number of completed load cycles before this week
    pub cycle_index: u32,

    pub phase_position: PhasePosition,

    /// 0 at the start of a run of same-phase weeks, 1 at its end
    pub relative_position: f64,

    pub is_local_peak: bool,
    pub is_local_trough: bool,
    pub is_change_point: bool,
    pub session_style: SessionStyle,
}

fn has_keyword(text: &str, keywords: &[&str]) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| keywords.iter().any(|k| token.starts_with(k)))
}

fn keyword_phase(week: &WeekDefinition) -> Option<CyclePhase> {
    let text = format!(
        "{} {}",
        week.phase_name,
        week.description.as_deref().unwrap_or_default()
    );
    if has_keyword(&text, &TROUGH_KEYWORDS) {
        Some(CyclePhase::Trough)
    } else if has_keyword(&text, &PEAK_KEYWORDS) {
        Some(CyclePhase::Peak)
    } else if has_keyword(&text, &ASCENDING_KEYWORDS) {
        Some(CyclePhase::Ascending)
    } else {
        None
    }
}

fn relative_change(from: f64, to: f64) -> Option<f64> {
    (from > 0.0).then(|| (to - from) / from)
}

/// Label every week with a cycle phase
///
/// Rules are tried in order: recovery focus, name/description keywords, work-capacity
/// shape against the neighbouring weeks, then position in the program.
pub fn classify_weeks(weeks: &[WeekDefinition]) -> Vec<CyclePhase> {
    let n = weeks.len();
    if n == 0 {
        return Vec::new();
    }

    let capacity: Vec<f64> = weeks.iter().map(WeekDefinition::work_capacity).collect();
    let baseline = capacity.iter().sum::<f64>() / n as f64;
    let final_weeks = ((n as f64) * 0.1).ceil() as usize;

    let mut phases: Vec<CyclePhase> = Vec::with_capacity(n);
    for (i, week) in weeks.iter().enumerate() {
        let phase = if week.focus.trim().eq_ignore_ascii_case("recovery") {
            CyclePhase::Trough
        } else if let Some(phase) = keyword_phase(week) {
            phase
        } else {
            let from_previous = i
                .checked_sub(1)
                .and_then(|prev| relative_change(capacity[prev], capacity[i]));
            let to_next = capacity
                .get(i + 1)
                .and_then(|&next| relative_change(capacity[i], next));

            match (from_previous, to_next) {
                (Some(change), _) if change < -DROP_THRESHOLD => {
                    if capacity[i] < baseline {
                        CyclePhase::Trough
                    } else {
                        CyclePhase::Descending
                    }
                }
                (_, Some(next)) if next < -DROP_THRESHOLD && capacity[i] >= baseline => CyclePhase::Peak,
                (Some(change), _) if change > RISE_THRESHOLD => CyclePhase::Ascending,
                _ => {
                    if (i as f64) < n as f64 / 4.0 {
                        CyclePhase::Ascending
                    } else if i >= n - final_weeks {
                        CyclePhase::Peak
                    } else {
                        phases.last().copied().unwrap_or(CyclePhase::Ascending)
                    }
                }
            }
        };
        phases.push(phase);
    }
    phases
}

/// Relative position of every week within its run of same-phase weeks
fn run_positions(phases: &[CyclePhase]) -> Vec<f64> {
    let mut positions = vec![0.5; phases.len()];
    let mut start = 0;
    while start < phases.len() {
        let end = start + phases[start..].iter().take_while(|p| **p == phases[start]).count();
        let len = end - start;
        if len > 1 {
            for (offset, slot) in positions[start..end].iter_mut().enumerate() {
                *slot = offset as f64 / (len - 1) as f64;
            }
        }
        start = end;
    }
    positions
}

/// Combine week definitions with their simulated distributions
pub fn analyze_weeks(
    weeks: &[WeekDefinition],
    simulation: &SimulationResult,
    config: &ModifierConfig,
) -> Vec<WeekAnalysis> {
    let n = weeks.len().min(simulation.weeks.len());
    let weeks = &weeks[..n];
    let phases = classify_weeks(weeks);
    let positions = run_positions(&phases);

    let median: Vec<f64> = simulation.weeks[..n].iter().map(|w| w.fatigue.p50).collect();
    let windows = calculate_adaptive_windows(n);
    let smoothed = triangular_smooth(&median, windows.local);
    let fatigue_velocity = velocity(&smoothed);
    let fatigue_acceleration = acceleration(&smoothed);
    let change_points = Cusum::new(config.cusum_threshold).detect(&median);
    let extrema = local_extrema(&smoothed, config.extrema_margin);

    let mut cycle_index = 0;
    let mut analyses = Vec::with_capacity(n);
    for (i, week) in weeks.iter().enumerate() {
        if i > 0
            && phases[i] == CyclePhase::Ascending
            && matches!(phases[i - 1], CyclePhase::Descending | CyclePhase::Trough)
        {
            cycle_index += 1;
        }

        let distribution = &simulation.weeks[i];
        analyses.push(WeekAnalysis {
            week_number: week.week_number,
            phase_name: week.phase_name.clone(),
            power_multiplier: week.power_multiplier,
            work_capacity: week.work_capacity(),
            fatigue: distribution.fatigue,
            readiness: distribution.readiness,
            fatigue_velocity: fatigue_velocity.get(i).copied().unwrap_or(0.0),
            fatigue_acceleration: fatigue_acceleration.get(i).copied().unwrap_or(0.0),
            cycle_phase: phases[i],
            cycle_index,
            phase_position: PhasePosition::from_relative(positions[i]),
            relative_position: positions[i],
            is_local_peak: extrema.contains(&(i, Extremum::Peak)),
            is_local_trough: extrema.contains(&(i, Extremum::Trough)),
            is_change_point: change_points.contains(&i),
            session_style: week.session_style,
        });
    }
    analyses
}
