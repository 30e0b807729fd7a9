use super::TimelineRow;
use crate::error::Result;
use crate::modifiers::WeekAnalysis;
use serde::Serialize;
use std::path::Path;

/// Flat CSV view of a week analysis
#[derive(Debug, Serialize)]
struct WeekRecord<'a> {
    week: u32,
    phase_name: &'a str,
    power_multiplier: f64,
    cycle_phase: String,
    cycle_index: u32,
    phase_position: String,
    fatigue_p15: f64,
    fatigue_p30: f64,
    fatigue_p50: f64,
    fatigue_p70: f64,
    fatigue_p85: f64,
    readiness_p15: f64,
    readiness_p30: f64,
    readiness_p50: f64,
    readiness_p70: f64,
    readiness_p85: f64,
    fatigue_velocity: f64,
    fatigue_acceleration: f64,
    local_peak: bool,
    local_trough: bool,
    change_point: bool,
}

impl<'a> From<&'a WeekAnalysis> for WeekRecord<'a> {
    fn from(week: &'a WeekAnalysis) -> Self {
        Self {
            week: week.week_number,
            phase_name: &week.phase_name,
            power_multiplier: week.power_multiplier,
            cycle_phase: week.cycle_phase.to_string(),
            cycle_index: week.cycle_index,
            phase_position: week.phase_position.to_string(),
            fatigue_p15: week.fatigue.p15,
            fatigue_p30: week.fatigue.p30,
            fatigue_p50: week.fatigue.p50,
            fatigue_p70: week.fatigue.p70,
            fatigue_p85: week.fatigue.p85,
            readiness_p15: week.readiness.p15,
            readiness_p30: week.readiness.p30,
            readiness_p50: week.readiness.p50,
            readiness_p70: week.readiness.p70,
            readiness_p85: week.readiness.p85,
            fatigue_velocity: week.fatigue_velocity,
            fatigue_acceleration: week.fatigue_acceleration,
            local_peak: week.is_local_peak,
            local_trough: week.is_local_trough,
            change_point: week.is_change_point,
        }
    }
}

/// Export the weekly percentile table
pub fn export_weeks<P: AsRef<Path>>(weeks: &[WeekAnalysis], output_path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    for week in weeks {
        writer.serialize(WeekRecord::from(week))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export a daily timeline; missing scores become empty cells
pub fn export_timeline<P: AsRef<Path>>(rows: &[TimelineRow], output_path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
