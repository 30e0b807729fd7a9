use crate::error::{ImportExportError, Result};
use crate::fatigue::DailyMetrics;
use crate::models::CyclePhase;
use crate::modifiers::{resolve_modifier, DayContext, FatigueModifier, WeekAnalysis};
use crate::phase::PhaseDetection;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod csv;
pub mod json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ImportExportError::UnsupportedFormat { format: s.to_string() }.into()),
        }
    }

    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::parse(ext)
    }
}

/// One exported day of a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub date: NaiveDate,
    pub daily_cost: f64,
    pub fatigue: Option<f64>,
    pub readiness: Option<f64>,
    pub phase: Option<CyclePhase>,
    pub confidence: Option<f64>,

    /// Priority of the modifier that applies on this day
    pub modifier_priority: Option<u32>,
    pub modifier_message: Option<String>,
}

/// Join daily metrics with phase detections and the applying modifier
///
/// `detections` covers only the days that have scores, in order, as produced by
/// running the detector over [`crate::fatigue::score_series`].
pub fn timeline_rows(
    metrics: &[DailyMetrics],
    detections: &[PhaseDetection],
    modifiers: &[FatigueModifier],
) -> Vec<TimelineRow> {
    let mut detections = detections.iter();

    metrics
        .iter()
        .map(|m| {
            let detection = match (m.fatigue, m.readiness) {
                (Some(_), Some(_)) => detections.next(),
                _ => None,
            };
            let phase = detection.and_then(|d| d.phase);

            let modifier = match (m.fatigue, m.readiness) {
                (Some(fatigue), Some(readiness)) => {
                    let mut context = DayContext::new(fatigue, readiness);
                    context.cycle_phase = phase;
                    resolve_modifier(modifiers, &context)
                }
                _ => None,
            };

            TimelineRow {
                date: m.date,
                daily_cost: m.daily_cost,
                fatigue: m.fatigue,
                readiness: m.readiness,
                phase,
                confidence: detection.filter(|d| d.is_determined()).map(|d| d.confidence),
                modifier_priority: modifier.map(|md| md.priority),
                modifier_message: modifier.and_then(|md| md.adjustments.message.clone()),
            }
        })
        .collect()
}

/// Write timeline rows in the format implied by the path
pub fn export_timeline(rows: &[TimelineRow], path: &Path) -> Result<()> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Csv => csv::export_timeline(rows, path),
        ExportFormat::Json => json::export_json(&rows, path),
    }
}

/// Write the weekly analysis in the format implied by the path
pub fn export_weeks(weeks: &[WeekAnalysis], path: &Path) -> Result<()> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Csv => csv::export_weeks(weeks, path),
        ExportFormat::Json => json::export_json(&weeks, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{ModifierAdjustments, ModifierCondition, Threshold};

    fn day(day: u32, fatigue: Option<f64>) -> DailyMetrics {
        DailyMetrics {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            day_index: day - 1,
            daily_cost: 10.0,
            phi: 1.0,
            metabolic: 0.0,
            structural: 0.0,
            raw_fatigue: fatigue.unwrap_or(0.0),
            raw_readiness: 100.0 - fatigue.unwrap_or(0.0),
            detraining_penalty: 0.0,
            has_questionnaire: false,
            fatigue,
            readiness: fatigue.map(|f| 100.0 - f),
        }
    }

    #[test]
    fn test_rows_align_detections_with_scored_days() {
        let metrics = vec![day(1, None), day(2, Some(40.0)), day(3, Some(80.0))];
        let mut determined = PhaseDetection::undetermined(5);
        determined.phase = Some(CyclePhase::Peak);
        determined.confidence = 0.6;
        let detections = vec![PhaseDetection::undetermined(1), determined];

        let modifiers = vec![FatigueModifier::new(
            ModifierCondition::fatigue(Threshold::above(70.0)),
            ModifierAdjustments {
                message: Some("ease off".to_string()),
                ..ModifierAdjustments::default()
            },
            3,
        )
        .for_cycle_phase(CyclePhase::Peak)];

        let rows = timeline_rows(&metrics, &detections, &modifiers);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].phase, None);
        assert_eq!(rows[1].phase, None);
        assert_eq!(rows[1].confidence, None);
        assert_eq!(rows[2].phase, Some(CyclePhase::Peak));
        assert_eq!(rows[2].confidence, Some(0.6));
        assert_eq!(rows[2].modifier_priority, Some(3));
        assert_eq!(rows[2].modifier_message.as_deref(), Some("ease off"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")).unwrap(), ExportFormat::Json);
        assert!(ExportFormat::from_path(Path::new("out.xlsx")).is_err());
    }
}
