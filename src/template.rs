//! Program templates
//!
//! A template is a JSON document describing a multi-week program either as keyframed
//! week definitions (`weeks`) or as repeating blocks (`blocks`). Keyframes are placed
//! by position (`3`, `"first"`, `"last"`, `"33.3333%"`) and expanded with stepped
//! interpolation: every week uses the last keyframe at or before it.

use crate::error::{LoadCycleError, Result, TemplateError};
use crate::models::SessionStyle;
use crate::modifiers::FatigueModifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Program length used when a template does not say
pub const DEFAULT_PROGRAM_WEEKS: u32 = 8;

/// Session duration used when neither the week nor the template set one
pub const DEFAULT_SESSION_DURATION: f64 = 15.0;

pub const DEFAULT_TARGET_RPE: f64 = 6.0;
pub const DEFAULT_FOCUS: &str = "Volume";
pub const DEFAULT_WORK_REST: &str = "1:1";

/// Keyframe position within a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPosition", into = "RawPosition")]
pub enum WeekPosition {
    /// Explicit 1-based week number
    Week(u32),
    First,
    Last,
    /// Percentage of the program (0-100)
    Percent(f64),
}

impl WeekPosition {
    /// Resolve to a 1-based week number for a program of `total_weeks`
    pub fn resolve(&self, total_weeks: u32) -> u32 {
        let total = total_weeks.max(1);
        match self {
            WeekPosition::Week(week) => *week,
            WeekPosition::First => 1,
            WeekPosition::Last => total,
            WeekPosition::Percent(percent) => {
                let fraction = percent / 100.0;
                if fraction == 0.0 {
                    return 1;
                }
                let week = (fraction * total as f64).round_ties_even() + 1.0;
                week.clamp(1.0, total as f64) as u32
            }
        }
    }
}

impl Default for WeekPosition {
    fn default() -> Self {
        WeekPosition::Week(1)
    }
}

impl FromStr for WeekPosition {
    type Err = TemplateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || TemplateError::InvalidPosition {
            position: s.to_string(),
        };

        match trimmed.to_lowercase().as_str() {
            "first" => return Ok(WeekPosition::First),
            "last" => return Ok(WeekPosition::Last),
            _ => {}
        }

        if let Some(number) = trimmed.strip_suffix('%') {
            let percent: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                return Err(invalid());
            }
            return Ok(WeekPosition::Percent(percent));
        }

        let week: i64 = trimmed.parse().map_err(|_| invalid())?;
        Ok(WeekPosition::Week(week.clamp(1, u32::MAX as i64) as u32))
    }
}

impl fmt::Display for WeekPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekPosition::Week(week) => write!(f, "{}", week),
            WeekPosition::First => f.write_str("first"),
            WeekPosition::Last => f.write_str("last"),
            WeekPosition::Percent(percent) => write!(f, "{}%", percent),
        }
    }
}

/// Wire form of a position: a bare number or a string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Number(i64),
    Decimal(f64),
    Text(String),
}

impl TryFrom<RawPosition> for WeekPosition {
    type Error = TemplateError;

    fn try_from(raw: RawPosition) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawPosition::Number(week) => Ok(WeekPosition::Week(week.clamp(1, u32::MAX as i64) as u32)),
            RawPosition::Decimal(week) if week.is_finite() => {
                Ok(WeekPosition::Week(week.round_ties_even().clamp(1.0, u32::MAX as f64) as u32))
            }
            RawPosition::Decimal(week) => Err(TemplateError::InvalidPosition {
                position: week.to_string(),
            }),
            RawPosition::Text(text) => text.parse(),
        }
    }
}

impl From<WeekPosition> for RawPosition {
    fn from(position: WeekPosition) -> Self {
        match position {
            WeekPosition::Week(week) => RawPosition::Number(week as i64),
            other => RawPosition::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekConfigKind {
    Fixed,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRange {
    #[serde(default = "default_range_min")]
    pub min: u32,
    #[serde(default = "default_range_max")]
    pub max: u32,
    #[serde(default = "default_range_step")]
    pub step: u32,
}

fn default_range_min() -> u32 {
    4
}

fn default_range_max() -> u32 {
    8
}

fn default_range_step() -> u32 {
    1
}

/// Program length configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WeekConfigKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<WeekRange>,
}

/// Keyframe week as authored in a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekTemplate {
    #[serde(default)]
    pub position: WeekPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_rest_ratio: Option<String>,
    #[serde(rename = "targetRPE", default, skip_serializing_if = "Option::is_none")]
    pub target_rpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_style: Option<String>,
}

/// Repeating block of weeks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub week_count: u32,
    /// Power multiplier for each week of the block; the last value repeats
    #[serde(default)]
    pub power_progression: Vec<f64>,
    #[serde(rename = "targetRPE", default = "default_target_rpe")]
    pub target_rpe: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_rest_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_style: Option<String>,
}

fn default_target_rpe() -> f64 {
    DEFAULT_TARGET_RPE
}

fn default_session_duration() -> f64 {
    DEFAULT_SESSION_DURATION
}

/// Program template document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub week_config: WeekConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_session_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression_mode: Option<String>,
    #[serde(default = "default_session_duration")]
    pub default_session_duration_minutes: f64,
    #[serde(default)]
    pub weeks: Vec<WeekTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fatigue_modifiers: Vec<FatigueModifier>,
}

/// Fully resolved definition of one program week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDefinition {
    pub week_number: u32,
    pub phase_name: String,
    pub focus: String,
    pub description: Option<String>,
    pub power_multiplier: f64,
    pub target_rpe: f64,
    pub duration_minutes: f64,
    pub work_rest_ratio: String,
    pub session_style: SessionStyle,
    /// Block the week was expanded from, for block programs
    pub block_name: Option<String>,
}

impl WeekDefinition {
    /// Default week used when a template defines no keyframes
    pub fn default_for(week_number: u32, duration_minutes: f64, style: SessionStyle) -> Self {
        Self {
            week_number,
            phase_name: format!("Week {}", week_number),
            focus: DEFAULT_FOCUS.to_string(),
            description: None,
            power_multiplier: 1.0,
            target_rpe: DEFAULT_TARGET_RPE,
            duration_minutes,
            work_rest_ratio: DEFAULT_WORK_REST.to_string(),
            session_style: style,
            block_name: None,
        }
    }

    /// Planned work capacity used for load-shape classification
    pub fn work_capacity(&self) -> f64 {
        self.power_multiplier * self.duration_minutes * self.target_rpe
    }

    pub fn validate(&self) -> std::result::Result<(), TemplateError> {
        let invalid = |field: &str, reason: String| TemplateError::InvalidField {
            week: self.week_number,
            field: field.to_string(),
            reason,
        };

        if !(self.power_multiplier.is_finite() && self.power_multiplier > 0.0) {
            return Err(invalid(
                "powerMultiplier",
                format!("must be positive, got {}", self.power_multiplier),
            ));
        }
        if !(self.target_rpe.is_finite() && (1.0..=10.0).contains(&self.target_rpe)) {
            return Err(invalid(
                "targetRPE",
                format!("must be between 1 and 10, got {}", self.target_rpe),
            ));
        }
        if !(self.duration_minutes.is_finite() && self.duration_minutes > 0.0) {
            return Err(invalid(
                "durationMinutes",
                format!("must be positive, got {}", self.duration_minutes),
            ));
        }
        Ok(())
    }
}

impl ProgramTemplate {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(LoadCycleError::from)
    }

    /// Program length: override, else fixed, else midpoint of the variable range, else 8
    pub fn program_weeks(&self, override_weeks: Option<u32>) -> u32 {
        if let Some(weeks) = override_weeks.filter(|w| *w > 0) {
            return weeks;
        }

        match self.week_config.kind {
            Some(WeekConfigKind::Fixed) => self.week_config.fixed.unwrap_or(DEFAULT_PROGRAM_WEEKS),
            Some(WeekConfigKind::Variable) => {
                let range = self.week_config.range.clone().unwrap_or(WeekRange {
                    min: default_range_min(),
                    max: default_range_max(),
                    step: default_range_step(),
                });
                (range.min + range.max) / 2
            }
            None => DEFAULT_PROGRAM_WEEKS,
        }
    }

    pub fn default_style(&self) -> SessionStyle {
        self.default_session_style
            .as_deref()
            .and_then(SessionStyle::parse)
            .unwrap_or_default()
    }

    fn default_duration(&self) -> f64 {
        if self.default_session_duration_minutes.is_finite() && self.default_session_duration_minutes > 0.0 {
            self.default_session_duration_minutes
        } else {
            DEFAULT_SESSION_DURATION
        }
    }

    /// Whether the template is authored as repeating blocks
    pub fn is_block_based(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Resolve and validate the definition of every week
    pub fn resolve_weeks(&self, total_weeks: u32) -> std::result::Result<Vec<WeekDefinition>, TemplateError> {
        if total_weeks == 0 {
            return Err(TemplateError::NoWeeks);
        }

        let weeks = if self.is_block_based() {
            expand_blocks(&self.blocks, total_weeks, self.default_duration(), self.default_style())?
        } else {
            interpolate_weeks(&self.weeks, total_weeks, self.default_duration(), self.default_style())
        };

        for week in &weeks {
            week.validate()?;
        }
        Ok(weeks)
    }
}

/// Expand keyframes into one definition per week using stepped interpolation
pub fn interpolate_weeks(
    keyframes: &[WeekTemplate],
    total_weeks: u32,
    default_duration: f64,
    default_style: SessionStyle,
) -> Vec<WeekDefinition> {
    let mut resolved: Vec<(u32, &WeekTemplate)> = keyframes
        .iter()
        .map(|w| (w.position.resolve(total_weeks), w))
        .collect();
    resolved.sort_by_key(|(position, _)| *position);

    if resolved.is_empty() {
        return (1..=total_weeks)
            .map(|week| WeekDefinition::default_for(week, default_duration, default_style))
            .collect();
    }

    (1..=total_weeks)
        .map(|week| {
            let current = resolved
                .iter()
                .take_while(|(position, _)| *position <= week)
                .last()
                .unwrap_or(&resolved[0])
                .1;

            WeekDefinition {
                week_number: week,
                phase_name: current
                    .phase_name
                    .clone()
                    .unwrap_or_else(|| format!("Week {}", week)),
                focus: current.focus.clone().unwrap_or_else(|| DEFAULT_FOCUS.to_string()),
                description: current.description.clone(),
                power_multiplier: current.power_multiplier.unwrap_or(1.0),
                target_rpe: current.target_rpe.unwrap_or(DEFAULT_TARGET_RPE),
                duration_minutes: current.duration_minutes.unwrap_or(default_duration),
                work_rest_ratio: current
                    .work_rest_ratio
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WORK_REST.to_string()),
                session_style: current
                    .session_style
                    .as_deref()
                    .and_then(SessionStyle::parse)
                    .unwrap_or(default_style),
                block_name: None,
            }
        })
        .collect()
}

/// Repeat blocks in order until the program length is reached
pub fn expand_blocks(
    blocks: &[BlockTemplate],
    total_weeks: u32,
    default_duration: f64,
    default_style: SessionStyle,
) -> std::result::Result<Vec<WeekDefinition>, TemplateError> {
    for block in blocks {
        if block.week_count == 0 {
            return Err(TemplateError::InvalidBlock {
                block: block.name.clone(),
                reason: "weekCount must be at least 1".to_string(),
            });
        }
    }

    let mut weeks = Vec::with_capacity(total_weeks as usize);
    'outer: for block in blocks.iter().cycle() {
        for i in 0..block.week_count {
            let week_number = weeks.len() as u32 + 1;
            if week_number > total_weeks {
                break 'outer;
            }

            let power = block
                .power_progression
                .get(i as usize)
                .or(block.power_progression.last())
                .copied()
                .unwrap_or(1.0);

            weeks.push(WeekDefinition {
                week_number,
                phase_name: block.name.clone(),
                focus: block.focus.clone().unwrap_or_else(|| DEFAULT_FOCUS.to_string()),
                description: block.description.clone(),
                power_multiplier: power,
                target_rpe: block.target_rpe,
                duration_minutes: block.duration_minutes.unwrap_or(default_duration),
                work_rest_ratio: block
                    .work_rest_ratio
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WORK_REST.to_string()),
                session_style: block
                    .session_style
                    .as_deref()
                    .and_then(SessionStyle::parse)
                    .unwrap_or(default_style),
                block_name: Some(block.name.clone()),
            });
        }
    }

    Ok(weeks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyframe(position: &str, phase: &str, power: f64, rpe: f64) -> WeekTemplate {
        WeekTemplate {
            position: position.parse().unwrap(),
            phase_name: Some(phase.to_string()),
            power_multiplier: Some(power),
            target_rpe: Some(rpe),
            ..WeekTemplate::default()
        }
    }

    #[test]
    fn test_resolve_positions() {
        assert_eq!(WeekPosition::First.resolve(12), 1);
        assert_eq!(WeekPosition::Last.resolve(12), 12);
        assert_eq!(WeekPosition::Week(3).resolve(12), 3);
        assert_eq!(WeekPosition::Percent(0.0).resolve(12), 1);
        assert_eq!(WeekPosition::Percent(50.0).resolve(12), 7);
        assert_eq!(WeekPosition::Percent(100.0).resolve(12), 12);
        assert_eq!(WeekPosition::Percent(33.3333).resolve(12), 5);
        assert_eq!(WeekPosition::Percent(66.6666).resolve(12), 9);
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!("first".parse::<WeekPosition>().unwrap(), WeekPosition::First);
        assert_eq!("LAST".parse::<WeekPosition>().unwrap(), WeekPosition::Last);
        assert_eq!("25%".parse::<WeekPosition>().unwrap(), WeekPosition::Percent(25.0));
        assert_eq!("4".parse::<WeekPosition>().unwrap(), WeekPosition::Week(4));
        assert!("middle".parse::<WeekPosition>().is_err());
        assert!("150%".parse::<WeekPosition>().is_err());
    }

    #[test]
    fn test_stepped_interpolation_thirds() {
        let keyframes = vec![
            keyframe("0%", "Phase 1", 1.0, 5.0),
            keyframe("33.3333%", "Phase 2", 1.1, 6.0),
            keyframe("66.6666%", "Phase 3", 1.2, 7.0),
        ];

        let weeks = interpolate_weeks(&keyframes, 12, 20.0, SessionStyle::Interval);
        let phases: Vec<&str> = weeks.iter().map(|w| w.phase_name.as_str()).collect();
        assert_eq!(&phases[..4], &["Phase 1"; 4]);
        assert_eq!(&phases[4..8], &["Phase 2"; 4]);
        assert_eq!(&phases[8..], &["Phase 3"; 4]);
        assert_eq!(weeks[11].power_multiplier, 1.2);
        assert_eq!(weeks[0].duration_minutes, 20.0);
    }

    #[test]
    fn test_weeks_before_first_keyframe_use_first() {
        let keyframes = vec![keyframe("3", "Build", 1.1, 7.0), keyframe("last", "Test", 1.3, 9.0)];
        let weeks = interpolate_weeks(&keyframes, 6, 15.0, SessionStyle::Interval);

        assert_eq!(weeks[0].phase_name, "Build");
        assert_eq!(weeks[4].phase_name, "Build");
        assert_eq!(weeks[5].phase_name, "Test");
    }

    #[test]
    fn test_no_keyframes_yields_default_weeks() {
        let weeks = interpolate_weeks(&[], 4, 15.0, SessionStyle::SteadyState);
        assert_eq!(weeks.len(), 4);
        assert!(weeks.iter().all(|w| w.focus == "Volume" && w.target_rpe == 6.0));
        assert_eq!(weeks[2].phase_name, "Week 3");
        assert_eq!(weeks[0].session_style, SessionStyle::SteadyState);
    }

    #[test]
    fn test_program_weeks() {
        let mut template: ProgramTemplate = serde_json::from_str("{}").unwrap();
        assert_eq!(template.program_weeks(None), 8);
        assert_eq!(template.program_weeks(Some(10)), 10);

        template.week_config = WeekConfig {
            kind: Some(WeekConfigKind::Variable),
            fixed: None,
            range: Some(WeekRange { min: 6, max: 11, step: 1 }),
        };
        assert_eq!(template.program_weeks(None), 8);

        template.week_config.kind = Some(WeekConfigKind::Fixed);
        template.week_config.fixed = Some(12);
        assert_eq!(template.program_weeks(None), 12);
    }

    #[test]
    fn test_parse_template_document() {
        let json = r#"{
            "name": "Threshold Builder",
            "weekConfig": {"type": "fixed", "fixed": 6},
            "defaultSessionStyle": "steady-state",
            "defaultSessionDurationMinutes": 25,
            "weeks": [
                {"position": "first", "phaseName": "Base", "focus": "Volume", "powerMultiplier": 1.0, "targetRPE": 6, "workRestRatio": "2:1"},
                {"position": 4, "phaseName": "Recovery Week", "focus": "Recovery", "powerMultiplier": 0.8, "targetRPE": 4}
            ]
        }"#;

        let template = ProgramTemplate::from_json(json).unwrap();
        let weeks = template.resolve_weeks(template.program_weeks(None)).unwrap();

        assert_eq!(weeks.len(), 6);
        assert_eq!(weeks[2].work_rest_ratio, "2:1");
        assert_eq!(weeks[3].focus, "Recovery");
        assert_eq!(weeks[3].duration_minutes, 25.0);
        assert_eq!(weeks[5].session_style, SessionStyle::SteadyState);
    }

    #[test]
    fn test_invalid_week_fields_are_rejected() {
        let json = r#"{"weeks": [{"position": 1, "powerMultiplier": -1.0}]}"#;
        let template = ProgramTemplate::from_json(json).unwrap();
        let err = template.resolve_weeks(4).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidField { ref field, .. } if field == "powerMultiplier"));

        let json = r#"{"weeks": [{"position": 1, "targetRPE": 12}]}"#;
        let template = ProgramTemplate::from_json(json).unwrap();
        assert!(template.resolve_weeks(4).is_err());

        assert!(matches!(template.resolve_weeks(0), Err(TemplateError::NoWeeks)));
    }

    #[test]
    fn test_fractional_positions_round_to_weeks() {
        let json = r#"{"weeks": [
            {"position": 2.0, "phaseName": "Two"},
            {"position": 3.6, "phaseName": "Four"},
            {"position": -1.5, "phaseName": "One"}
        ]}"#;
        let template = ProgramTemplate::from_json(json).unwrap();
        let positions: Vec<WeekPosition> = template.weeks.iter().map(|w| w.position.clone()).collect();
        assert_eq!(
            positions,
            vec![WeekPosition::Week(2), WeekPosition::Week(4), WeekPosition::Week(1)]
        );
    }

    #[test]
    fn test_invalid_position_fails_parse() {
        let json = r#"{"weeks": [{"position": "sometime"}]}"#;
        assert!(ProgramTemplate::from_json(json).is_err());
    }

    #[test]
    fn test_block_expansion_repeats_blocks() {
        let blocks = vec![
            BlockTemplate {
                name: "Build".to_string(),
                focus: Some("Intensity".to_string()),
                description: None,
                week_count: 3,
                power_progression: vec![1.0, 1.05, 1.1],
                target_rpe: 7.0,
                duration_minutes: None,
                work_rest_ratio: None,
                session_style: None,
            },
            BlockTemplate {
                name: "Deload".to_string(),
                focus: Some("Recovery".to_string()),
                description: None,
                week_count: 1,
                power_progression: vec![0.8],
                target_rpe: 4.0,
                duration_minutes: Some(10.0),
                work_rest_ratio: None,
                session_style: Some("steady-state".to_string()),
            },
        ];

        let weeks = expand_blocks(&blocks, 10, 15.0, SessionStyle::Interval).unwrap();
        assert_eq!(weeks.len(), 10);
        assert_eq!(weeks[3].phase_name, "Deload");
        assert_eq!(weeks[3].session_style, SessionStyle::SteadyState);
        assert_eq!(weeks[6].power_multiplier, 1.1);
        assert_eq!(weeks[7].phase_name, "Deload");
        assert_eq!(weeks[9].power_multiplier, 1.05);
        assert_eq!(weeks[9].block_name.as_deref(), Some("Build"));
    }

    #[test]
    fn test_empty_block_is_rejected() {
        let blocks = vec![BlockTemplate {
            name: "Empty".to_string(),
            focus: None,
            description: None,
            week_count: 0,
            power_progression: vec![],
            target_rpe: 6.0,
            duration_minutes: None,
            work_rest_ratio: None,
            session_style: None,
        }];
        assert!(matches!(
            expand_blocks(&blocks, 4, 15.0, SessionStyle::Interval),
            Err(TemplateError::InvalidBlock { .. })
        ));
    }

    #[test]
    fn test_position_serializes_to_wire_form() {
        let week = keyframe("50%", "Mid", 1.0, 6.0);
        let json = serde_json::to_value(&week).unwrap();
        assert_eq!(json["position"], "50%");

        let week = WeekTemplate {
            position: WeekPosition::Week(2),
            ..WeekTemplate::default()
        };
        assert_eq!(serde_json::to_value(&week).unwrap()["position"], 2);
    }
}
