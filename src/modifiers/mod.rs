//! Fatigue modifiers: adaptive rules that adjust prescribed training
//!
//! A modifier pairs a threshold condition on fatigue and/or readiness with a set of
//! multiplicative or additive adjustments, optionally scoped to a cycle phase, a named
//! program phase, a position within a phase or a session style. Lower priority wins.

pub mod classify;
pub mod generate;

pub use classify::{analyze_weeks, classify_weeks, WeekAnalysis};
pub use generate::{ModifierConfig, ModifierGenerator};

use crate::error::{LoadCycleError, Result, TemplateError};
use crate::models::{CyclePhase, PhasePosition, SessionStyle};
use crate::simulation::{CancellationToken, MonteCarloSimulator, SimulationResult};
use crate::template::{ProgramTemplate, WeekDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

/// Threshold comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Above,
    AtLeast,
    Below,
    AtMost,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Above => ">",
            Comparison::AtLeast => ">=",
            Comparison::Below => "<",
            Comparison::AtMost => "<=",
        }
    }
}

/// Threshold on a 0-100 score, written as `">70"` or `"<=35"`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Threshold {
    pub comparison: Comparison,
    pub value: f64,
}

impl Threshold {
    pub fn above(value: f64) -> Self {
        Self {
            comparison: Comparison::Above,
            value,
        }
    }

    pub fn below(value: f64) -> Self {
        Self {
            comparison: Comparison::Below,
            value,
        }
    }

    pub fn matches(&self, score: f64) -> bool {
        match self.comparison {
            Comparison::Above => score > self.value,
            Comparison::AtLeast => score >= self.value,
            Comparison::Below => score < self.value,
            Comparison::AtMost => score <= self.value,
        }
    }
}

impl FromStr for Threshold {
    type Err = TemplateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || TemplateError::InvalidCondition {
            condition: s.to_string(),
        };

        let (comparison, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (Comparison::AtLeast, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (Comparison::AtMost, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (Comparison::Above, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (Comparison::Below, rest)
        } else {
            return Err(invalid());
        };

        let value: f64 = rest.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        Ok(Self { comparison, value })
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparison.symbol(), self.value)
    }
}

impl TryFrom<String> for Threshold {
    type Error = TemplateError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Threshold> for String {
    fn from(threshold: Threshold) -> Self {
        threshold.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

/// Normalized modifier condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct ModifierCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatigue: Option<Threshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Threshold>,
    pub logic: ConditionLogic,
}

impl ModifierCondition {
    pub fn fatigue(threshold: Threshold) -> Self {
        Self {
            fatigue: Some(threshold),
            readiness: None,
            logic: ConditionLogic::And,
        }
    }

    pub fn readiness(threshold: Threshold) -> Self {
        Self {
            fatigue: None,
            readiness: Some(threshold),
            logic: ConditionLogic::And,
        }
    }

    pub fn both(fatigue: Threshold, readiness: Threshold, logic: ConditionLogic) -> Self {
        Self {
            fatigue: Some(fatigue),
            readiness: Some(readiness),
            logic,
        }
    }

    /// Map a legacy named condition onto its structured form
    pub fn from_legacy(name: &str) -> std::result::Result<Self, TemplateError> {
        match name.trim().to_lowercase().as_str() {
            "high_fatigue" => Ok(Self::fatigue(Threshold::above(70.0))),
            "low_fatigue" => Ok(Self::fatigue(Threshold::below(30.0))),
            "high_readiness" => Ok(Self::readiness(Threshold::above(70.0))),
            "low_readiness" => Ok(Self::readiness(Threshold::below(30.0))),
            _ => Err(TemplateError::InvalidCondition {
                condition: name.to_string(),
            }),
        }
    }

    pub fn matches(&self, fatigue: f64, readiness: f64) -> bool {
        let fatigue_hit = self.fatigue.map(|t| t.matches(fatigue));
        let readiness_hit = self.readiness.map(|t| t.matches(readiness));
        match (fatigue_hit, readiness_hit) {
            (Some(f), Some(r)) => match self.logic {
                ConditionLogic::And => f && r,
                ConditionLogic::Or => f || r,
            },
            (Some(f), None) => f,
            (None, Some(r)) => r,
            (None, None) => false,
        }
    }

    /// Canonical text used for duplicate detection
    pub fn key(&self) -> String {
        let side = |t: Option<Threshold>| t.map(|t| t.to_string()).unwrap_or_default();
        format!("{}|{}|{:?}", side(self.fatigue), side(self.readiness), self.logic)
    }
}

impl fmt::Display for ModifierCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.fatigue, self.readiness) {
            (Some(fat), Some(ready)) => {
                let joiner = match self.logic {
                    ConditionLogic::And => "and",
                    ConditionLogic::Or => "or",
                };
                write!(f, "fatigue {} {} readiness {}", fat, joiner, ready)
            }
            (Some(fat), None) => write!(f, "fatigue {}", fat),
            (None, Some(ready)) => write!(f, "readiness {}", ready),
            (None, None) => f.write_str("never"),
        }
    }
}

/// Condition as it may appear in a template document
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCondition {
    Legacy(String),
    Structured {
        #[serde(default)]
        fatigue: Option<String>,
        #[serde(default)]
        readiness: Option<String>,
        #[serde(default)]
        logic: Option<ConditionLogic>,
    },
}

impl TryFrom<RawCondition> for ModifierCondition {
    type Error = TemplateError;

    fn try_from(raw: RawCondition) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawCondition::Legacy(name) => ModifierCondition::from_legacy(&name),
            RawCondition::Structured {
                fatigue,
                readiness,
                logic,
            } => {
                if fatigue.is_none() && readiness.is_none() {
                    return Err(TemplateError::InvalidCondition {
                        condition: "condition has neither fatigue nor readiness".to_string(),
                    });
                }
                Ok(ModifierCondition {
                    fatigue: fatigue.as_deref().map(Threshold::from_str).transpose()?,
                    readiness: readiness.as_deref().map(Threshold::from_str).transpose()?,
                    logic: logic.unwrap_or_default(),
                })
            }
        }
    }
}

/// Adjustments applied when a modifier fires
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierAdjustments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe_adjust: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ModifierAdjustments {
    pub fn is_empty(&self) -> bool {
        self.power_multiplier.is_none()
            && self.rpe_adjust.is_none()
            && self.rest_multiplier.is_none()
            && self.volume_multiplier.is_none()
            && self.duration_multiplier.is_none()
    }

    /// Whether the adjustments reduce training stress
    pub fn is_reduction(&self) -> bool {
        self.power_multiplier.is_some_and(|m| m < 1.0)
            || self.volume_multiplier.is_some_and(|m| m < 1.0)
            || self.duration_multiplier.is_some_and(|m| m < 1.0)
            || self.rpe_adjust.is_some_and(|a| a < 0.0)
            || self.rest_multiplier.is_some_and(|m| m > 1.0)
    }
}

/// Adaptive training rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueModifier {
    pub condition: ModifierCondition,
    pub adjustments: ModifierAdjustments,

    /// Lower values win when several modifiers match
    pub priority: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_phase: Option<CyclePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_position: Option<PhasePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionStyle>,
}

impl FatigueModifier {
    pub fn new(condition: ModifierCondition, adjustments: ModifierAdjustments, priority: u32) -> Self {
        Self {
            condition,
            adjustments,
            priority,
            cycle_phase: None,
            phase_name: None,
            phase_position: None,
            session_type: None,
        }
    }

    pub fn for_cycle_phase(mut self, phase: CyclePhase) -> Self {
        self.cycle_phase = Some(phase);
        self
    }

    pub fn for_phase_name(mut self, name: impl Into<String>) -> Self {
        self.phase_name = Some(name.into());
        self
    }

    pub fn for_position(mut self, position: PhasePosition) -> Self {
        self.phase_position = Some(position);
        self
    }

    pub fn for_session_type(mut self, style: SessionStyle) -> Self {
        self.session_type = Some(style);
        self
    }

    /// Every scoped field must match the context; unscoped fields match anything
    pub fn applies_to(&self, context: &DayContext) -> bool {
        fn scoped<T: PartialEq>(rule: &Option<T>, actual: &Option<T>) -> bool {
            rule.as_ref().map_or(true, |r| actual.as_ref() == Some(r))
        }

        let name_matches = match (&self.phase_name, &context.phase_name) {
            (None, _) => true,
            (Some(rule), Some(actual)) => rule.eq_ignore_ascii_case(actual),
            (Some(_), None) => false,
        };

        name_matches
            && scoped(&self.cycle_phase, &context.cycle_phase)
            && scoped(&self.phase_position, &context.phase_position)
            && scoped(&self.session_type, &context.session_type)
    }

    pub fn matches(&self, context: &DayContext) -> bool {
        self.applies_to(context) && self.condition.matches(context.fatigue, context.readiness)
    }

    /// Condition plus scope, used to drop duplicate rules
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{:?}|{}|{:?}|{:?}",
            self.condition.key(),
            self.cycle_phase,
            self.phase_name.as_deref().unwrap_or("").to_lowercase(),
            self.phase_position,
            self.session_type
        )
    }
}

/// Situation a modifier is resolved against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayContext {
    pub fatigue: f64,
    pub readiness: f64,
    pub cycle_phase: Option<CyclePhase>,
    pub phase_name: Option<String>,
    pub phase_position: Option<PhasePosition>,
    pub session_type: Option<SessionStyle>,
}

impl DayContext {
    pub fn new(fatigue: f64, readiness: f64) -> Self {
        Self {
            fatigue,
            readiness,
            ..Self::default()
        }
    }
}

/// Matching modifier with the lowest priority; ties go to the earlier one
pub fn resolve_modifier<'a>(modifiers: &'a [FatigueModifier], context: &DayContext) -> Option<&'a FatigueModifier> {
    modifiers
        .iter()
        .filter(|m| m.matches(context))
        .min_by_key(|m| m.priority)
}

/// Parse a JSON array of modifiers, accepting legacy condition strings
pub fn modifiers_from_json(json: &str) -> Result<Vec<FatigueModifier>> {
    Ok(serde_json::from_str(json)?)
}

pub fn modifiers_to_json(modifiers: &[FatigueModifier]) -> Result<String> {
    serde_json::to_string_pretty(modifiers).map_err(LoadCycleError::from)
}

/// Outcome of a suggestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Generated,
    /// The simulation produced no adaptive rules
    Balanced,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierSuggestion {
    pub status: SuggestionStatus,
    pub modifiers: Vec<FatigueModifier>,
    pub weeks: Vec<WeekAnalysis>,
    pub notice: Option<String>,
    pub run_id: Option<Uuid>,
}

impl ModifierSuggestion {
    pub fn failed(error: &LoadCycleError) -> Self {
        Self {
            status: SuggestionStatus::Failed,
            modifiers: Vec::new(),
            weeks: Vec::new(),
            notice: Some(error.user_message()),
            run_id: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == SuggestionStatus::Failed
    }
}

/// Template → simulation → analysis → modifiers
#[derive(Debug, Clone, Default)]
pub struct ModifierEngine {
    simulator: MonteCarloSimulator,
    generator: ModifierGenerator,
}

impl ModifierEngine {
    pub fn new(simulator: MonteCarloSimulator, generator: ModifierGenerator) -> Self {
        Self { simulator, generator }
    }

    pub fn simulator(&self) -> &MonteCarloSimulator {
        &self.simulator
    }

    /// Resolve and validate the weeks of a template
    pub fn prepare(&self, template: &ProgramTemplate, weeks_override: Option<u32>) -> Result<Vec<WeekDefinition>> {
        let total = template.program_weeks(weeks_override);
        Ok(template.resolve_weeks(total)?)
    }

    /// Run the full pipeline; every failure becomes a `Failed` suggestion
    pub fn suggest(&self, template: &ProgramTemplate, weeks_override: Option<u32>) -> ModifierSuggestion {
        self.suggest_with_progress(template, weeks_override, &CancellationToken::new(), |_| {})
    }

    pub fn suggest_with_progress<F>(
        &self,
        template: &ProgramTemplate,
        weeks_override: Option<u32>,
        token: &CancellationToken,
        progress: F,
    ) -> ModifierSuggestion
    where
        F: Fn(u8) + Sync,
    {
        let outcome = self.prepare(template, weeks_override).and_then(|weeks| {
            let simulation = self.simulator.run_with_progress(&weeks, token, progress)?;
            Ok(self.suggest_from_simulation(template, &weeks, &simulation))
        });

        match outcome {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!(template = %template.name, "Modifier suggestion failed: {}", e);
                ModifierSuggestion::failed(&e)
            }
        }
    }

    /// Analyze a finished simulation and generate modifiers for it
    pub fn suggest_from_simulation(
        &self,
        template: &ProgramTemplate,
        weeks: &[WeekDefinition],
        simulation: &SimulationResult,
    ) -> ModifierSuggestion {
        let analyses = analyze_weeks(weeks, simulation, self.generator.config());
        let modifiers = self.generator.generate(&analyses, template.is_block_based());

        let (status, notice) = if modifiers.is_empty() {
            (
                SuggestionStatus::Balanced,
                Some("Simulated fatigue and readiness stay within a narrow band; no adaptive rules needed".to_string()),
            )
        } else {
            (SuggestionStatus::Generated, None)
        };

        info!(
            run_id = %simulation.run_id,
            modifiers = modifiers.len(),
            status = ?status,
            "Generated modifier suggestions"
        );

        ModifierSuggestion {
            status,
            modifiers,
            weeks: analyses,
            notice,
            run_id: Some(simulation.run_id),
        }
    }
}

/// Copy of the template carrying the given modifiers
pub fn apply_to_template(template: &ProgramTemplate, modifiers: &[FatigueModifier]) -> ProgramTemplate {
    let mut updated = template.clone();
    updated.fatigue_modifiers = modifiers.to_vec();
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier(condition: ModifierCondition, priority: u32) -> FatigueModifier {
        FatigueModifier::new(
            condition,
            ModifierAdjustments {
                power_multiplier: Some(0.9),
                ..ModifierAdjustments::default()
            },
            priority,
        )
    }

    #[test]
    fn test_threshold_parse_and_display() {
        let t: Threshold = ">70".parse().unwrap();
        assert_eq!(t, Threshold::above(70.0));
        assert_eq!(t.to_string(), ">70");
        assert_eq!("<= 35".parse::<Threshold>().unwrap().comparison, Comparison::AtMost);
        assert!("70".parse::<Threshold>().is_err());
        assert!(">abc".parse::<Threshold>().is_err());
    }

    #[test]
    fn test_lowest_priority_wins() {
        let modifiers = vec![
            modifier(ModifierCondition::readiness(Threshold::below(30.0)), 5),
            modifier(ModifierCondition::fatigue(Threshold::above(85.0)), 1),
        ];
        let context = DayContext::new(90.0, 20.0);

        let resolved = resolve_modifier(&modifiers, &context).unwrap();
        assert_eq!(resolved.priority, 1);
    }

    #[test]
    fn test_priority_ties_go_to_first() {
        let first = modifier(ModifierCondition::fatigue(Threshold::above(50.0)), 3);
        let mut second = modifier(ModifierCondition::fatigue(Threshold::above(60.0)), 3);
        second.adjustments.power_multiplier = Some(0.5);
        let modifiers = vec![first.clone(), second];

        let resolved = resolve_modifier(&modifiers, &DayContext::new(80.0, 40.0)).unwrap();
        assert_eq!(resolved, &first);
    }

    #[test]
    fn test_no_match_resolves_to_none() {
        let modifiers = vec![modifier(ModifierCondition::fatigue(Threshold::above(85.0)), 1)];
        assert!(resolve_modifier(&modifiers, &DayContext::new(40.0, 60.0)).is_none());
    }

    #[test]
    fn test_scoped_modifier_requires_matching_context() {
        let modifiers = vec![modifier(ModifierCondition::fatigue(Threshold::above(60.0)), 1)
            .for_cycle_phase(CyclePhase::Peak)
            .for_phase_name("Race Prep")];

        let mut context = DayContext::new(70.0, 40.0);
        assert!(resolve_modifier(&modifiers, &context).is_none());

        context.cycle_phase = Some(CyclePhase::Peak);
        context.phase_name = Some("race prep".to_string());
        assert!(resolve_modifier(&modifiers, &context).is_some());

        context.cycle_phase = Some(CyclePhase::Trough);
        assert!(resolve_modifier(&modifiers, &context).is_none());
    }

    #[test]
    fn test_condition_logic() {
        let and = ModifierCondition::both(Threshold::above(70.0), Threshold::below(30.0), ConditionLogic::And);
        let or = ModifierCondition::both(Threshold::above(70.0), Threshold::below(30.0), ConditionLogic::Or);

        assert!(and.matches(75.0, 25.0));
        assert!(!and.matches(75.0, 50.0));
        assert!(or.matches(75.0, 50.0));
        assert!(!or.matches(50.0, 50.0));
    }

    #[test]
    fn test_legacy_conditions_normalize() {
        let json = r#"[
            {"condition": "high_fatigue", "adjustments": {"powerMultiplier": 0.9}, "priority": 3},
            {"condition": {"readiness": "<35"}, "adjustments": {"restMultiplier": 1.2}, "priority": 4, "cyclePhase": "peak"}
        ]"#;
        let modifiers = modifiers_from_json(json).unwrap();

        assert_eq!(modifiers[0].condition, ModifierCondition::fatigue(Threshold::above(70.0)));
        assert_eq!(modifiers[1].condition.readiness, Some(Threshold::below(35.0)));
        assert_eq!(modifiers[1].cycle_phase, Some(CyclePhase::Peak));

        assert!(modifiers_from_json(r#"[{"condition": "sometimes", "adjustments": {}, "priority": 1}]"#).is_err());
    }

    #[test]
    fn test_modifier_json_uses_threshold_strings() {
        let m = modifier(
            ModifierCondition::both(Threshold::above(72.0), Threshold::below(28.0), ConditionLogic::Or),
            20,
        )
        .for_position(PhasePosition::Late);
        let json = serde_json::to_value(&m).unwrap();

        assert_eq!(json["condition"]["fatigue"], ">72");
        assert_eq!(json["condition"]["readiness"], "<28");
        assert_eq!(json["condition"]["logic"], "or");
        assert_eq!(json["adjustments"]["powerMultiplier"], 0.9);
        assert_eq!(json["phasePosition"], "late");
        assert!(json.get("cyclePhase").is_none());

        let parsed: FatigueModifier = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn test_failed_suggestion_for_malformed_template() {
        let template = ProgramTemplate::from_json(r#"{"weeks": [{"position": 1, "targetRPE": 15}]}"#).unwrap();
        let engine = ModifierEngine::default();
        let suggestion = engine.suggest(&template, Some(4));

        assert_eq!(suggestion.status, SuggestionStatus::Failed);
        assert!(suggestion.modifiers.is_empty());
        assert!(suggestion.notice.is_some());
    }

    #[test]
    fn test_cancelled_suggestion_fails_cleanly() {
        let template = ProgramTemplate::from_json("{}").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let suggestion = ModifierEngine::default().suggest_with_progress(&template, Some(4), &token, |_| {});

        assert!(suggestion.is_failed());
        assert!(suggestion.modifiers.is_empty());
    }

    #[test]
    fn test_apply_to_template_embeds_modifiers() {
        let template = ProgramTemplate::from_json(r#"{"name": "Base"}"#).unwrap();
        let modifiers = vec![modifier(ModifierCondition::fatigue(Threshold::above(80.0)), 1)];
        let updated = apply_to_template(&template, &modifiers);

        let json = updated.to_json_pretty().unwrap();
        let reparsed = ProgramTemplate::from_json(&json).unwrap();
        assert_eq!(reparsed.fatigue_modifiers, modifiers);
    }
}
