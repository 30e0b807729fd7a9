//! Modifier generation from analyzed weeks
//!
//! Weeks are grouped by cycle phase (ascending weeks additionally by their position in
//! the climb) and each group gets two tiers of rules from its mean percentile bands:
//! an extreme tier at P85/P15 and a moderate tier at P70/P30. Safety rules, compound
//! conditions, named-phase rules, session-style rules and global trend rules are added
//! around them.

use super::classify::WeekAnalysis;
use super::{ConditionLogic, FatigueModifier, ModifierAdjustments, ModifierCondition, Threshold};
use crate::models::{CyclePhase, PhasePosition, SessionStyle};
use crate::signal::{calculate_adaptive_windows, linear_fit, triangular_smooth, PercentileBand, EXTREMA_MARGIN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

pub const PRIORITY_OVERLOAD: u32 = 1;
pub const PRIORITY_READINESS_FLOOR: u32 = 2;
pub const PRIORITY_EXTREME: u32 = 10;
pub const PRIORITY_COMPOUND: u32 = 20;
pub const PRIORITY_MODERATE: u32 = 30;
pub const PRIORITY_NAMED_PHASE: u32 = 35;
pub const PRIORITY_SESSION_TYPE: u32 = 40;
pub const PRIORITY_TREND: u32 = 50;

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// Fatigue above which a deload always applies
    pub overload_fatigue: f64,

    /// Readiness below which recovery always applies
    pub readiness_floor: f64,

    /// Minimum distance between extreme and moderate thresholds
    pub min_tier_gap: f64,

    /// Total fatigue threshold shift across an ascending run
    pub ascending_shift: f64,

    /// Bands narrower than this produce no adaptive rules
    pub min_band_spread: f64,

    pub cusum_threshold: f64,
    pub extrema_margin: f64,

    /// Adaptation-score slope (points per week) that triggers trend rules
    pub trend_slope: f64,

    pub trend_rules: bool,
    pub session_type_rules: bool,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            overload_fatigue: 85.0,
            readiness_floor: 20.0,
            min_tier_gap: 3.0,
            ascending_shift: 15.0,
            min_band_spread: 1.0,
            cusum_threshold: 15.0,
            extrema_margin: EXTREMA_MARGIN,
            trend_slope: 0.5,
            trend_rules: true,
            session_type_rules: true,
        }
    }
}

/// Integer thresholds of one tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub fatigue_high: f64,
    pub fatigue_low: f64,
    pub readiness_high: f64,
    pub readiness_low: f64,
}

/// Moderate and extreme thresholds for a pair of bands
///
/// Fatigue thresholds are shifted by `shift`. Moderate thresholds stay at least `gap`
/// away from the scale ends so the extreme tier can always sit `gap` beyond them.
/// An extreme threshold is both stricter than its moderate one and farther from the
/// scale midpoint; a moderate threshold on the near side of 50 is mirrored across it.
pub fn tier_thresholds(
    fatigue: &PercentileBand,
    readiness: &PercentileBand,
    shift: f64,
    gap: f64,
) -> (TierThresholds, TierThresholds) {
    let inner = |v: f64| v.clamp(gap, 100.0 - gap).round();
    let above = |band_value: f64, moderate: f64| {
        band_value
            .max(moderate + gap)
            .max(100.0 - moderate + gap)
            .round()
            .min(100.0)
    };
    let below = |band_value: f64, moderate: f64| {
        band_value
            .min(moderate - gap)
            .min(100.0 - moderate - gap)
            .round()
            .max(0.0)
    };

    let moderate = TierThresholds {
        fatigue_high: inner(fatigue.p70 + shift),
        fatigue_low: inner(fatigue.p30 + shift),
        readiness_high: inner(readiness.p70),
        readiness_low: inner(readiness.p30),
    };
    let extreme = TierThresholds {
        fatigue_high: above(fatigue.p85 + shift, moderate.fatigue_high),
        fatigue_low: below(fatigue.p15 + shift, moderate.fatigue_low),
        readiness_high: above(readiness.p85, moderate.readiness_high),
        readiness_low: below(readiness.p15, moderate.readiness_low),
    };
    (moderate, extreme)
}

/// How hard back-off rules bite in each phase
fn backoff_scale(phase: CyclePhase) -> f64 {
    match phase {
        CyclePhase::Ascending => 1.0,
        CyclePhase::Peak => 1.2,
        CyclePhase::Descending => 0.8,
        CyclePhase::Trough => 0.6,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn scope_label(phase: CyclePhase, position: Option<PhasePosition>) -> String {
    match position {
        Some(position) => format!("{} {}", position, phase),
        None => phase.to_string(),
    }
}

fn adjust(power: Option<f64>, volume: Option<f64>, rest: Option<f64>, rpe: Option<f64>, message: String) -> ModifierAdjustments {
    ModifierAdjustments {
        power_multiplier: power.map(round2),
        rpe_adjust: rpe.map(round2),
        rest_multiplier: rest.map(round2),
        volume_multiplier: volume.map(round2),
        duration_multiplier: None,
        message: Some(message),
    }
}

/// Mean bands of a set of weeks
fn mean_bands<'a, I>(weeks: I) -> Option<(PercentileBand, PercentileBand, f64)>
where
    I: IntoIterator<Item = &'a WeekAnalysis>,
{
    let weeks: Vec<&WeekAnalysis> = weeks.into_iter().collect();
    let fatigue: Vec<PercentileBand> = weeks.iter().map(|w| w.fatigue).collect();
    let readiness: Vec<PercentileBand> = weeks.iter().map(|w| w.readiness).collect();
    let position = weeks.iter().map(|w| w.relative_position).sum::<f64>() / weeks.len().max(1) as f64;
    Some((PercentileBand::mean(&fatigue)?, PercentileBand::mean(&readiness)?, position))
}

/// Rule generator
#[derive(Debug, Clone, Default)]
pub struct ModifierGenerator {
    config: ModifierConfig,
}

impl ModifierGenerator {
    pub fn new(config: ModifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModifierConfig {
        &self.config
    }

    fn is_degenerate(&self, fatigue: &PercentileBand, readiness: &PercentileBand) -> bool {
        fatigue.spread() < self.config.min_band_spread && readiness.spread() < self.config.min_band_spread
    }

    /// Generate the full, deduplicated and priority-sorted rule set
    ///
    /// Returns an empty list when no group shows enough spread to warrant adaptive
    /// rules; the safety rules are only attached to a non-empty adaptive set.
    pub fn generate(&self, analyses: &[WeekAnalysis], block_based: bool) -> Vec<FatigueModifier> {
        let mut modifiers = self.phase_rules(analyses);
        if block_based {
            modifiers.extend(self.named_phase_rules(analyses));
        }
        if self.config.session_type_rules {
            modifiers.extend(self.session_type_rules(analyses));
        }
        if self.config.trend_rules {
            modifiers.extend(self.trend_rules(analyses));
        }

        if modifiers.is_empty() {
            debug!("No adaptive rules generated");
            return modifiers;
        }

        modifiers.extend(self.safety_rules());
        finalize(modifiers)
    }

    /// Overload ceiling and readiness floor
    pub fn safety_rules(&self) -> Vec<FatigueModifier> {
        vec![
            FatigueModifier::new(
                ModifierCondition::fatigue(Threshold::above(self.config.overload_fatigue)),
                adjust(
                    Some(0.8),
                    Some(0.6),
                    Some(1.5),
                    None,
                    "Overload: deload with reduced power and volume".to_string(),
                ),
                PRIORITY_OVERLOAD,
            ),
            FatigueModifier::new(
                ModifierCondition::readiness(Threshold::below(self.config.readiness_floor)),
                adjust(
                    Some(0.7),
                    Some(0.5),
                    None,
                    Some(-2.0),
                    "Readiness floor: take a recovery session".to_string(),
                ),
                PRIORITY_READINESS_FLOOR,
            ),
        ]
    }

    /// Two-tier rules plus compound conditions for every cycle-phase group
    pub fn phase_rules(&self, analyses: &[WeekAnalysis]) -> Vec<FatigueModifier> {
        let mut groups: BTreeMap<(CyclePhase, Option<PhasePosition>), Vec<&WeekAnalysis>> = BTreeMap::new();
        for week in analyses {
            let position = (week.cycle_phase == CyclePhase::Ascending).then_some(week.phase_position);
            groups.entry((week.cycle_phase, position)).or_default().push(week);
        }

        let mut modifiers = Vec::new();
        for ((phase, position), weeks) in groups {
            let Some((fatigue, readiness, mean_position)) = mean_bands(weeks.iter().copied()) else {
                continue;
            };
            if self.is_degenerate(&fatigue, &readiness) {
                continue;
            }

            let shift = if phase == CyclePhase::Ascending {
                (mean_position - 0.5) * self.config.ascending_shift
            } else {
                0.0
            };
            let (moderate, extreme) = tier_thresholds(&fatigue, &readiness, shift, self.config.min_tier_gap);
            let scale = backoff_scale(phase);
            let label = scope_label(phase, position);

            let scoped = |modifier: FatigueModifier| {
                let modifier = modifier.for_cycle_phase(phase);
                match position {
                    Some(position) => modifier.for_position(position),
                    None => modifier,
                }
            };

            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::fatigue(Threshold::above(extreme.fatigue_high)),
                adjust(
                    Some(1.0 - 0.15 * scale),
                    Some(1.0 - 0.2 * scale),
                    None,
                    None,
                    format!("{}: fatigue far above expected, cut power and volume", label),
                ),
                PRIORITY_EXTREME,
            )));
            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::readiness(Threshold::below(extreme.readiness_low)),
                adjust(
                    Some(1.0 - 0.1 * scale),
                    None,
                    Some(1.0 + 0.3 * scale),
                    None,
                    format!("{}: readiness far below expected, lengthen rest", label),
                ),
                PRIORITY_EXTREME + 1,
            )));
            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::both(
                    Threshold::above(moderate.fatigue_high),
                    Threshold::below(moderate.readiness_low),
                    ConditionLogic::And,
                ),
                adjust(
                    Some(1.0 - 0.12 * scale),
                    Some(1.0 - 0.15 * scale),
                    None,
                    None,
                    format!("{}: tired and under-recovered, reduce the session", label),
                ),
                PRIORITY_COMPOUND,
            )));
            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::both(
                    Threshold::above(extreme.fatigue_high),
                    Threshold::below(extreme.readiness_low),
                    ConditionLogic::Or,
                ),
                adjust(
                    None,
                    None,
                    None,
                    Some(-1.0),
                    format!("{}: either signal is extreme, lower target effort", label),
                ),
                PRIORITY_COMPOUND + 1,
            )));
            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::fatigue(Threshold::above(moderate.fatigue_high)),
                adjust(
                    Some(1.0 - 0.05 * scale),
                    None,
                    None,
                    None,
                    format!("{}: fatigue above expected, ease power", label),
                ),
                PRIORITY_MODERATE,
            )));
            modifiers.push(scoped(FatigueModifier::new(
                ModifierCondition::readiness(Threshold::below(moderate.readiness_low)),
                adjust(
                    None,
                    None,
                    Some(1.0 + 0.15 * scale),
                    None,
                    format!("{}: readiness below expected, add rest", label),
                ),
                PRIORITY_MODERATE + 1,
            )));

            // Recovery weeks stay easy regardless of how fresh the athlete feels
            if phase != CyclePhase::Trough {
                modifiers.push(scoped(FatigueModifier::new(
                    ModifierCondition::both(
                        Threshold::below(extreme.fatigue_low),
                        Threshold::above(extreme.readiness_high),
                        ConditionLogic::And,
                    ),
                    adjust(
                        Some(1.05),
                        None,
                        None,
                        Some(0.5),
                        format!("{}: unusually fresh, push harder", label),
                    ),
                    PRIORITY_EXTREME + 2,
                )));
                modifiers.push(scoped(FatigueModifier::new(
                    ModifierCondition::both(
                        Threshold::below(moderate.fatigue_low),
                        Threshold::above(moderate.readiness_high),
                        ConditionLogic::And,
                    ),
                    adjust(
                        Some(1.02),
                        None,
                        None,
                        None,
                        format!("{}: fresher than expected, nudge power up", label),
                    ),
                    PRIORITY_MODERATE + 2,
                )));
            }
        }
        modifiers
    }

    /// Moderate rules per named phase, for block programs
    pub fn named_phase_rules(&self, analyses: &[WeekAnalysis]) -> Vec<FatigueModifier> {
        let mut names: Vec<&str> = Vec::new();
        for week in analyses {
            if !names.contains(&week.phase_name.as_str()) {
                names.push(&week.phase_name);
            }
        }

        let mut modifiers = Vec::new();
        for name in names {
            let Some((fatigue, readiness, _)) = mean_bands(analyses.iter().filter(|w| w.phase_name == name)) else {
                continue;
            };
            if self.is_degenerate(&fatigue, &readiness) {
                continue;
            }
            let (moderate, _) = tier_thresholds(&fatigue, &readiness, 0.0, self.config.min_tier_gap);

            modifiers.push(
                FatigueModifier::new(
                    ModifierCondition::fatigue(Threshold::above(moderate.fatigue_high)),
                    adjust(
                        Some(0.95),
                        None,
                        None,
                        None,
                        format!("{}: fatigue above this block's norm", name),
                    ),
                    PRIORITY_NAMED_PHASE,
                )
                .for_phase_name(name),
            );
            modifiers.push(
                FatigueModifier::new(
                    ModifierCondition::readiness(Threshold::below(moderate.readiness_low)),
                    adjust(
                        None,
                        None,
                        Some(1.15),
                        None,
                        format!("{}: readiness below this block's norm", name),
                    ),
                    PRIORITY_NAMED_PHASE + 1,
                )
                .for_phase_name(name),
            );
        }
        modifiers
    }

    /// Style-specific fatigue rules when a program mixes session styles
    pub fn session_type_rules(&self, analyses: &[WeekAnalysis]) -> Vec<FatigueModifier> {
        let styles: HashSet<SessionStyle> = analyses.iter().map(|w| w.session_style).collect();
        if styles.len() < 2 {
            return Vec::new();
        }

        let mut modifiers = Vec::new();
        for (offset, style) in [SessionStyle::Interval, SessionStyle::SteadyState, SessionStyle::Custom]
            .into_iter()
            .enumerate()
        {
            if !styles.contains(&style) {
                continue;
            }
            let Some((fatigue, readiness, _)) = mean_bands(analyses.iter().filter(|w| w.session_style == style))
            else {
                continue;
            };
            if self.is_degenerate(&fatigue, &readiness) {
                continue;
            }
            let (moderate, _) = tier_thresholds(&fatigue, &readiness, 0.0, self.config.min_tier_gap);

            let mut adjustments = match style {
                SessionStyle::Interval => adjust(
                    Some(0.93),
                    None,
                    Some(1.2),
                    None,
                    "Intervals under fatigue: lower power, longer recoveries".to_string(),
                ),
                SessionStyle::SteadyState => adjust(
                    None,
                    None,
                    None,
                    None,
                    "Steady session under fatigue: shorten it".to_string(),
                ),
                SessionStyle::Custom => adjust(
                    None,
                    Some(0.9),
                    None,
                    None,
                    "Custom session under fatigue: trim volume".to_string(),
                ),
            };
            if style == SessionStyle::SteadyState {
                adjustments.duration_multiplier = Some(0.85);
            }

            modifiers.push(
                FatigueModifier::new(
                    ModifierCondition::fatigue(Threshold::above(moderate.fatigue_high)),
                    adjustments,
                    PRIORITY_SESSION_TYPE + offset as u32,
                )
                .for_session_type(style),
            );
        }
        modifiers
    }

    /// Slope of the smoothed adaptation score (readiness minus fatigue, per week)
    pub fn adaptation_slope(analyses: &[WeekAnalysis]) -> f64 {
        let score: Vec<f64> = analyses.iter().map(|w| w.readiness.p50 - w.fatigue.p50).collect();
        let windows = calculate_adaptive_windows(score.len());
        linear_fit(&triangular_smooth(&score, windows.meso)).0
    }

    /// Program-wide rules for steadily accumulating or steadily absorbed load
    pub fn trend_rules(&self, analyses: &[WeekAnalysis]) -> Vec<FatigueModifier> {
        if analyses.len() < 3 {
            return Vec::new();
        }
        let Some((fatigue, readiness, _)) = mean_bands(analyses) else {
            return Vec::new();
        };
        if self.is_degenerate(&fatigue, &readiness) {
            return Vec::new();
        }

        let slope = Self::adaptation_slope(analyses);
        debug!(slope, "Adaptation trend");

        if slope < -self.config.trend_slope {
            vec![FatigueModifier::new(
                ModifierCondition::both(
                    Threshold::above(fatigue.p50.round()),
                    Threshold::below(readiness.p50.round()),
                    ConditionLogic::And,
                ),
                adjust(
                    None,
                    Some(0.9),
                    None,
                    None,
                    "Fatigue is accumulating across the program, trim volume".to_string(),
                ),
                PRIORITY_TREND,
            )]
        } else if slope > self.config.trend_slope {
            vec![FatigueModifier::new(
                ModifierCondition::readiness(Threshold::above(readiness.p70.round())),
                adjust(
                    Some(1.03),
                    None,
                    None,
                    None,
                    "Load is being absorbed well, progress power".to_string(),
                ),
                PRIORITY_TREND + 1,
            )]
        } else {
            Vec::new()
        }
    }
}

/// Stable sort by priority, then drop rules with an already-seen condition and scope
pub fn finalize(mut modifiers: Vec<FatigueModifier>) -> Vec<FatigueModifier> {
    modifiers.sort_by_key(|m| m.priority);
    let mut seen = HashSet::new();
    modifiers.retain(|m| seen.insert(m.dedup_key()));
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(p15: f64, p30: f64, p50: f64, p70: f64, p85: f64) -> PercentileBand {
        PercentileBand { p15, p30, p50, p70, p85 }
    }

    fn analysis(week: u32, phase: CyclePhase, position: PhasePosition, relative: f64, fatigue_mid: f64) -> WeekAnalysis {
        WeekAnalysis {
            week_number: week,
            phase_name: format!("Week {}", week),
            power_multiplier: 1.0,
            work_capacity: 120.0,
            fatigue: band(fatigue_mid - 12.0, fatigue_mid - 6.0, fatigue_mid, fatigue_mid + 6.0, fatigue_mid + 12.0),
            readiness: band(
                88.0 - fatigue_mid,
                94.0 - fatigue_mid,
                100.0 - fatigue_mid,
                106.0 - fatigue_mid,
                112.0 - fatigue_mid,
            ),
            fatigue_velocity: 0.0,
            fatigue_acceleration: 0.0,
            cycle_phase: phase,
            cycle_index: 0,
            phase_position: position,
            relative_position: relative,
            is_local_peak: false,
            is_local_trough: false,
            is_change_point: false,
            session_style: SessionStyle::Interval,
        }
    }

    #[test]
    fn test_extreme_tier_kept_beyond_moderate() {
        let narrow = band(49.0, 49.5, 50.0, 50.5, 51.0);
        let (moderate, extreme) = tier_thresholds(&narrow, &narrow, 0.0, 3.0);

        assert_eq!(moderate.fatigue_high, 51.0);
        assert!(extreme.fatigue_high >= moderate.fatigue_high + 3.0);
        assert!(extreme.fatigue_low <= moderate.fatigue_low - 3.0);
        assert!(extreme.readiness_low <= moderate.readiness_low - 3.0);
        assert!(extreme.readiness_high >= moderate.readiness_high + 3.0);

        let high = band(90.0, 95.0, 98.0, 99.0, 100.0);
        let (moderate, extreme) = tier_thresholds(&high, &high, 0.0, 3.0);
        assert_eq!(moderate.fatigue_high, 97.0);
        assert_eq!(extreme.fatigue_high, 100.0);
    }

    #[test]
    fn test_extreme_tier_farther_from_midpoint() {
        // A light group: moderate back-off thresholds sit on the near side of 50
        let fatigue = band(20.0, 26.0, 30.0, 35.0, 40.0);
        let readiness = band(52.0, 58.0, 70.0, 74.0, 80.0);
        let (moderate, extreme) = tier_thresholds(&fatigue, &readiness, 0.0, 3.0);

        assert_eq!(moderate.fatigue_high, 35.0);
        assert_eq!(extreme.fatigue_high, 68.0);
        assert_eq!(moderate.readiness_low, 58.0);
        assert_eq!(extreme.readiness_low, 39.0);

        for (m, e) in [
            (moderate.fatigue_high, extreme.fatigue_high),
            (moderate.fatigue_low, extreme.fatigue_low),
            (moderate.readiness_high, extreme.readiness_high),
            (moderate.readiness_low, extreme.readiness_low),
        ] {
            assert!((e - 50.0).abs() > (m - 50.0).abs(), "moderate {} extreme {}", m, e);
        }
        assert!(extreme.fatigue_high > moderate.fatigue_high);
        assert!(extreme.readiness_low < moderate.readiness_low);
        assert!(extreme.fatigue_low < moderate.fatigue_low);
        assert!(extreme.readiness_high > moderate.readiness_high);
    }

    #[test]
    fn test_thresholds_are_integers() {
        let b = band(12.3, 25.6, 40.1, 55.5, 68.9);
        let (moderate, extreme) = tier_thresholds(&b, &b, 2.4, 3.0);
        for v in [
            moderate.fatigue_high,
            moderate.fatigue_low,
            extreme.fatigue_high,
            extreme.readiness_low,
        ] {
            assert_eq!(v, v.round());
        }
    }

    #[test]
    fn test_ascending_positions_shift_thresholds() {
        let analyses = vec![
            analysis(1, CyclePhase::Ascending, PhasePosition::Early, 0.0, 40.0),
            analysis(2, CyclePhase::Ascending, PhasePosition::Late, 1.0, 40.0),
        ];
        let generator = ModifierGenerator::default();
        let rules = generator.phase_rules(&analyses);

        let moderate_fatigue = |position: PhasePosition| {
            rules
                .iter()
                .find(|m| {
                    m.phase_position == Some(position)
                        && m.priority == PRIORITY_MODERATE
                        && m.condition.readiness.is_none()
                })
                .and_then(|m| m.condition.fatigue)
                .map(|t| t.value)
                .unwrap()
        };

        // p70 = 46; early shifts by -7.5, late by +7.5
        assert_eq!(moderate_fatigue(PhasePosition::Early), 39.0);
        assert_eq!(moderate_fatigue(PhasePosition::Late), 54.0);
    }

    #[test]
    fn test_generate_orders_by_priority_and_includes_safety_rules() {
        let analyses = vec![
            analysis(1, CyclePhase::Ascending, PhasePosition::Early, 0.0, 30.0),
            analysis(2, CyclePhase::Ascending, PhasePosition::Mid, 0.5, 40.0),
            analysis(3, CyclePhase::Peak, PhasePosition::Mid, 0.5, 60.0),
            analysis(4, CyclePhase::Trough, PhasePosition::Mid, 0.5, 25.0),
        ];
        let modifiers = ModifierGenerator::default().generate(&analyses, false);

        assert_eq!(modifiers[0].priority, PRIORITY_OVERLOAD);
        assert_eq!(modifiers[1].priority, PRIORITY_READINESS_FLOOR);
        assert!(modifiers.windows(2).all(|w| w[0].priority <= w[1].priority));

        let keys: HashSet<String> = modifiers.iter().map(|m| m.dedup_key()).collect();
        assert_eq!(keys.len(), modifiers.len());

        // No push rules for recovery weeks
        assert!(!modifiers.iter().any(|m| m.cycle_phase == Some(CyclePhase::Trough)
            && m.adjustments.power_multiplier.is_some_and(|p| p > 1.0)));
    }

    #[test]
    fn test_flat_bands_generate_nothing() {
        let mut week = analysis(1, CyclePhase::Ascending, PhasePosition::Mid, 0.5, 40.0);
        week.fatigue = band(40.0, 40.0, 40.0, 40.0, 40.0);
        week.readiness = band(60.0, 60.0, 60.0, 60.0, 60.0);

        let modifiers = ModifierGenerator::default().generate(&[week.clone(), week], true);
        assert!(modifiers.is_empty());
    }

    #[test]
    fn test_named_phase_rules_for_blocks() {
        let mut a = analysis(1, CyclePhase::Ascending, PhasePosition::Early, 0.0, 40.0);
        a.phase_name = "Build".to_string();
        let mut b = analysis(2, CyclePhase::Trough, PhasePosition::Mid, 0.5, 20.0);
        b.phase_name = "Deload".to_string();

        let rules = ModifierGenerator::default().named_phase_rules(&[a, b]);
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].phase_name.as_deref(), Some("Build"));
        assert_eq!(rules[2].phase_name.as_deref(), Some("Deload"));
    }

    #[test]
    fn test_session_type_rules_only_for_mixed_programs() {
        let a = analysis(1, CyclePhase::Ascending, PhasePosition::Early, 0.0, 40.0);
        let mut b = analysis(2, CyclePhase::Ascending, PhasePosition::Late, 1.0, 50.0);
        let generator = ModifierGenerator::default();

        assert!(generator.session_type_rules(&[a.clone(), b.clone()]).is_empty());

        b.session_style = SessionStyle::SteadyState;
        let rules = generator.session_type_rules(&[a, b]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].session_type, Some(SessionStyle::SteadyState));
        assert_eq!(rules[1].adjustments.duration_multiplier, Some(0.85));
    }

    #[test]
    fn test_trend_rules_follow_adaptation_slope() {
        let rising: Vec<WeekAnalysis> = (0..6)
            .map(|i| analysis(i + 1, CyclePhase::Ascending, PhasePosition::Mid, 0.5, 30.0 + 8.0 * i as f64))
            .collect();
        let rules = ModifierGenerator::default().trend_rules(&rising);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].priority, PRIORITY_TREND);

        let falling: Vec<WeekAnalysis> = (0..6)
            .map(|i| analysis(i + 1, CyclePhase::Descending, PhasePosition::Mid, 0.5, 70.0 - 8.0 * i as f64))
            .collect();
        let rules = ModifierGenerator::default().trend_rules(&falling);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].priority, PRIORITY_TREND + 1);
    }

    #[test]
    fn test_finalize_dedups_keeping_lowest_priority() {
        let condition = ModifierCondition::fatigue(Threshold::above(70.0));
        let modifiers = vec![
            FatigueModifier::new(condition.clone(), ModifierAdjustments::default(), 30),
            FatigueModifier::new(condition.clone(), ModifierAdjustments::default(), 10),
            FatigueModifier::new(condition, ModifierAdjustments::default(), 20).for_cycle_phase(CyclePhase::Peak),
        ];
        let result = finalize(modifiers);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].priority, 10);
        assert_eq!(result[1].priority, 20);
    }
}
