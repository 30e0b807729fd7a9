use chrono::{Days, NaiveDate};
use loadcycle::fatigue::{power_series, score_series};
use loadcycle::modifiers::generate::{PRIORITY_EXTREME, PRIORITY_MODERATE};
use loadcycle::modifiers::{resolve_modifier, DayContext, FatigueModifier, SuggestionStatus};
use loadcycle::{
    CyclePhase, EngineConfig, ModifierEngine, MonteCarloSimulator, PhaseDetector, ProgramTemplate,
    QuestionnaireResponse, Session, SimulationConfig,
};

/// Integration tests that run the complete pipelines

const TWELVE_WEEK_PROGRAM: &str = r#"{
    "name": "Twelve Week Build",
    "weekConfig": {"type": "fixed", "fixed": 12},
    "defaultSessionDurationMinutes": 20,
    "weeks": [
        {"position": "first", "phaseName": "Base", "focus": "Volume", "powerMultiplier": 0.9, "targetRPE": 5},
        {"position": 3, "phaseName": "Build", "focus": "Intensity", "powerMultiplier": 1.05, "targetRPE": 7},
        {"position": 4, "phaseName": "Recovery", "focus": "Recovery", "powerMultiplier": 0.75, "targetRPE": 4},
        {"position": 5, "phaseName": "Build", "focus": "Intensity", "powerMultiplier": 1.1, "targetRPE": 7},
        {"position": 7, "phaseName": "Overreach", "focus": "Intensity", "powerMultiplier": 1.2, "targetRPE": 8},
        {"position": 8, "phaseName": "Recovery", "focus": "Recovery", "powerMultiplier": 0.75, "targetRPE": 4},
        {"position": 9, "phaseName": "Peak", "focus": "Intensity", "powerMultiplier": 1.25, "targetRPE": 9},
        {"position": "last", "phaseName": "Taper", "focus": "Recovery", "powerMultiplier": 0.7, "targetRPE": 4}
    ]
}"#;

fn date(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
}

fn engine(iterations: usize) -> ModifierEngine {
    let mut config = EngineConfig::default();
    config.simulation.iterations = iterations;
    config.simulation.seed = Some(42);
    config.modifier_engine()
}

fn single_condition_threshold(modifiers: &[FatigueModifier], scope: &FatigueModifier, priority: u32) -> Option<(Option<f64>, Option<f64>)> {
    modifiers
        .iter()
        .find(|m| {
            m.priority == priority
                && m.cycle_phase == scope.cycle_phase
                && m.phase_position == scope.phase_position
        })
        .map(|m| (m.condition.fatigue.map(|t| t.value), m.condition.readiness.map(|t| t.value)))
}

#[test]
fn test_twelve_week_program_without_sessions() {
    let template = ProgramTemplate::from_json(TWELVE_WEEK_PROGRAM).unwrap();
    let suggestion = engine(100_000).suggest(&template, None);

    assert_eq!(suggestion.status, SuggestionStatus::Generated);
    assert_eq!(suggestion.weeks.len(), 12);
    let modifiers = &suggestion.modifiers;

    assert!(modifiers.iter().any(|m| m.condition.fatigue.is_some()));
    assert!(modifiers.iter().any(|m| m.condition.readiness.is_some()));

    // Ordered by severity: safety rules first, then extreme, compound and moderate tiers
    assert!(modifiers.windows(2).all(|w| w[0].priority <= w[1].priority));
    assert_eq!(modifiers[0].priority, 1);

    let extremes: Vec<&FatigueModifier> = modifiers
        .iter()
        .filter(|m| m.priority == PRIORITY_EXTREME && m.cycle_phase.is_some())
        .collect();
    assert!(!extremes.is_empty());

    // Extreme tiers are stricter than moderate ones and farther from the midpoint
    for extreme in extremes {
        let (Some(extreme_fatigue), _) = single_condition_threshold(modifiers, extreme, PRIORITY_EXTREME).unwrap() else {
            panic!("extreme fatigue rule without a fatigue condition");
        };
        let (Some(moderate_fatigue), _) = single_condition_threshold(modifiers, extreme, PRIORITY_MODERATE).unwrap() else {
            panic!("moderate fatigue rule without a fatigue condition");
        };
        assert!(extreme_fatigue > moderate_fatigue);
        assert!((extreme_fatigue - 50.0).abs() > (moderate_fatigue - 50.0).abs());

        let (_, Some(extreme_readiness)) = single_condition_threshold(modifiers, extreme, PRIORITY_EXTREME + 1).unwrap() else {
            panic!("extreme readiness rule without a readiness condition");
        };
        let (_, Some(moderate_readiness)) = single_condition_threshold(modifiers, extreme, PRIORITY_MODERATE + 1).unwrap() else {
            panic!("moderate readiness rule without a readiness condition");
        };
        assert!(extreme_readiness < moderate_readiness);
        assert!((extreme_readiness - 50.0).abs() > (moderate_readiness - 50.0).abs());
    }

    // Every threshold is an integer on the 0-100 scale
    for m in modifiers {
        for t in m.condition.fatigue.iter().chain(m.condition.readiness.iter()) {
            assert_eq!(t.value, t.value.round());
            assert!((0.0..=100.0).contains(&t.value));
        }
    }
}

#[test]
fn test_recovery_weeks_are_classified_as_troughs() {
    let template = ProgramTemplate::from_json(TWELVE_WEEK_PROGRAM).unwrap();
    let suggestion = engine(2_000).suggest(&template, None);

    assert_eq!(suggestion.weeks[3].cycle_phase, CyclePhase::Trough);
    assert_eq!(suggestion.weeks[7].cycle_phase, CyclePhase::Trough);
    assert_eq!(suggestion.weeks[0].cycle_phase, CyclePhase::Ascending);
    for week in &suggestion.weeks {
        assert!(week.fatigue.is_ordered());
        assert!(week.readiness.is_ordered());
    }
}

#[test]
fn test_invalid_template_fails_without_modifiers() {
    let template = ProgramTemplate::from_json(r#"{"weeks": [{"position": 1, "targetRPE": 15}]}"#).unwrap();
    let suggestion = engine(1_000).suggest(&template, Some(4));

    assert_eq!(suggestion.status, SuggestionStatus::Failed);
    assert!(suggestion.modifiers.is_empty());
    assert!(suggestion.notice.is_some());
}

#[test]
fn test_simulation_is_reproducible_through_config() {
    let template = ProgramTemplate::from_json(TWELVE_WEEK_PROGRAM).unwrap();
    let weeks = template.resolve_weeks(12).unwrap();
    let simulator = MonteCarloSimulator::new(SimulationConfig {
        iterations: 3_000,
        chunk_size: 500,
        seed: Some(9),
        ..SimulationConfig::default()
    });

    let a = simulator.run(&weeks).unwrap();
    let b = simulator.run(&weeks).unwrap();
    assert_eq!(a.weeks, b.weeks);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn test_timeline_feeds_phase_detection() {
    // Six weeks of sessions every other day with rising power, then two easy weeks
    let sessions: Vec<Session> = (0..28)
        .map(|i| {
            let (power, effort) = if i < 21 { (180.0 + 3.0 * i as f64, 7.0) } else { (150.0, 3.0) };
            Session::new(date(2 * i), power, 50.0, effort)
        })
        .collect();
    let questionnaires = vec![QuestionnaireResponse::new(date(10))
        .with("sleep", 2.0)
        .with("soreness", 1.0)];

    let config = EngineConfig::default();
    let metrics = config
        .timeline()
        .calculate(&sessions, &questionnaires, date(0), date(60))
        .unwrap();
    assert_eq!(metrics.len(), 61);

    for m in &metrics {
        let fatigue = m.fatigue.unwrap();
        let readiness = m.readiness.unwrap();
        assert!((0.0..=100.0).contains(&fatigue));
        assert!((0.0..=100.0).contains(&readiness));
    }

    let (fatigue, readiness) = score_series(&metrics);
    let power = power_series(&metrics, &sessions);
    assert_eq!(power.len(), fatigue.len());
    assert!(power.iter().all(|&p| p > 0.0));
    let detections = PhaseDetector::new().detect_series(&fatigue, &readiness, &power, Some(61));

    assert_eq!(detections.len(), 61);
    for detection in &detections[..4] {
        assert!(detection.phase.is_none());
        assert_eq!(detection.confidence, 0.0);
    }
    for detection in &detections[4..] {
        assert!(detection.phase.is_some());
        assert!(detection.confidence > 0.0 && detection.confidence <= 1.0);
    }
}

#[test]
fn test_priority_resolution_contract() {
    let json = r#"[
        {"condition": {"readiness": "<30"}, "adjustments": {"restMultiplier": 1.5}, "priority": 5},
        {"condition": "high_fatigue", "adjustments": {"powerMultiplier": 0.8}, "priority": 1}
    ]"#;
    let modifiers = loadcycle::modifiers::modifiers_from_json(json).unwrap();

    let winner = resolve_modifier(&modifiers, &DayContext::new(90.0, 20.0)).unwrap();
    assert_eq!(winner.priority, 1);

    let winner = resolve_modifier(&modifiers, &DayContext::new(40.0, 20.0)).unwrap();
    assert_eq!(winner.priority, 5);

    assert!(resolve_modifier(&modifiers, &DayContext::new(40.0, 60.0)).is_none());
}
