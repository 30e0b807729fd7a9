use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Session style as declared by a program template or logged with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStyle {
    Interval,
    SteadyState,
    Custom,
}

impl SessionStyle {
    /// Parse a template style string, accepting the common spellings
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "interval" | "intervals" | "hiit" => Some(SessionStyle::Interval),
            "steady-state" | "steady" | "steadystate" | "endurance" => {
                Some(SessionStyle::SteadyState)
            }
            "custom" => Some(SessionStyle::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStyle::Interval => "interval",
            SessionStyle::SteadyState => "steady-state",
            SessionStyle::Custom => "custom",
        }
    }
}

impl Default for SessionStyle {
    fn default() -> Self {
        SessionStyle::Interval
    }
}

impl fmt::Display for SessionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged training session
///
/// Sessions are immutable once logged and read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Calendar date of the session
    pub date: NaiveDate,

    /// Average power in watts
    pub power: f64,

    /// Duration in minutes
    pub duration: f64,

    /// Rate of perceived exertion (1-10)
    #[serde(alias = "rpe", alias = "perceivedEffort")]
    pub perceived_effort: f64,

    /// Session style, when known
    #[serde(default, alias = "sessionType")]
    pub session_type: Option<SessionStyle>,
}

impl Session {
    pub fn new(date: NaiveDate, power: f64, duration: f64, perceived_effort: f64) -> Self {
        Self {
            date,
            power,
            duration,
            perceived_effort,
            session_type: None,
        }
    }

    pub fn with_type(mut self, session_type: SessionStyle) -> Self {
        self.session_type = Some(session_type);
        self
    }
}

/// Questionnaire fields understood by the fatigue model
pub mod fields {
    pub const SLEEP: &str = "sleep";
    pub const NUTRITION: &str = "nutrition";
    pub const STRESS: &str = "stress";
    pub const SORENESS: &str = "soreness";
    pub const ENERGY: &str = "energy";
    pub const MOTIVATION: &str = "motivation";
}

/// Neutral answer on the 1-5 questionnaire scale
pub const NEUTRAL_RESPONSE: f64 = 3.0;

/// Subjective wellness check-in, at most one per date in normal use
///
/// All answers are on a 1-5 scale. For `stress` a high value means high stress;
/// for every other field a high value is favourable (well slept, not sore, energetic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub date: NaiveDate,
    pub responses: BTreeMap<String, f64>,
}

impl QuestionnaireResponse {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            responses: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.responses.insert(field.to_string(), value);
        self
    }

    /// Answer for `field`, clamped to the 1-5 scale
    pub fn get(&self, field: &str) -> Option<f64> {
        self.responses
            .get(field)
            .copied()
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(1.0, 5.0))
    }

    /// Answer for `field`, or the neutral answer when missing
    pub fn get_or_neutral(&self, field: &str) -> f64 {
        self.get(field).unwrap_or(NEUTRAL_RESPONSE)
    }
}

/// Position of a time step in a periodized load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Ascending,
    Peak,
    Descending,
    Trough,
}

impl CyclePhase {
    /// All phases in transition-matrix order
    pub const ALL: [CyclePhase; 4] = [
        CyclePhase::Ascending,
        CyclePhase::Peak,
        CyclePhase::Descending,
        CyclePhase::Trough,
    ];

    /// Row/column index in the transition matrix and weight tables
    pub fn index(&self) -> usize {
        match self {
            CyclePhase::Ascending => 0,
            CyclePhase::Peak => 1,
            CyclePhase::Descending => 2,
            CyclePhase::Trough => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Ascending => "ascending",
            CyclePhase::Peak => "peak",
            CyclePhase::Descending => "descending",
            CyclePhase::Trough => "trough",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative position within a run of same-phase weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhasePosition {
    Early,
    Mid,
    Late,
}

impl PhasePosition {
    /// Bucket a relative position (0 = start of run, 1 = end of run)
    pub fn from_relative(relative: f64) -> Self {
        if relative < 1.0 / 3.0 {
            PhasePosition::Early
        } else if relative <= 2.0 / 3.0 {
            PhasePosition::Mid
        } else {
            PhasePosition::Late
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhasePosition::Early => "early",
            PhasePosition::Mid => "mid",
            PhasePosition::Late => "late",
        }
    }
}

impl fmt::Display for PhasePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
