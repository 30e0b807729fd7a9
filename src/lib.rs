// Library interface for loadcycle
// The binary and the integration tests both go through these modules

pub mod config;
pub mod error;
pub mod export;
pub mod fatigue;
pub mod import;
pub mod load;
pub mod logging;
pub mod models;
pub mod modifiers;
pub mod phase;
pub mod signal;
pub mod simulation;
pub mod template;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use error::{LoadCycleError, Result};
pub use fatigue::{DailyMetrics, FatigueModel, FatigueState, FatigueTimeline};
pub use load::{DailyCost, LoadAggregator};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use modifiers::{resolve_modifier, DayContext, FatigueModifier, ModifierEngine, ModifierSuggestion};
pub use phase::{PhaseDetection, PhaseDetector};
pub use signal::{calculate_adaptive_windows, percentile, PercentileBand};
pub use simulation::{CancellationToken, MonteCarloSimulator, RiskSummary, SimulationConfig, SimulationResult};
pub use template::{ProgramTemplate, WeekDefinition};
