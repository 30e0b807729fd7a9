use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fatigue::{FatigueModel, FatigueModelConfig, FatigueTimeline};
use crate::load::{LoadAggregator, LoadConfig};
use crate::logging::LogConfig;
use crate::modifiers::{ModifierConfig, ModifierEngine, ModifierGenerator};
use crate::phase::{PhaseDetector, PhaseDetectorConfig};
use crate::simulation::{MonteCarloSimulator, SimulationConfig};

/// Engine configuration
///
/// Every section falls back to its defaults when missing from the file, so a config
/// only needs to name the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-session load formula
    pub load: LoadConfig,

    /// Dual-compartment model coefficients
    pub fatigue: FatigueModelConfig,

    /// Phase detector constants
    pub phase: PhaseDetectorConfig,

    /// Monte Carlo settings
    pub simulation: SimulationConfig,

    /// Modifier generation
    pub modifiers: ModifierConfig,

    pub logging: LogConfig,
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loadcycle")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_path_or_default(&Self::default_config_path())
    }

    pub fn load_from_path_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&self) -> Result<PathBuf> {
        let path = Self::default_config_path();
        self.save_to_file(&path)?;
        Ok(path)
    }

    /// Problems that will make components fall back to defaults
    ///
    /// Nothing here is fatal; each entry names a value and what will be used instead.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(self.load.base_power.is_finite() && self.load.base_power > 0.0) {
            warnings.push(format!(
                "load.base_power = {} is not a positive wattage; the built-in default is used",
                self.load.base_power
            ));
        }
        if self.load.min_power_ratio > self.load.max_power_ratio {
            warnings.push(format!(
                "load.min_power_ratio ({}) exceeds load.max_power_ratio ({})",
                self.load.min_power_ratio, self.load.max_power_ratio
            ));
        }

        let (_, fallbacks) = self.fatigue.sanitized();
        warnings.extend(fallbacks.into_iter().map(|f| format!("fatigue: {}", f)));

        if self.phase.min_points == 0 || self.phase.window < self.phase.min_points {
            warnings.push(format!(
                "phase.window ({}) must be at least phase.min_points ({}) and both positive",
                self.phase.window, self.phase.min_points
            ));
        }
        for (i, row) in self.phase.transition_matrix.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if row.iter().any(|p| *p < 0.0) || (sum - 1.0).abs() > 1e-6 {
                warnings.push(format!("phase.transition_matrix row {} is not a probability distribution", i));
            }
        }

        if let Err(e) = self.simulation.validate() {
            warnings.push(format!("simulation: {}", e));
        }

        if self.modifiers.overload_fatigue <= self.modifiers.readiness_floor {
            warnings.push(format!(
                "modifiers.overload_fatigue ({}) should sit above modifiers.readiness_floor ({})",
                self.modifiers.overload_fatigue, self.modifiers.readiness_floor
            ));
        }

        warnings
    }

    pub fn load_aggregator(&self) -> LoadAggregator {
        LoadAggregator::with_config(self.load.clone())
    }

    pub fn fatigue_model(&self) -> FatigueModel {
        FatigueModel::with_config(self.fatigue.clone())
    }

    pub fn timeline(&self) -> FatigueTimeline {
        FatigueTimeline::new(self.fatigue_model(), self.load_aggregator())
    }

    pub fn phase_detector(&self) -> PhaseDetector {
        PhaseDetector::with_config(self.phase.clone())
    }

    pub fn simulator(&self) -> MonteCarloSimulator {
        MonteCarloSimulator::with_models(self.simulation.clone(), self.fatigue_model(), self.load_aggregator())
    }

    pub fn modifier_engine(&self) -> ModifierEngine {
        ModifierEngine::new(self.simulator(), ModifierGenerator::new(self.modifiers.clone()))
    }
}
