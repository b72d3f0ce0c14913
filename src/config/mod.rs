//! Planner factory settings.
//!
//! One record holds the planner type tag and every tuning knob; it supports
//! typed set operations and a JSON round-trip. Unknown setting names and
//! unknown JSON keys are rejected.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Tuning settings for planner construction.
///
/// Field names in JSON match the setter names (`connectionThreshold`,
/// `perturbationRadius`, ...). The record is plain data; the factory methods
/// that consume it live on [`crate::planning::Planner`] and
/// [`crate::registry::Registry`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PlannerConfig {
    /// Planner algorithm tag: `"prm"`, `"prm*"`, `"rrt"`, `"rrt*"`, `"sbl"`.
    #[serde(rename = "type")]
    pub planner_type: String,

    /// K for nearest-neighbor connection attempts.
    pub knn: usize,

    /// Maximum C-space distance for a roadmap edge.
    pub connection_threshold: f64,

    /// Tree extension step length.
    pub perturbation_radius: f64,

    /// Grow a second tree from the goal.
    pub bidirectional: bool,

    /// Use grid-based point location.
    pub use_grid: bool,

    /// Grid cell size for point location.
    pub grid_resolution: f64,

    /// Optimality slack for asymptotically-optimal variants.
    pub suboptimality_factor: f64,

    /// Skip connected-component maintenance.
    pub ignore_connected_components: bool,

    /// Every N iterations, inject a plain random milestone (0 disables).
    pub randomize_frequency: usize,

    /// Shortcut-smooth the solution path.
    pub shortcut: bool,

    /// Restart from scratch on stagnation.
    pub restart: bool,

    /// Nearest-neighbor structure tag.
    pub point_location: String,

    /// Termination record for restarts, e.g.
    /// `{"foundSolution":1,"maxIters":1000}`.
    pub restart_term_cond: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            planner_type: "prm".to_string(),
            knn: 10,
            // Effectively unlimited; hosts narrow it per problem.
            connection_threshold: f64::MAX,
            perturbation_radius: 0.25,
            bidirectional: true,
            use_grid: false,
            grid_resolution: 0.0,
            suboptimality_factor: 0.0,
            ignore_connected_components: false,
            randomize_frequency: 0,
            shortcut: false,
            restart: false,
            point_location: String::new(),
            restart_term_cond: String::new(),
        }
    }
}

impl PlannerConfig {
    /// Set the planner type tag.
    pub fn set_type(&mut self, planner_type: &str) {
        self.planner_type = planner_type.to_string();
    }

    /// Set a numeric setting by name.
    ///
    /// Boolean settings accept 0/nonzero; integer settings truncate.
    pub fn set_numeric(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "knn" => self.knn = value as usize,
            "connectionThreshold" => self.connection_threshold = value,
            "perturbationRadius" => self.perturbation_radius = value,
            "bidirectional" => self.bidirectional = value != 0.0,
            "grid" => self.use_grid = value != 0.0,
            "gridResolution" => self.grid_resolution = value,
            "suboptimalityFactor" => self.suboptimality_factor = value,
            "ignoreConnectedComponents" => self.ignore_connected_components = value != 0.0,
            "randomizeFrequency" => self.randomize_frequency = value as usize,
            "shortcut" => self.shortcut = value != 0.0,
            "restart" => self.restart = value != 0.0,
            _ => {
                return Err(PlanError::InvalidArgument(format!(
                    "unknown numeric setting '{name}'"
                )))
            }
        }
        Ok(())
    }

    /// Set a string setting by name.
    pub fn set_string(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "type" => self.planner_type = value.to_string(),
            "pointLocation" => self.point_location = value.to_string(),
            "restartTermCond" => self.restart_term_cond = value.to_string(),
            _ => {
                return Err(PlanError::InvalidArgument(format!(
                    "unknown string setting '{name}'"
                )))
            }
        }
        Ok(())
    }

    /// Parse settings from JSON. Unknown keys are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlanError::InvalidArgument(format!("invalid settings JSON: {e}")))
    }

    /// Serialize all settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PlanError::InvalidArgument(format!("settings not serializable: {e}")))
    }
}

/// Parsed restart termination condition.
///
/// Hosts pass this as a small JSON record; only `foundSolution` and
/// `maxIters` are honored.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestartTermCond {
    pub found_solution: u8,
    pub max_iters: usize,
}

impl Default for RestartTermCond {
    fn default() -> Self {
        Self {
            found_solution: 1,
            max_iters: 1000,
        }
    }
}

impl RestartTermCond {
    /// Parse from the `restartTermCond` setting; empty means defaults.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
            .map_err(|e| PlanError::InvalidArgument(format!("invalid restartTermCond: {e}")))
    }
}
