//! Simulation tolerances
//!
//! Constructed once per run and handed to the solver and engine. Nothing in
//! the crate reads thresholds from globals.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Numeric tunables for a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    // === Tolerances ===
    /// Event times closer than this are treated as simultaneous
    pub time_epsilon: f64,
    /// Distances below this count as contact
    pub space_epsilon: f64,
    /// Speeds below this count as at rest after an impact
    pub rest_velocity: f64,

    // === Root finder ===
    /// Convergence tolerance of the quadratic-factor iteration
    pub root_epsilon: f64,
    /// Iteration cap before a candidate is dropped as non-convergent
    pub max_iterations: u32,

    // === Collision response ===
    /// Distance a ball is pushed off a cushion after rebounding
    pub cushion_nudge: f64,

    // === Broad phase ===
    /// Tile columns across the table width
    pub tiles_x: u32,
    /// Tile rows along the table length
    pub tiles_y: u32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            time_epsilon: 1e-7,
            space_epsilon: 1e-6,
            rest_velocity: 1e-8,

            root_epsilon: 5e-6,
            max_iterations: 10_000,

            cushion_nudge: 1e-4,

            tiles_x: 3,
            tiles_y: 4,
        }
    }
}

impl SimSettings {
    /// Parse an override document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject tolerances that would stall or break the engine
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("time_epsilon", self.time_epsilon),
            ("space_epsilon", self.space_epsilon),
            ("rest_velocity", self.rest_velocity),
            ("root_epsilon", self.root_epsilon),
            ("cushion_nudge", self.cushion_nudge),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidSettings(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(SimError::InvalidSettings(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return Err(SimError::InvalidSettings(format!(
                "tile grid must be non-empty, got {}x{}",
                self.tiles_x, self.tiles_y
            )));
        }
        Ok(())
    }
}
