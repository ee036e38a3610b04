use serde::{Deserialize, Serialize};
use thiserror::Error;
use worldofbits_protocol::{LatLng, Token};

/// Fixed game constants. Everything the rules, the grid and the movement
/// controller need to agree on lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub origin: LatLng,
    pub cell_degrees: f64,
    pub start_position: LatLng,
    pub spawn_probability: f64,
    pub base_values: Vec<Token>,
    pub spawn_salt: String,
    pub value_salt: String,
    /// Chebyshev distance, in cells.
    pub interaction_radius: u32,
    pub win_threshold: Token,
    pub step_degrees: f64,
    pub hysteresis_meters: f64,
    pub view_margin_cells: u32,
    pub storage_key: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            origin: LatLng::new(0.0, 0.0),
            cell_degrees: 1e-4,
            start_position: LatLng::new(36.98949379578401, -122.06277128548504),
            spawn_probability: 0.1,
            base_values: vec![1, 2],
            spawn_salt: "spawn".to_string(),
            value_salt: "initialValue".to_string(),
            interaction_radius: 3,
            win_threshold: 32,
            step_degrees: 1e-4,
            hysteresis_meters: 5.0,
            view_margin_cells: 1,
            storage_key: "worldofbits.state.v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cell_degrees must be positive, got {0}")]
    CellSize(f64),
    #[error("step_degrees must be positive, got {0}")]
    StepSize(f64),
    #[error("spawn_probability must be within [0, 1], got {0}")]
    Probability(f64),
    #[error("base_values must be non-empty and non-zero")]
    BaseValues,
    #[error("win_threshold must be non-zero")]
    WinThreshold,
    #[error("hysteresis_meters must be non-negative, got {0}")]
    Hysteresis(f64),
    #[error("storage_key must not be empty")]
    StorageKey,
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_degrees.is_finite() && self.cell_degrees > 0.0) {
            return Err(ConfigError::CellSize(self.cell_degrees));
        }
        if !(self.step_degrees.is_finite() && self.step_degrees > 0.0) {
            return Err(ConfigError::StepSize(self.step_degrees));
        }
        if !(0.0..=1.0).contains(&self.spawn_probability) {
            return Err(ConfigError::Probability(self.spawn_probability));
        }
        if self.base_values.is_empty() || self.base_values.contains(&0) {
            return Err(ConfigError::BaseValues);
        }
        if self.win_threshold == 0 {
            return Err(ConfigError::WinThreshold);
        }
        if self.hysteresis_meters.is_nan() || self.hysteresis_meters < 0.0 {
            return Err(ConfigError::Hysteresis(self.hysteresis_meters));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::StorageKey);
        }
        Ok(())
    }
}
