//! Queue tuning.
//!
//! Every constant that shapes queue behaviour lives in [`QueueConfig`]. It
//! can be built in code with the `with_*` methods or loaded from JSON;
//! fields missing from the JSON keep their defaults.

use crate::clock::TimeWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for an obligation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of slots.
    pub capacity: usize,

    /// Commerce balance at or below which an obligation is forced to
    /// `commerce_debt_position`.
    pub commerce_debt_threshold: i32,
    pub commerce_debt_position: usize,

    /// Slot claimed by automatic forced displacement.
    pub forced_position: usize,

    /// Tokens removed from the sender when a deadline passes.
    pub expiry_penalty: u32,
    /// Tokens removed from the sender when a cascade pushes their obligation out.
    pub overflow_penalty: u32,
    /// Tokens removed from the sender when forced displacement pushes their
    /// obligation out, on top of the displacement burn.
    pub forced_overflow_penalty: u32,
    /// Most tokens burned per occupant displaced by force.
    pub forced_burn_cap: u32,

    pub purge_cost: u32,
    pub priority_move_cost: u32,
    pub extend_cost: u32,
    /// Time units added by a paid extension.
    pub extend_bonus: i32,
    pub transfer_cost: u32,
    /// Total positive tokens with the sender required to cancel.
    pub cancel_threshold: i32,

    /// Tokens granted to the recipient relationship on delivery.
    pub delivery_reward: u32,

    /// The only window in which the free swap may be used.
    pub free_swap_window: TimeWindow,

    pub segments_per_day: u32,

    /// Deadlines at or below this are critical.
    pub critical_deadline: i32,
    /// Deadlines at or below this (and above critical) are urgent.
    pub urgent_deadline: i32,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_expiry_penalty(mut self, penalty: u32) -> Self {
        self.expiry_penalty = penalty;
        self
    }

    pub fn with_overflow_penalty(mut self, penalty: u32) -> Self {
        self.overflow_penalty = penalty;
        self
    }

    pub fn with_free_swap_window(mut self, window: TimeWindow) -> Self {
        self.free_swap_window = window;
        self
    }

    pub fn with_segments_per_day(mut self, segments: u32) -> Self {
        self.segments_per_day = segments;
        self
    }

    /// The slot an obligation takes when nothing pulls it forward.
    pub fn neutral_position(&self) -> usize {
        self.capacity
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 2 {
            return Err(ConfigError::Invalid(format!(
                "capacity must be at least 2, got {}",
                self.capacity
            )));
        }
        for (name, position) in [
            ("commerce_debt_position", self.commerce_debt_position),
            ("forced_position", self.forced_position),
        ] {
            if position < 1 || position > self.capacity {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within 1..={}, got {position}",
                    self.capacity
                )));
            }
        }
        if self.segments_per_day == 0 {
            return Err(ConfigError::Invalid(
                "segments_per_day must be positive".to_string(),
            ));
        }
        if self.critical_deadline > self.urgent_deadline {
            return Err(ConfigError::Invalid(format!(
                "critical_deadline ({}) exceeds urgent_deadline ({})",
                self.critical_deadline, self.urgent_deadline
            )));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            commerce_debt_threshold: -3,
            commerce_debt_position: 2,
            forced_position: 1,
            expiry_penalty: 2,
            overflow_penalty: 2,
            forced_overflow_penalty: 3,
            forced_burn_cap: 3,
            purge_cost: 3,
            priority_move_cost: 5,
            extend_cost: 2,
            extend_bonus: 8,
            transfer_cost: 4,
            cancel_threshold: 10,
            delivery_reward: 1,
            free_swap_window: TimeWindow::Dawn,
            segments_per_day: 24,
            critical_deadline: 3,
            urgent_deadline: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 8);
        assert_eq!(config.neutral_position(), 8);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = QueueConfig::from_json_str(r#"{"capacity": 5, "purge_cost": 4}"#)
            .expect("valid config");
        assert_eq!(config.capacity, 5);
        assert_eq!(config.purge_cost, 4);
        assert_eq!(config.priority_move_cost, 5);
        assert_eq!(config.free_swap_window, TimeWindow::Dawn);
    }

    #[test]
    fn test_window_from_json() {
        let config = QueueConfig::from_json_str(r#"{"free_swap_window": "Evening"}"#)
            .expect("valid config");
        assert_eq!(config.free_swap_window, TimeWindow::Evening);
    }

    #[test]
    fn test_rejects_tiny_capacity() {
        let err = QueueConfig::from_json_str(r#"{"capacity": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_position_beyond_capacity() {
        let mut config = QueueConfig::default().with_capacity(3);
        config.commerce_debt_position = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = QueueConfig::from_json_str("{capacity: }").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
