use crate::error::{AgentError, Result};
use crate::vision::locator::MATCH_THRESHOLD;
use crate::vision::Point;

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

/// Pixel windows the decision policy uses, relative to Mario's top-left
/// corner. Tuned for the overworld sprite set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Where Mario is assumed to be when he can't be found on screen.
    pub default_mario_position: Point,
    /// Tall Mario's sprite starts this much higher than small Mario's.
    pub tall_offset: i32,
    pub ground_dx: i32,
    pub ground_dy_min: i32,
    pub ground_dy_max: i32,
    pub ahead_dx_max: i32,
    pub ahead_dy: i32,
    pub threat_dx_min: i32,
    pub threat_dx_max: i32,
    pub threat_dy: i32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_mario_position: Point::new(120, 79),
            tall_offset: 16,
            ground_dx: 8,
            ground_dy_min: 14,
            ground_dy_max: 18,
            ahead_dx_max: 20,
            ahead_dy: 20,
            threat_dx_min: 1,
            threat_dx_max: 70,
            threat_dy: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Frames without progress before a short hop is tried.
    pub short_stuck_frames: u32,
    /// Frames without progress before a full jump is tried.
    pub full_stuck_frames: u32,
    pub short_jump_frames: i32,
    pub full_jump_frames: i32,
    /// Jump is released once the latch drops to this many frames.
    pub release_jump_at: i32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            short_stuck_frames: 15,
            full_stuck_frames: 35,
            short_jump_frames: 15,
            full_jump_frames: 35,
            release_jump_at: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub match_threshold: f32,
    pub max_frames: u64,
    pub policy: PolicyConfig,
    pub controller: ControllerConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            match_threshold: MATCH_THRESHOLD,
            max_frames: 100_000,
            policy: PolicyConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Reads a JSON config. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<AgentConfig> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| AgentError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{ "max_frames": 500, "policy": { "threat_dx_max": 90 } }"#)
                .unwrap();
        assert_eq!(config.max_frames, 500);
        assert_eq!(config.policy.threat_dx_max, 90);
        assert_eq!(config.policy.ground_dy_min, 14);
        assert_eq!(config.controller, ControllerConfig::default());
        assert!((config.match_threshold - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("mario-rule-agent-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AgentConfig::from_file(&path), Err(AgentError::Config { .. })));
    }
}
