//! Rule-based choice of the next action from one frame's detections.

use super::game_state::{FrameInfo, MarioStatus};
use crate::config::PolicyConfig;
use crate::nes::input::Action;
use crate::vision::locator::{Detection, ObjectLocations};
use crate::vision::Point;

use tracing::debug;

/// Avoid falling first, then jump over whatever is closest.
///
/// Holds only its configuration, so the same detections and frame info
/// always produce the same action.
pub struct DecisionPolicy {
    config: PolicyConfig,
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Where Mario's feet are. A tall sprite is matched by its head, so it
    /// is shifted down; the fallback position is already a foot position.
    pub fn mario_position(&self, locations: &ObjectLocations, info: &FrameInfo) -> Point {
        match locations.mario.first() {
            Some(mario) if info.status != MarioStatus::Small => Point::new(
                mario.position.x,
                mario.position.y + self.config.tall_offset,
            ),
            Some(mario) => mario.position,
            None => self.config.default_mario_position,
        }
    }

    fn is_ground_below(&self, mario: Point, block: &Detection) -> bool {
        let dx = block.position.x - mario.x;
        let dy = block.position.y - mario.y;
        dx.abs() <= self.config.ground_dx
            && (self.config.ground_dy_min..=self.config.ground_dy_max).contains(&dy)
    }

    fn is_ground_ahead(&self, mario: Point, block: &Detection) -> bool {
        let dx = block.position.x - mario.x;
        let dy = block.position.y - mario.y;
        (0..=self.config.ahead_dx_max).contains(&dx) && dy.abs() <= self.config.ahead_dy
    }

    // `direction` is 1 for threats ahead and -1 for threats behind.
    fn is_threat(&self, mario: Point, enemy: &Detection, direction: i32) -> bool {
        let dx = (enemy.position.x - mario.x) * direction;
        let dy = enemy.position.y - mario.y;
        (self.config.threat_dx_min..=self.config.threat_dx_max).contains(&dx)
            && dy.abs() <= self.config.threat_dy
    }

    pub fn decide(&self, locations: &ObjectLocations, info: &FrameInfo) -> Action {
        let mario = self.mario_position(locations, info);

        let grounded = locations.block.iter().any(|b| self.is_ground_below(mario, b));
        let hole = !locations.block.iter().any(|b| self.is_ground_ahead(mario, b));
        if !grounded {
            return Action::RightRun;
        }
        if hole {
            debug!("gap ahead of ({}, {}), jumping", mario.x, mario.y);
            return Action::RightJumpRun;
        }

        let enemies = || locations.enemy.iter().chain(locations.hard_enemy.iter());
        if let Some(enemy) = enemies().find(|e| self.is_threat(mario, e, 1)) {
            debug!("{:?} ahead at {:?}", enemy.kind, enemy.position);
            return Action::RightJumpRun;
        }
        if let Some(enemy) = enemies().find(|e| self.is_threat(mario, e, -1)) {
            debug!("{:?} behind at {:?}", enemy.kind, enemy.position);
            return Action::LeftJumpRun;
        }

        Action::RightRun
    }
}
