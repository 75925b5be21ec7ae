pub mod game_state;
pub mod policy;

use self::game_state::FrameInfo;
use self::policy::DecisionPolicy;
use crate::config::{AgentConfig, ControllerConfig};
use crate::environment::Environment;
use crate::error::Result;
use crate::nes::input::Action;
use crate::vision::locator::locate_objects;
use crate::vision::template::Catalog;
use crate::vision::to_grey;

use opencv::core::Mat;
use serde::Serialize;
use tracing::{debug, info};

/// What the controller does on the next frame.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ControlState {
    JumpingRight,
    JumpingLeft,
    StuckShort,
    StuckFull,
    Policy,
}

/// Drives Mario frame by frame.
///
/// A jump is latched for several frames so it reaches a useful height. When
/// Mario stops making progress a short hop is tried first, then a full jump.
pub struct Controller<'a> {
    catalog: &'a Catalog,
    policy: DecisionPolicy,
    config: ControllerConfig,
    threshold: f32,
    // > 0 while jumping right, < 0 while jumping left
    jump_count: i32,
    max_dist: u32,
    blocked_count: u32,
    tried_small: bool,
    lives: u8,
    level: (u8, u8),
    deaths: u32,
}

impl<'a> Controller<'a> {
    pub fn new(catalog: &'a Catalog, config: &AgentConfig, initial: &FrameInfo) -> Self {
        Self {
            catalog,
            policy: DecisionPolicy::new(config.policy),
            config: config.controller,
            threshold: config.match_threshold,
            jump_count: 0,
            max_dist: 0,
            blocked_count: 0,
            tried_small: false,
            lives: initial.life,
            level: initial.level(),
            deaths: 0,
        }
    }

    pub fn state(&self) -> ControlState {
        use self::ControlState::*;

        if self.jump_count > 0 {
            JumpingRight
        } else if self.jump_count < 0 {
            JumpingLeft
        } else if self.blocked_count >= self.config.short_stuck_frames && !self.tried_small {
            StuckShort
        } else if self.blocked_count >= self.config.full_stuck_frames {
            StuckFull
        } else {
            Policy
        }
    }

    pub fn max_dist(&self) -> u32 {
        self.max_dist
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    /// Picks the action for this frame and updates the progress counters
    /// from the frame's info. `frame` is greyscale.
    pub fn act(&mut self, frame: &Mat, info: &FrameInfo) -> Result<Action> {
        let catalog = self.catalog;
        let threshold = self.threshold;
        let action = self.next_action(|policy| {
            let locations = locate_objects(frame, catalog, info.status, threshold)?;
            Ok(policy.decide(&locations, info))
        })?;
        self.track_progress(info);
        Ok(action)
    }

    fn next_action<F>(&mut self, consult: F) -> Result<Action>
    where
        F: FnOnce(&DecisionPolicy) -> Result<Action>,
    {
        let release_at = self.config.release_jump_at;
        let action = match self.state() {
            ControlState::JumpingRight => {
                let action = if self.jump_count > release_at {
                    Action::RightJumpRun
                } else {
                    Action::RightRun
                };
                self.jump_count -= 1;
                action
            }
            ControlState::JumpingLeft => {
                let action = if -self.jump_count > release_at {
                    Action::LeftJumpRun
                } else {
                    Action::LeftRun
                };
                self.jump_count += 1;
                action
            }
            ControlState::StuckShort => {
                debug!("stuck for {} frames, short hop", self.blocked_count);
                self.jump_count = self.config.short_jump_frames;
                self.blocked_count = 0;
                self.tried_small = true;
                Action::RightJumpRun
            }
            ControlState::StuckFull => {
                debug!("stuck for {} frames, full jump", self.blocked_count);
                self.jump_count = self.config.full_jump_frames;
                self.blocked_count = 0;
                Action::RightJumpRun
            }
            ControlState::Policy => {
                let action = consult(&self.policy)?;
                match action {
                    Action::RightJumpRun => self.jump_count = self.config.full_jump_frames,
                    Action::LeftJumpRun => self.jump_count = -self.config.full_jump_frames,
                    _ => {}
                }
                action
            }
        };
        Ok(action)
    }

    fn track_progress(&mut self, info: &FrameInfo) {
        if info.x_pos > self.max_dist {
            self.max_dist = info.x_pos;
            self.blocked_count = 0;
            self.tried_small = false;
        } else if info.life < self.lives || info.level() != self.level {
            if info.life < self.lives {
                self.deaths += 1;
                info!("Mario died at x = {}, {} lives left", self.max_dist, info.life);
            } else {
                info!("Reached level {}-{}", info.world, info.stage);
            }
            self.jump_count = 0;
            self.max_dist = 0;
            self.blocked_count = 0;
            self.tried_small = false;
            self.lives = info.life;
            self.level = info.level();
        } else {
            self.blocked_count += 1;
        }
    }
}

/// Summary of one episode.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub total_reward: f64,
    pub score: u32,
    pub coins: u32,
    pub frames: u64,
    pub max_x: u32,
    pub world: u8,
    pub stage: u8,
    pub deaths: u32,
    pub flag_get: bool,
    pub terminated: bool,
    pub truncated: bool,
}

impl EpisodeReport {
    pub fn out_of_frames(&self) -> bool {
        !self.terminated && !self.truncated
    }
}

/// Plays one episode until the game ends or the frame budget runs out.
pub fn run_episode<E>(env: &mut E, catalog: &Catalog, config: &AgentConfig) -> Result<EpisodeReport>
where
    E: Environment + ?Sized,
{
    let initial = env.reset()?;
    let mut controller = Controller::new(catalog, config, &initial.info);
    let mut report = EpisodeReport {
        world: initial.info.world,
        stage: initial.info.stage,
        ..EpisodeReport::default()
    };

    let mut action = Action::RightRun;
    while report.frames < config.max_frames {
        let step = env.step(action.index())?;
        let info = step.observation.info;
        report.frames += 1;
        report.total_reward += step.reward;
        report.score = info.score;
        report.coins = info.coins;
        report.world = info.world;
        report.stage = info.stage;
        report.flag_get |= info.flag_get;
        report.terminated = step.terminated;
        report.truncated = step.truncated;
        report.max_x = report.max_x.max(info.x_pos);

        if step.terminated || step.truncated {
            break;
        }
        let frame = to_grey(&step.observation.frame)?;
        action = controller.act(&frame, &info)?;
    }
    report.deaths = controller.deaths();

    info!(
        "Episode over after {} frames: reward {:.1}, score {}",
        report.frames, report.total_reward, report.score
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    fn info_at(x_pos: u32) -> FrameInfo {
        FrameInfo {
            x_pos,
            life: 2,
            world: 1,
            stage: 1,
            ..FrameInfo::default()
        }
    }

    fn controller(catalog: &Catalog) -> Controller<'_> {
        Controller::new(catalog, &AgentConfig::default(), &info_at(0))
    }

    // One frame without looking at the screen; the policy always runs.
    fn tick(controller: &mut Controller<'_>, info: &FrameInfo) -> Action {
        let action = controller.next_action(|_| Ok(Action::RightRun)).unwrap();
        controller.track_progress(info);
        action
    }

    #[test]
    fn latched_jump_is_held_then_released() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        controller.jump_count = 35;

        let mut x = 0;
        for _ in 0..25 {
            x += 1;
            assert_eq!(tick(&mut controller, &info_at(x)), Action::RightJumpRun);
        }
        assert_eq!(controller.jump_count, 10);
        for _ in 0..10 {
            x += 1;
            assert_eq!(tick(&mut controller, &info_at(x)), Action::RightRun);
        }
        assert_eq!(controller.state(), ControlState::Policy);
    }

    #[test]
    fn left_jump_counts_up_to_zero() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        controller.jump_count = -12;
        assert_eq!(controller.state(), ControlState::JumpingLeft);
        assert_eq!(tick(&mut controller, &info_at(1)), Action::LeftJumpRun);
        assert_eq!(tick(&mut controller, &info_at(2)), Action::LeftJumpRun);
        assert_eq!(tick(&mut controller, &info_at(3)), Action::LeftRun);
        assert_eq!(controller.jump_count, -9);
    }

    #[test]
    fn policy_jumps_are_latched() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        let action = controller.next_action(|_| Ok(Action::LeftJumpRun)).unwrap();
        assert_eq!(action, Action::LeftJumpRun);
        assert_eq!(controller.jump_count, -35);

        controller.jump_count = 0;
        let action = controller.next_action(|_| Ok(Action::RightJumpRun)).unwrap();
        assert_eq!(action, Action::RightJumpRun);
        assert_eq!(controller.jump_count, 35);
    }

    #[test]
    fn policy_is_not_consulted_mid_jump() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        controller.jump_count = 3;
        let action = controller.next_action(|_| panic!("policy consulted during a jump"));
        assert_eq!(action.unwrap(), Action::RightRun);
    }

    #[test]
    fn vision_errors_leave_the_latch_alone() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        let result = controller.next_action(|_| Err(AgentError::Environment("no frame".into())));
        assert!(result.is_err());
        assert_eq!(controller.state(), ControlState::Policy);
        assert_eq!(controller.jump_count, 0);
    }

    #[test]
    fn stuck_mario_hops_before_jumping() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        let stuck = info_at(0);

        let mut short_at = None;
        let mut full_at = None;
        for frame in 0..80 {
            let state = controller.state();
            tick(&mut controller, &stuck);
            match state {
                ControlState::StuckShort if short_at.is_none() => short_at = Some(frame),
                ControlState::StuckFull if full_at.is_none() => full_at = Some(frame),
                _ => {}
            }
            if frame == 39 {
                assert!(short_at.is_some(), "no short hop within 40 frames");
                assert!(full_at.is_none());
            }
        }
        assert_eq!(short_at, Some(15));
        let full_at = full_at.expect("full jump never attempted");
        assert!(full_at > short_at.unwrap());
        assert_eq!(full_at, 15 + 35);
    }

    #[test]
    fn progress_clears_stuck_counters() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        for _ in 0..16 {
            tick(&mut controller, &info_at(0));
        }
        assert!(controller.tried_small);
        tick(&mut controller, &info_at(5));
        assert!(!controller.tried_small);
        assert_eq!(controller.blocked_count, 0);
        assert_eq!(controller.max_dist(), 5);
    }

    #[test]
    fn death_resets_state() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        tick(&mut controller, &info_at(300));
        controller.jump_count = 20;
        controller.blocked_count = 7;

        let respawned = FrameInfo {
            life: 1,
            ..info_at(40)
        };
        controller.track_progress(&respawned);
        assert_eq!(controller.deaths(), 1);
        assert_eq!(controller.max_dist(), 0);
        assert_eq!(controller.jump_count, 0);
        assert_eq!(controller.blocked_count, 0);
        assert_eq!(controller.lives, 1);

        // Same life count afterwards is no longer a death.
        controller.track_progress(&FrameInfo {
            life: 1,
            ..info_at(41)
        });
        assert_eq!(controller.deaths(), 1);
    }

    #[test]
    fn stage_change_resets_without_counting_a_death() {
        let catalog = Catalog::new();
        let mut controller = controller(&catalog);
        tick(&mut controller, &info_at(3000));
        let next_stage = FrameInfo {
            stage: 2,
            ..info_at(40)
        };
        controller.track_progress(&next_stage);
        assert_eq!(controller.deaths(), 0);
        assert_eq!(controller.max_dist(), 0);
        assert_eq!(controller.level, (1, 2));
    }
}
