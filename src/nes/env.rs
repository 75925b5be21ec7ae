//! Super Mario Bros. running on `tetanes-core`, exposed as an
//! [`Environment`].

use super::input::{Action, Buttons};
use super::ram::{self, Ram};
use super::reward::{is_episode_over, step_reward};
use crate::ai::game_state::{is_dying, is_game_over, read_frame_info, FrameInfo};
use crate::environment::{Environment, Observation, Step};
use crate::error::{AgentError, Result};
use crate::vision::{mat_from_bytes, SCREEN_HEIGHT, SCREEN_WIDTH};

use opencv::core::{Mat, CV_8UC3, CV_8UC4};
use opencv::imgproc;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tetanes_core::control_deck::HeadlessMode;
use tetanes_core::input::JoypadBtnState;
use tetanes_core::mem::Read;
use tetanes_core::prelude::*;
use tracing::debug;

use std::ops::Range;
use std::path::Path;

pub struct EnvConfig {
    /// Emulated frames per step, with the same buttons held.
    pub frame_skip: u32,
    /// Idle frames after the title screen, picked at random per reset.
    pub random_noop_range: Range<u32>,
    /// Frames to wait for the first controllable frame before giving up.
    pub start_timeout_frames: u32,
    /// End the episode on the first death or flagpole.
    pub single_stage: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            frame_skip: 1,
            random_noop_range: 0..30,
            start_timeout_frames: 600,
            single_stage: false,
        }
    }
}

pub struct NesEnv {
    deck: ControlDeck,
    config: EnvConfig,
    rng: SmallRng,
    last: FrameInfo,
}

impl Ram for NesEnv {
    fn peek(&self, addr: u16) -> u8 {
        self.deck.bus().peek(addr)
    }
}

fn deck_error<E: std::fmt::Display>(err: E) -> AgentError {
    AgentError::Environment(err.to_string())
}

impl NesEnv {
    pub fn new(rom_path: &Path, config: EnvConfig) -> Result<Self> {
        let mut deck = ControlDeck::new();
        deck.set_headless_mode(HeadlessMode::NO_AUDIO);
        deck.load_rom_path(rom_path).map_err(|err| {
            AgentError::Environment(format!("couldn't load ROM {}: {}", rom_path.display(), err))
        })?;
        Ok(Self {
            deck,
            config,
            rng: SmallRng::from_os_rng(),
            last: FrameInfo::default(),
        })
    }

    fn set_buttons(&mut self, buttons: Buttons) {
        let joypad = self.deck.joypad_mut(Player::One);
        for (button, pressed) in [
            (JoypadBtnState::LEFT, buttons.left),
            (JoypadBtnState::RIGHT, buttons.right),
            (JoypadBtnState::UP, buttons.up),
            (JoypadBtnState::DOWN, buttons.down),
            (JoypadBtnState::A, buttons.a),
            (JoypadBtnState::B, buttons.b),
            (JoypadBtnState::SELECT, buttons.select),
            (JoypadBtnState::START, buttons.start),
        ] {
            joypad.set_button(button, pressed);
        }
    }

    fn clock_frame(&mut self) -> Result<()> {
        self.deck.clock_frame().map_err(deck_error)?;
        Ok(())
    }

    fn can_play(&self) -> bool {
        self.peek(ram::OPER_MODE) == ram::OPER_MODE_GAME
            && self.peek(ram::PLAYER_STATE) == ram::STATE_NORMAL
            && self.peek_digits(ram::TIME_DIGITS, 3) > 0
    }

    // Presses start on the title screen until Mario can be controlled.
    fn skip_start_screen(&mut self) -> Result<()> {
        const START_PRESS_INTERVAL: u32 = 30;

        for frame in 0..self.config.start_timeout_frames {
            if self.can_play() {
                return Ok(());
            }
            let start = frame % START_PRESS_INTERVAL < 2;
            self.set_buttons(Buttons {
                start,
                ..Buttons::default()
            });
            self.clock_frame()?;
        }
        Err(AgentError::Environment(format!(
            "no controllable frame after {} frames (mode 0x{:02X}, state 0x{:02X})",
            self.config.start_timeout_frames,
            self.peek(ram::OPER_MODE),
            self.peek(ram::PLAYER_STATE)
        )))
    }

    // The deck renders RGB or RGBA; frames are handed on as BGR.
    fn screen(&mut self) -> Result<Mat> {
        let pixels = (SCREEN_WIDTH * SCREEN_HEIGHT) as usize;
        let buffer = self.deck.frame_buffer();
        let (typ, code) = match buffer.len() {
            len if len == pixels * 4 => (CV_8UC4, imgproc::COLOR_RGBA2BGR),
            len if len == pixels * 3 => (CV_8UC3, imgproc::COLOR_RGB2BGR),
            len => {
                return Err(AgentError::Environment(format!(
                    "unexpected frame buffer size {}",
                    len
                )))
            }
        };
        let rgb = mat_from_bytes(SCREEN_WIDTH, SCREEN_HEIGHT, typ, buffer)?;
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(&rgb, &mut bgr, code)?;
        Ok(bgr)
    }

    fn observe(&mut self) -> Result<Observation> {
        Ok(Observation {
            frame: self.screen()?,
            info: read_frame_info(&*self),
        })
    }
}

impl Environment for NesEnv {
    fn reset(&mut self) -> Result<Observation> {
        self.deck.reset(ResetKind::Soft);
        self.skip_start_screen()?;

        let range = self.config.random_noop_range.clone();
        let noops = if range.is_empty() {
            range.start
        } else {
            self.rng.random_range(range)
        };
        self.set_buttons(Buttons::default());
        for _ in 0..noops {
            self.clock_frame()?;
        }

        let observation = self.observe()?;
        self.last = observation.info;
        debug!("reset after {} idle frames: {:?}", noops, observation.info);
        Ok(observation)
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        let action = Action::from_index(action)
            .ok_or_else(|| AgentError::Environment(format!("no action with index {}", action)))?;
        self.set_buttons(action.buttons());
        for _ in 0..self.config.frame_skip.max(1) {
            self.clock_frame()?;
        }

        let observation = self.observe()?;
        let dying = is_dying(&*self);
        let reward = step_reward(&self.last, &observation.info, dying);
        self.last = observation.info;
        let terminated = is_episode_over(
            is_game_over(&*self),
            dying,
            observation.info.flag_get,
            self.config.single_stage,
        );
        Ok(Step {
            observation,
            reward,
            terminated,
            truncated: false,
        })
    }
}
