use crate::nes::ram::{self, Ram};

use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Eq, PartialEq, Default, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarioStatus {
    #[default]
    Small,
    Tall,
    Fireball,
}

impl MarioStatus {
    fn from_ram(value: u8) -> MarioStatus {
        match value {
            0 => MarioStatus::Small,
            1 => MarioStatus::Tall,
            _ => MarioStatus::Fireball,
        }
    }
}

/// The per-frame record the environment hands over with each screen.
#[derive(Eq, PartialEq, Default, Clone, Copy, Serialize, Deserialize)]
pub struct FrameInfo {
    pub x_pos: u32,
    pub y_pos: u32,
    pub status: MarioStatus,
    pub life: u8,
    pub world: u8,
    pub stage: u8,
    pub score: u32,
    pub coins: u32,
    pub time: u32,
    pub flag_get: bool,
}

impl FrameInfo {
    pub fn level(&self) -> (u8, u8) {
        (self.world, self.stage)
    }
}

impl fmt::Debug for FrameInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!(
            "Mario coords: ({}, {}). Status: {:?}. Lives: {}. Level: {}-{}. Score: {}",
            self.x_pos, self.y_pos, self.status, self.life, self.world, self.stage, self.score
        ))
    }
}

pub fn read_frame_info<R: Ram + ?Sized>(ram: &R) -> FrameInfo {
    let x_pos = {
        let mario_level_x = ram.peek(ram::MARIO_LEVEL_X) as u32;
        let mario_screen_x = ram.peek(ram::MARIO_SCREEN_X) as u32;
        mario_level_x * 0x100 + mario_screen_x
    };
    let y_pos = {
        let y_pixel = ram.peek(ram::MARIO_Y_PIXEL) as u32;
        // Below the bottom of the screen the viewport byte drops to 0 and
        // the pixel coordinate wraps.
        if ram.peek(ram::MARIO_Y_VIEWPORT) < 1 {
            255 + (255 - y_pixel)
        } else {
            255 - y_pixel
        }
    };
    let flag_get = ram.peek(ram::FLOAT_STATE) == ram::FLOAT_FLAGPOLE
        || ram.peek(ram::OPER_MODE) == ram::OPER_MODE_VICTORY;
    FrameInfo {
        x_pos,
        y_pos,
        status: MarioStatus::from_ram(ram.peek(ram::PLAYER_STATUS)),
        life: ram.peek(ram::LIVES),
        world: ram.peek(ram::WORLD).wrapping_add(1),
        stage: ram.peek(ram::STAGE).wrapping_add(1),
        score: ram.peek_digits(ram::SCORE_DIGITS, 6),
        coins: ram.peek_digits(ram::COIN_DIGITS, 2),
        time: ram.peek_digits(ram::TIME_DIGITS, 3),
        flag_get,
    }
}

/// Whether Mario is playing his death animation or has fallen off screen.
pub fn is_dying<R: Ram + ?Sized>(ram: &R) -> bool {
    let state = ram.peek(ram::PLAYER_STATE);
    state == ram::STATE_DYING || state == ram::STATE_DEAD || ram.peek(ram::MARIO_Y_VIEWPORT) > 1
}

pub fn is_game_over<R: Ram + ?Sized>(ram: &R) -> bool {
    ram.peek(ram::LIVES) == ram::LIVES_GAME_OVER
}
