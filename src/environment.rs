//! The boundary between the agent and whatever runs the game.

use crate::ai::game_state::FrameInfo;
use crate::error::Result;

use opencv::core::Mat;

/// One screen plus the game's state on that frame.
pub struct Observation {
    /// 8-bit BGR, as OpenCV decodes images.
    pub frame: Mat,
    pub info: FrameInfo,
}

pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    /// The game itself ended the episode.
    pub terminated: bool,
    /// The environment cut the episode short.
    pub truncated: bool,
}

/// A steppable game, one action per call.
///
/// Actions cross this boundary as raw indices into the complex movement
/// table; see [`Action::index`](crate::nes::input::Action::index).
pub trait Environment {
    fn reset(&mut self) -> Result<Observation>;

    fn step(&mut self, action: usize) -> Result<Step>;
}
