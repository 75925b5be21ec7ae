//! Reward and episode end rules of the usual Super Mario Bros. gym
//! environment, computed from two consecutive frame infos.

use crate::ai::game_state::FrameInfo;

/// Larger jumps in x are warps or respawns and earn nothing.
pub const MAX_X_STEP: i64 = 5;
pub const DEATH_PENALTY: i64 = -25;
pub const REWARD_RANGE: (i64, i64) = (-15, 15);

/// Reward for going from `last` to `now`.
pub fn step_reward(last: &FrameInfo, now: &FrameInfo, dying: bool) -> f64 {
    let mut x_reward = now.x_pos as i64 - last.x_pos as i64;
    if !(-MAX_X_STEP..=MAX_X_STEP).contains(&x_reward) {
        x_reward = 0;
    }
    // Only a ticking clock costs; a reset clock is not a bonus.
    let time_penalty = (now.time as i64 - last.time as i64).min(0);
    let death_penalty = if dying { DEATH_PENALTY } else { 0 };
    (x_reward + time_penalty + death_penalty).clamp(REWARD_RANGE.0, REWARD_RANGE.1) as f64
}

/// Game over always ends the episode. In single stage mode so does the
/// first death or reaching the flagpole.
pub fn is_episode_over(game_over: bool, dying: bool, flag_get: bool, single_stage: bool) -> bool {
    game_over || (single_stage && (dying || flag_get))
}
