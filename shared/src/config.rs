//! Engine tuning. Defaults mirror the constants exported from the crate root.

use crate::{
    ACTION_QUEUE_CAPACITY, CHANGE_CHANNEL_CAPACITY, COLLISION_TICK_MS, LASER_SPEED_MS,
    LASER_THROTTLE_MS, MOVE_THROTTLE_MS, ROUND_OVER_DELAY_MS, ROUND_WIN_SCORE,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Authoritative engines decide kills and scoring; mirrors only copy them.
    pub authoritative: bool,
    pub move_throttle_ms: u64,
    pub laser_throttle_ms: u64,
    /// Milliseconds a laser takes to advance one cell
    pub laser_speed_ms: u64,
    pub collision_interval: Duration,
    pub round_win_score: u32,
    pub round_over_delay_ms: u64,
    /// Capacity of the action queue. A full queue makes submitters wait.
    pub action_queue_capacity: usize,
    /// Capacity of the change channel. A full channel drops new changes.
    pub change_channel_capacity: usize,
}

impl GameConfig {
    /// Defaults for a client-side mirror of a remote server
    pub fn mirror() -> Self {
        Self {
            authoritative: false,
            ..Self::default()
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            authoritative: true,
            move_throttle_ms: MOVE_THROTTLE_MS,
            laser_throttle_ms: LASER_THROTTLE_MS,
            laser_speed_ms: LASER_SPEED_MS,
            collision_interval: Duration::from_millis(COLLISION_TICK_MS),
            round_win_score: ROUND_WIN_SCORE,
            round_over_delay_ms: ROUND_OVER_DELAY_MS,
            action_queue_capacity: ACTION_QUEUE_CAPACITY,
            change_channel_capacity: CHANGE_CHANNEL_CAPACITY,
        }
    }
}
