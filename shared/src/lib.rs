//! Engine and wire types shared by the arena server and client.

pub mod action;
pub mod bot;
pub mod change;
pub mod config;
pub mod coordinate;
pub mod entity;
pub mod game;
pub mod map;
pub mod protocol;
pub mod utils;

pub use action::{Action, ActionKey, ActionKind, LaserAction, MoveAction};
pub use change::{Change, ChangeSender};
pub use config::GameConfig;
pub use coordinate::{Coordinate, Direction};
pub use entity::{Entity, Identifier, Laser, Mover, Player, Positioner};
pub use game::{Game, GameState, RoundState};
pub use map::{GameMap, MapError};
pub use protocol::{Packet, ProtocolError, Request, Response};
pub use utils::timestamp_millis;

pub const MOVE_THROTTLE_MS: u64 = 50;
pub const LASER_THROTTLE_MS: u64 = 500;
/// Milliseconds a laser takes to travel one cell
pub const LASER_SPEED_MS: u64 = 50;
pub const COLLISION_TICK_MS: u64 = 20;
pub const ROUND_WIN_SCORE: u32 = 10;
pub const ROUND_OVER_DELAY_MS: u64 = 10_000;
pub const ACTION_QUEUE_CAPACITY: usize = 1;
pub const CHANGE_CHANNEL_CAPACITY: usize = 1;
pub const BOT_TICK_MS: u64 = 200;

pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_NAME_LEN: usize = 16;
