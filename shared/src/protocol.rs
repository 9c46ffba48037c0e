//! Wire format exchanged between arena clients and the server.
//!
//! Every UDP datagram carries exactly one bincode-encoded [`Packet`]. Ids
//! travel as strings and are parsed at the boundary, so a malformed id is a
//! [`ProtocolError`] for the caller to log and discard, never an engine fault.

use crate::change::Change;
use crate::coordinate::{Coordinate, Direction};
use crate::entity::{Entity, Laser, Player};
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Largest payload a single UDP datagram can carry
pub const MAX_PACKET_SIZE: usize = 65_507;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid id {0:?}")]
    InvalidId(String),
    #[error("packet codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("packet of {0} bytes exceeds the datagram limit")]
    TooLarge(usize),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // Client -> Server
    Connect {
        id: String,
        name: String,
        password: String,
    },
    Request {
        token: String,
        request: Request,
    },
    Heartbeat {
        token: String,
    },
    Disconnect {
        token: String,
    },

    // Server -> Client
    Connected {
        token: String,
        entities: Vec<WireEntity>,
    },
    Rejected {
        reason: String,
    },
    Response(Response),
}

/// Player input. The server stamps the creation time when it arrives.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Request {
    Move {
        direction: WireDirection,
    },
    Laser {
        id: String,
        direction: WireDirection,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Response {
    AddEntity {
        entity: WireEntity,
    },
    UpdateEntity {
        entity: WireEntity,
    },
    RemoveEntity {
        id: String,
    },
    PlayerRespawn {
        player: WirePlayer,
        killed_by_id: String,
    },
    RoundOver {
        round_winner_id: String,
        new_round_at: u64,
    },
    RoundStart {
        players: Vec<WirePlayer>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum WireDirection {
    Up,
    Down,
    Left,
    Right,
    Stop,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct WireCoordinate {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WirePlayer {
    pub id: String,
    pub name: String,
    pub icon: char,
    pub position: WireCoordinate,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireLaser {
    pub id: String,
    pub owner_id: String,
    pub start_position: WireCoordinate,
    pub direction: WireDirection,
    pub created: u64,
    pub speed_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum WireEntity {
    Player(WirePlayer),
    Laser(WireLaser),
}

pub fn parse_id(id: &str) -> Result<Uuid, ProtocolError> {
    Uuid::parse_str(id).map_err(|_| ProtocolError::InvalidId(id.to_string()))
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let data = serialize(packet)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::TooLarge(data.len()));
    }
    Ok(data)
}

pub fn decode(data: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(deserialize(data)?)
}

impl From<Direction> for WireDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => WireDirection::Up,
            Direction::Down => WireDirection::Down,
            Direction::Left => WireDirection::Left,
            Direction::Right => WireDirection::Right,
            Direction::Stop => WireDirection::Stop,
        }
    }
}

impl From<WireDirection> for Direction {
    fn from(direction: WireDirection) -> Self {
        match direction {
            WireDirection::Up => Direction::Up,
            WireDirection::Down => Direction::Down,
            WireDirection::Left => Direction::Left,
            WireDirection::Right => Direction::Right,
            WireDirection::Stop => Direction::Stop,
        }
    }
}

impl From<Coordinate> for WireCoordinate {
    fn from(position: Coordinate) -> Self {
        Self {
            x: position.x,
            y: position.y,
        }
    }
}

impl From<WireCoordinate> for Coordinate {
    fn from(position: WireCoordinate) -> Self {
        Coordinate::new(position.x, position.y)
    }
}

impl From<&Player> for WirePlayer {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.clone(),
            icon: player.icon,
            position: player.position.into(),
        }
    }
}

impl TryFrom<WirePlayer> for Player {
    type Error = ProtocolError;

    fn try_from(player: WirePlayer) -> Result<Self, Self::Error> {
        Ok(Player {
            id: parse_id(&player.id)?,
            position: player.position.into(),
            name: player.name,
            icon: player.icon,
        })
    }
}

impl From<&Laser> for WireLaser {
    fn from(laser: &Laser) -> Self {
        Self {
            id: laser.id.to_string(),
            owner_id: laser.owner_id.to_string(),
            start_position: laser.initial_position.into(),
            direction: laser.direction.into(),
            created: laser.created,
            speed_ms: laser.speed_ms,
        }
    }
}

impl TryFrom<WireLaser> for Laser {
    type Error = ProtocolError;

    fn try_from(laser: WireLaser) -> Result<Self, Self::Error> {
        Ok(Laser {
            id: parse_id(&laser.id)?,
            owner_id: parse_id(&laser.owner_id)?,
            initial_position: laser.start_position.into(),
            direction: laser.direction.into(),
            created: laser.created,
            speed_ms: laser.speed_ms.max(1),
        })
    }
}

impl From<&Entity> for WireEntity {
    fn from(entity: &Entity) -> Self {
        match entity {
            Entity::Player(player) => WireEntity::Player(player.into()),
            Entity::Laser(laser) => WireEntity::Laser(laser.into()),
        }
    }
}

impl TryFrom<WireEntity> for Entity {
    type Error = ProtocolError;

    fn try_from(entity: WireEntity) -> Result<Self, Self::Error> {
        Ok(match entity {
            WireEntity::Player(player) => Entity::Player(player.try_into()?),
            WireEntity::Laser(laser) => Entity::Laser(laser.try_into()?),
        })
    }
}

/// Each engine change maps to exactly one response. A move is sent as an
/// update of the whole player.
impl From<&Change> for Response {
    fn from(change: &Change) -> Self {
        match change {
            Change::Move { player, .. } => Response::UpdateEntity {
                entity: WireEntity::Player(player.into()),
            },
            Change::AddEntity { entity } => Response::AddEntity {
                entity: entity.into(),
            },
            Change::RemoveEntity { id } => Response::RemoveEntity { id: id.to_string() },
            Change::PlayerRespawn { player, killed_by } => Response::PlayerRespawn {
                player: player.into(),
                killed_by_id: killed_by.to_string(),
            },
            Change::RoundOver {
                winner,
                new_round_at,
            } => Response::RoundOver {
                round_winner_id: winner.to_string(),
                new_round_at: *new_round_at,
            },
            Change::RoundStart { players } => Response::RoundStart {
                players: players.iter().map(WirePlayer::from).collect(),
            },
        }
    }
}
