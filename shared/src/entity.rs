//! Game objects tracked by the engine.
//!
//! Capabilities are small traits ([`Identifier`], [`Positioner`], [`Mover`]);
//! the concrete objects are collected in the [`Entity`] sum type so collision
//! and serialization code can match exhaustively.

use crate::coordinate::{Coordinate, Direction};
use crate::LASER_SPEED_MS;
use uuid::Uuid;

pub trait Identifier {
    fn id(&self) -> Uuid;
}

pub trait Positioner {
    /// Position at wall-clock time `now` (milliseconds since the Unix epoch)
    fn position_at(&self, now: u64) -> Coordinate;
}

pub trait Mover {
    fn move_to(&mut self, position: Coordinate);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: Uuid,
    pub position: Coordinate,
    pub name: String,
    pub icon: char,
}

impl Player {
    /// Creates a player whose icon is the first letter of `name`, uppercased.
    pub fn new(id: Uuid, name: impl Into<String>, position: Coordinate) -> Self {
        let name = name.into();
        let icon = icon_for_name(&name);
        Self {
            id,
            position,
            name,
            icon,
        }
    }
}

/// First character of `name` in uppercase, `?` for an empty name
pub fn icon_for_name(name: &str) -> char {
    name.chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?')
}

impl Identifier for Player {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Positioner for Player {
    fn position_at(&self, _now: u64) -> Coordinate {
        self.position
    }
}

impl Mover for Player {
    fn move_to(&mut self, position: Coordinate) {
        self.position = position;
    }
}

/// A fired laser. Its position is never stored: it is derived from the time
/// elapsed since `created`, one cell per `speed_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Laser {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub initial_position: Coordinate,
    pub direction: Direction,
    pub created: u64,
    pub speed_ms: u64,
}

impl Laser {
    /// Builds the laser fired by an owner standing at `owner_position`.
    /// The laser starts one cell ahead of its owner.
    pub fn fired_from(
        id: Uuid,
        owner_id: Uuid,
        owner_position: Coordinate,
        direction: Direction,
        created: u64,
    ) -> Self {
        Self {
            id,
            owner_id,
            initial_position: owner_position.step(direction),
            direction,
            created,
            speed_ms: LASER_SPEED_MS,
        }
    }

    pub fn with_speed(mut self, speed_ms: u64) -> Self {
        self.speed_ms = speed_ms.max(1);
        self
    }

    /// Cells travelled by `now`, saturating for lasers long past any edge
    pub fn moves_at(&self, now: u64) -> i32 {
        let moves = now.saturating_sub(self.created) / self.speed_ms.max(1);
        i32::try_from(moves).unwrap_or(i32::MAX)
    }
}

impl Identifier for Laser {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Positioner for Laser {
    fn position_at(&self, now: u64) -> Coordinate {
        let unit = self.direction.unit();
        let moves = self.moves_at(now);
        Coordinate::new(
            self.initial_position.x.saturating_add(unit.x.saturating_mul(moves)),
            self.initial_position.y.saturating_add(unit.y.saturating_mul(moves)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Player(Player),
    Laser(Laser),
}

impl Entity {
    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            Entity::Laser(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Entity::Player(player) => Some(player),
            Entity::Laser(_) => None,
        }
    }

    pub fn as_laser(&self) -> Option<&Laser> {
        match self {
            Entity::Laser(laser) => Some(laser),
            Entity::Player(_) => None,
        }
    }

    pub fn is_laser(&self) -> bool {
        matches!(self, Entity::Laser(_))
    }
}

impl Identifier for Entity {
    fn id(&self) -> Uuid {
        match self {
            Entity::Player(player) => player.id(),
            Entity::Laser(laser) => laser.id(),
        }
    }
}

impl Positioner for Entity {
    fn position_at(&self, now: u64) -> Coordinate {
        match self {
            Entity::Player(player) => player.position_at(now),
            Entity::Laser(laser) => laser.position_at(now),
        }
    }
}

impl From<Player> for Entity {
    fn from(player: Player) -> Self {
        Entity::Player(player)
    }
}

impl From<Laser> for Entity {
    fn from(laser: Laser) -> Self {
        Entity::Laser(laser)
    }
}
