//! Computer-controlled players.
//!
//! Bots are ordinary players. Their decisions become [`Action`]s on the same
//! queue human input uses, so they are throttled and validated like anyone
//! else.

use crate::action::{Action, LaserAction, MoveAction};
use crate::coordinate::{Coordinate, Direction};
use crate::entity::Player;
use crate::game::{Game, GameState};
use crate::map::GameMap;
use crate::utils::timestamp_millis;
use crate::BOT_TICK_MS;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotDecision {
    Move(Direction),
    Fire(Direction),
    Idle,
}

/// Picks what a bot standing on `me` does next, given the other players.
///
/// In order of priority: step off a shared cell, fire along a clear row or
/// column, walk the shortest path toward the nearest player.
pub fn decide(map: &GameMap, me: Coordinate, others: &[Coordinate]) -> BotDecision {
    if others.contains(&me) {
        return Direction::CARDINALS
            .into_iter()
            .find(|direction| {
                let target = me.step(*direction);
                !map.is_blocked(target) && !others.contains(&target)
            })
            .map_or(BotDecision::Idle, BotDecision::Move);
    }

    let mut targets = others.to_vec();
    targets.sort_by(|a, b| a.distance(me).total_cmp(&b.distance(me)));

    for target in &targets {
        if let Some(direction) = shoot_direction(map, me, *target) {
            return BotDecision::Fire(direction);
        }
    }

    for target in &targets {
        let step = next_step(map, me, *target);
        if let Some(direction) = step.and_then(|step| Direction::between(me, step)) {
            return BotDecision::Move(direction);
        }
    }

    BotDecision::Idle
}

/// Direction of a straight, wall-free line from `from` to `to`, if any.
pub fn shoot_direction(map: &GameMap, from: Coordinate, to: Coordinate) -> Option<Direction> {
    if from == to || (from.x != to.x && from.y != to.y) {
        return None;
    }

    let direction = if from.x == to.x {
        if to.y < from.y {
            Direction::Up
        } else {
            Direction::Down
        }
    } else if to.x < from.x {
        Direction::Left
    } else {
        Direction::Right
    };

    let mut cell = from.step(direction);
    while cell != to {
        if map.is_blocked(cell) {
            return None;
        }
        cell = cell.step(direction);
    }
    Some(direction)
}

/// First cell on a shortest wall-avoiding path from `from` to `to`.
pub fn next_step(map: &GameMap, from: Coordinate, to: Coordinate) -> Option<Coordinate> {
    if from == to || map.is_blocked(to) {
        return None;
    }

    let mut came_from: HashMap<Coordinate, Coordinate> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    came_from.insert(from, from);

    while let Some(cell) = queue.pop_front() {
        if cell == to {
            let mut step = to;
            while came_from[&step] != from {
                step = came_from[&step];
            }
            return Some(step);
        }
        for direction in Direction::CARDINALS {
            let neighbor = cell.step(direction);
            if map.is_blocked(neighbor) || came_from.contains_key(&neighbor) {
                continue;
            }
            came_from.insert(neighbor, cell);
            queue.push_back(neighbor);
        }
    }
    None
}

/// Drives every bot added to one engine.
pub struct Bots {
    state: Arc<RwLock<GameState>>,
    map: Arc<GameMap>,
    actions: mpsc::Sender<Action>,
    shutdown: watch::Receiver<bool>,
    bots: Vec<Uuid>,
    period: Duration,
}

impl Bots {
    pub fn new(game: &Game) -> Self {
        Self {
            state: game.state(),
            map: game.map(),
            actions: game.action_sender(),
            shutdown: game.shutdown_signal(),
            bots: Vec::new(),
            period: Duration::from_millis(BOT_TICK_MS),
        }
    }

    /// Adds a bot player at a random spawn point.
    pub async fn add_bot(&mut self, name: &str) -> Player {
        let player = Player::new(Uuid::new_v4(), name, self.map.random_spawn_point());
        self.state.write().await.add_entity(player.clone().into());
        self.bots.push(player.id);
        info!("Bot {} joined at {:?}", name, player.position);
        player
    }

    /// Takes control of a player that is already in the engine, such as the
    /// local player of a headless client.
    pub fn control(&mut self, player_id: Uuid) {
        if !self.bots.contains(&player_id) {
            self.bots.push(player_id);
        }
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Spawns the decision loop. It stops when the engine shuts down.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {
                    if !self.tick().await {
                        break;
                    }
                }
            }
        }
        debug!("Bot loop stopped");
    }

    /// Returns false once the engine stopped accepting actions.
    async fn tick(&self) -> bool {
        let positions: HashMap<Uuid, Coordinate> = {
            let state = self.state.read().await;
            state
                .players()
                .map(|player| (player.id, player.position))
                .collect()
        };

        for id in &self.bots {
            let me = match positions.get(id) {
                Some(position) => *position,
                None => continue,
            };
            let others: Vec<Coordinate> = positions
                .iter()
                .filter(|(other, _)| *other != id)
                .map(|(_, position)| *position)
                .collect();

            let action: Action = match decide(&self.map, me, &others) {
                BotDecision::Move(direction) => {
                    MoveAction::new(*id, direction, timestamp_millis()).into()
                }
                BotDecision::Fire(direction) => {
                    LaserAction::new(Uuid::new_v4(), *id, direction, timestamp_millis()).into()
                }
                BotDecision::Idle => continue,
            };
            if self.actions.send(action).await.is_err() {
                return false;
            }
        }
        true
    }
}
