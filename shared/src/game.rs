//! The game engine: entity table, scoring, round state, and the loops that
//! mutate them.
//!
//! [`GameState`] is the table itself. It is not independently thread-safe;
//! every mutation happens behind the single `RwLock` owned by [`Game`], so the
//! collision tick always sees one consistent snapshot of every entity.
//!
//! [`Game`] is the handle a process role (server, client mirror, local game)
//! owns. It runs two loops for its lifetime:
//! - the action loop, pulling one [`Action`] at a time from a bounded queue
//! - the collision loop, running on a fixed period
//!
//! The action queue defaults to a capacity of one. A full queue makes the
//! submitter wait, so at most one action is in flight at a time. A fast typist
//! on a single client loses burst responsiveness; this is a known limitation
//! of the admission valve.

use crate::action::{Action, ActionKey};
use crate::change::{Change, ChangeSender};
use crate::config::GameConfig;
use crate::coordinate::Coordinate;
use crate::entity::{Entity, Identifier, Laser, Mover, Player, Positioner};
use crate::map::GameMap;
use crate::utils::timestamp_millis;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::{interval, sleep, MissedTickBehavior};
use uuid::Uuid;

/// Whether kills currently count toward the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    InProgress,
    WaitingToRestart { winner: Uuid, new_round_at: u64 },
}

/// Every player and laser in the arena, with scores and throttle history
pub struct GameState {
    entities: HashMap<Uuid, Entity>,
    /// Kills this round. Players without a kill have no entry.
    score: HashMap<Uuid, u32>,
    round: RoundState,
    /// Creation time of the last accepted action per (kind, actor)
    last_action: HashMap<ActionKey, u64>,
    map: Arc<GameMap>,
    config: GameConfig,
    changes: ChangeSender,
}

impl GameState {
    /// Creates an empty table and the receiving end of its change channel.
    pub fn new(map: Arc<GameMap>, config: GameConfig) -> (Self, mpsc::Receiver<Change>) {
        let (changes, change_rx) = ChangeSender::channel(config.change_channel_capacity);
        let state = Self {
            entities: HashMap::new(),
            score: HashMap::new(),
            round: RoundState::InProgress,
            last_action: HashMap::new(),
            map,
            config,
            changes,
        };
        (state, change_rx)
    }

    /// Registers an entity under its id. An existing entry is overwritten.
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    /// Replaces the stored entity with the same id, inserting it if absent.
    pub fn update_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    /// Removes an entity, returning it if it was present. No change is emitted.
    pub fn remove_entity(&mut self, id: Uuid) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get_entity(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_entity_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains_entity(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All players, in no particular order
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.entities.values().filter_map(Entity::as_player)
    }

    /// The player with `id`, or None if absent or not a player
    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.get_entity(id).and_then(Entity::as_player)
    }

    /// True when a player other than `except` stands on `position`.
    pub fn player_at(&self, position: Coordinate, except: Option<Uuid>) -> bool {
        self.players()
            .any(|player| player.position == position && Some(player.id) != except)
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Only authoritative engines award kills and end rounds.
    pub fn is_authoritative(&self) -> bool {
        self.config.authoritative
    }

    /// Kills credited to `id` this round
    pub fn score(&self, id: Uuid) -> u32 {
        self.score.get(&id).copied().unwrap_or(0)
    }

    pub fn scores(&self) -> &HashMap<Uuid, u32> {
        &self.score
    }

    /// Credits one kill to `id`.
    pub fn add_score(&mut self, id: Uuid) {
        *self.score.entry(id).or_insert(0) += 1;
    }

    pub fn round_state(&self) -> RoundState {
        self.round
    }

    pub fn is_waiting_for_round(&self) -> bool {
        matches!(self.round, RoundState::WaitingToRestart { .. })
    }

    /// Records a finished round reported by an authoritative peer.
    pub fn set_round_over(&mut self, winner: Uuid, new_round_at: u64) {
        self.round = RoundState::WaitingToRestart {
            winner,
            new_round_at,
        };
    }

    /// Clears the waiting flag and all scores without relocating anyone.
    /// Mirrors call this when the authoritative peer starts a round.
    pub fn reset_round(&mut self) {
        self.round = RoundState::InProgress;
        self.score.clear();
    }

    /// Starts a new round: resets scores, moves every player to a spawn point
    /// round-robin, and emits a RoundStart change.
    pub fn start_new_round(&mut self) {
        self.reset_round();

        let mut ids: Vec<Uuid> = self.players().map(|player| player.id).collect();
        ids.sort();

        let spawn_points = self.map.spawn_points().to_vec();
        let mut players = Vec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            if let Some(player) = self.get_entity_mut(id).and_then(Entity::as_player_mut) {
                player.move_to(spawn_points[i % spawn_points.len()]);
                players.push(player.clone());
            }
        }

        info!("New round started with {} players", players.len());
        self.send_change(Change::RoundStart { players });
    }

    /// Emits a change without blocking; it is dropped if the consumer lags.
    pub fn send_change(&self, change: Change) {
        self.changes.send(change);
    }

    /// False when an action with `key` was accepted less than `throttle_ms`
    /// before `created`.
    pub fn check_last_action_time(&self, key: &ActionKey, created: u64, throttle_ms: u64) -> bool {
        match self.last_action.get(key) {
            Some(last) => created >= last.saturating_add(throttle_ms),
            None => true,
        }
    }

    /// Records an accepted action for later throttle checks.
    pub fn update_last_action_time(&mut self, key: ActionKey, created: u64) {
        self.last_action.insert(key, created);
    }

    /// Groups entity ids by the cell they occupy at `now`.
    pub fn collision_map(&self, now: u64) -> HashMap<Coordinate, Vec<Uuid>> {
        let mut collision_map: HashMap<Coordinate, Vec<Uuid>> = HashMap::new();
        for entity in self.entities.values() {
            collision_map
                .entry(entity.position_at(now))
                .or_default()
                .push(entity.id());
        }
        collision_map
    }

    /// Resolves laser hits at time `now`.
    ///
    /// Players sharing a cell with another player's laser are respawned and
    /// that laser's owner scores. When several such lasers share the cell the
    /// earliest one wins, ties broken by id. Kills happen only on an
    /// authoritative engine while a round is in progress. Lasers sharing a cell with anything, standing on a wall,
    /// or outside the map are removed on every engine.
    ///
    /// Returns the restart time when this tick ended the round.
    pub fn detect_collisions(&mut self, now: u64) -> Option<u64> {
        let mut removed_lasers: HashSet<Uuid> = HashSet::new();
        let mut new_round_at = None;

        for (position, ids) in self.collision_map(now) {
            if ids.len() < 2 {
                continue;
            }

            let mut lasers: Vec<Laser> = ids
                .iter()
                .filter_map(|id| self.get_entity(*id).and_then(Entity::as_laser))
                .cloned()
                .collect();
            if lasers.is_empty() {
                continue;
            }
            lasers.sort_by_key(|laser| (laser.created, laser.id));

            if self.is_authoritative() {
                for id in &ids {
                    if self.is_waiting_for_round() {
                        break;
                    }
                    if self.player(*id).is_none() {
                        continue;
                    }
                    // The earliest laser someone else fired takes the kill.
                    let shooter = match lasers.iter().find(|laser| laser.owner_id != *id) {
                        Some(laser) => laser.owner_id,
                        None => continue,
                    };
                    if let Some(at) = self.kill_player(*id, shooter, position, now) {
                        new_round_at = Some(at);
                    }
                }
            }

            removed_lasers.extend(lasers.iter().map(|laser| laser.id));
        }

        for entity in self.entities.values() {
            if let Entity::Laser(laser) = entity {
                if self.map.is_blocked(laser.position_at(now)) {
                    removed_lasers.insert(laser.id);
                }
            }
        }

        for id in removed_lasers {
            if self.remove_entity(id).is_some() {
                self.send_change(Change::RemoveEntity { id });
            }
        }

        new_round_at
    }

    /// Sends `victim` to the spawn point furthest from where it died and
    /// credits `killer`. Returns the restart time if the kill won the round.
    fn kill_player(
        &mut self,
        victim: Uuid,
        killer: Uuid,
        died_at: Coordinate,
        now: u64,
    ) -> Option<u64> {
        let spawn_point = self.map.furthest_spawn_point(died_at);
        let player = self.get_entity_mut(victim).and_then(Entity::as_player_mut)?;
        player.move_to(spawn_point);
        let player = player.clone();

        debug!("Player {} killed by {}", player.name, killer);
        self.send_change(Change::PlayerRespawn {
            player,
            killed_by: killer,
        });

        self.add_score(killer);
        if self.score(killer) >= self.config.round_win_score {
            return Some(self.end_round(killer, now));
        }
        None
    }

    fn end_round(&mut self, winner: Uuid, now: u64) -> u64 {
        let new_round_at = now + self.config.round_over_delay_ms;
        self.set_round_over(winner, new_round_at);

        info!("Round won by {}, next round at {}", winner, new_round_at);
        self.send_change(Change::RoundOver {
            winner,
            new_round_at,
        });
        new_round_at
    }
}

/// Engine handle owned by one process role.
///
/// Dropping the handle (or calling [`Game::shutdown`]) stops both loops and
/// cancels a pending round restart.
pub struct Game {
    state: Arc<RwLock<GameState>>,
    map: Arc<GameMap>,
    config: GameConfig,
    action_tx: mpsc::Sender<Action>,
    action_rx: Option<mpsc::Receiver<Action>>,
    change_rx: Option<mpsc::Receiver<Change>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Game {
    pub fn new(map: GameMap, config: GameConfig) -> Self {
        let map = Arc::new(map);
        let (state, change_rx) = GameState::new(Arc::clone(&map), config.clone());
        let (action_tx, action_rx) = mpsc::channel(config.action_queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            state: Arc::new(RwLock::new(state)),
            map,
            config,
            action_tx,
            action_rx: Some(action_rx),
            change_rx: Some(change_rx),
            shutdown_tx,
        }
    }

    /// Spawns the action loop and the collision loop on the current runtime.
    pub fn start(&mut self) {
        let actions = match self.action_rx.take() {
            Some(actions) => actions,
            None => {
                warn!("Game loops already started");
                return;
            }
        };

        tokio::spawn(run_action_loop(
            Arc::clone(&self.state),
            actions,
            self.shutdown_tx.subscribe(),
        ));
        tokio::spawn(run_collision_loop(
            Arc::clone(&self.state),
            self.config.collision_interval,
            self.shutdown_tx.subscribe(),
        ));
    }

    /// Hands out the single consumer end of the change channel.
    pub fn take_changes(&mut self) -> Option<mpsc::Receiver<Change>> {
        self.change_rx.take()
    }

    /// Queues an action, waiting while the queue is full.
    pub async fn submit_action(&self, action: Action) {
        if self.action_tx.send(action).await.is_err() {
            debug!("Action loop stopped, dropping action");
        }
    }

    pub fn action_sender(&self) -> mpsc::Sender<Action> {
        self.action_tx.clone()
    }

    pub fn state(&self) -> Arc<RwLock<GameState>> {
        Arc::clone(&self.state)
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GameState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GameState> {
        self.state.write().await
    }

    pub fn map(&self) -> Arc<GameMap> {
        Arc::clone(&self.map)
    }

    /// Only authoritative engines award kills and end rounds.
    pub fn is_authoritative(&self) -> bool {
        self.config.authoritative
    }

    /// Receiver that observes `true` once the engine shuts down. Helper loops
    /// (bots, renderers) select on it to stop with the engine.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_action_loop(
    state: Arc<RwLock<GameState>>,
    mut actions: mpsc::Receiver<Action>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            action = actions.recv() => {
                let action = match action {
                    Some(action) => action,
                    None => break,
                };
                let mut state = state.write().await;
                if state.is_waiting_for_round() {
                    continue;
                }
                action.perform(&mut state);
            }
        }
    }
    debug!("Action loop stopped");
}

async fn run_collision_loop(
    state: Arc<RwLock<GameState>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let new_round_at = {
                    let mut state = state.write().await;
                    state.detect_collisions(timestamp_millis())
                };
                if let Some(new_round_at) = new_round_at {
                    tokio::spawn(run_round_restart(
                        Arc::clone(&state),
                        new_round_at,
                        shutdown.clone(),
                    ));
                }
            }
        }
    }
    debug!("Collision loop stopped");
}

/// One-shot timer that starts the next round unless the engine shuts down
/// first.
async fn run_round_restart(
    state: Arc<RwLock<GameState>>,
    new_round_at: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let delay = Duration::from_millis(new_round_at.saturating_sub(timestamp_millis()));
    tokio::select! {
        _ = shutdown.changed() => debug!("Round restart cancelled"),
        _ = sleep(delay) => state.write().await.start_new_round(),
    }
}
