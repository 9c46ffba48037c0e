//! Commands that request a state change.
//!
//! Actions are fire-and-forget: an action that targets a missing entity, is
//! throttled, or is blocked simply does nothing.

use crate::change::Change;
use crate::coordinate::Direction;
use crate::entity::{Entity, Laser, Mover};
use crate::game::GameState;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Laser,
}

/// Throttle key: one timestamp is remembered per action kind and actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub actor: Uuid,
}

impl ActionKey {
    pub fn new(kind: ActionKind, actor: Uuid) -> Self {
        Self { kind, actor }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAction {
    pub id: Uuid,
    pub direction: Direction,
    /// Milliseconds since the Unix epoch, stamped when the move was requested
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaserAction {
    /// Caller-chosen laser id; must not collide with a registered entity
    pub id: Uuid,
    pub owner_id: Uuid,
    pub direction: Direction,
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(MoveAction),
    Laser(LaserAction),
}

impl Action {
    /// Applies the action. Callers hold the engine's write lock.
    pub fn perform(&self, game: &mut GameState) {
        match self {
            Action::Move(action) => action.perform(game),
            Action::Laser(action) => action.perform(game),
        }
    }
}

impl MoveAction {
    pub fn new(id: Uuid, direction: Direction, created: u64) -> Self {
        Self {
            id,
            direction,
            created,
        }
    }

    fn perform(&self, game: &mut GameState) {
        let position = match game.get_entity(self.id).and_then(Entity::as_player) {
            Some(player) => player.position,
            None => return,
        };
        if self.direction.is_stop() {
            return;
        }

        let key = ActionKey::new(ActionKind::Move, self.id);
        if !game.check_last_action_time(&key, self.created, game.config().move_throttle_ms) {
            return;
        }

        let target = position.step(self.direction);
        if game.map().is_blocked(target) || game.player_at(target, Some(self.id)) {
            return;
        }

        let player = match game.get_entity_mut(self.id).and_then(Entity::as_player_mut) {
            Some(player) => player,
            None => return,
        };
        player.move_to(target);
        let player = player.clone();

        game.update_last_action_time(key, self.created);
        game.send_change(Change::Move {
            player,
            direction: self.direction,
            position: target,
        });
    }
}

impl LaserAction {
    pub fn new(id: Uuid, owner_id: Uuid, direction: Direction, created: u64) -> Self {
        Self {
            id,
            owner_id,
            direction,
            created,
        }
    }

    fn perform(&self, game: &mut GameState) {
        let owner_position = match game.get_entity(self.owner_id).and_then(Entity::as_player) {
            Some(player) => player.position,
            None => return,
        };
        if self.direction.is_stop() || game.contains_entity(self.id) {
            return;
        }

        let key = ActionKey::new(ActionKind::Laser, self.owner_id);
        if !game.check_last_action_time(&key, self.created, game.config().laser_throttle_ms) {
            return;
        }

        let laser = Laser::fired_from(
            self.id,
            self.owner_id,
            owner_position,
            self.direction,
            self.created,
        )
        .with_speed(game.config().laser_speed_ms);

        game.add_entity(Entity::Laser(laser.clone()));
        game.update_last_action_time(key, self.created);
        game.send_change(Change::AddEntity {
            entity: Entity::Laser(laser),
        });
    }
}

impl From<MoveAction> for Action {
    fn from(action: MoveAction) -> Self {
        Action::Move(action)
    }
}

impl From<LaserAction> for Action {
    fn from(action: LaserAction) -> Self {
        Action::Laser(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::coordinate::Coordinate;
    use crate::entity::{Player, Positioner};
    use crate::map::GameMap;
    use std::sync::Arc;
    use tokio::sync::mpsc::Receiver;

    const T: u64 = 1_000_000;

    fn test_game(rows: &[&str]) -> (GameState, Receiver<Change>) {
        let config = GameConfig {
            change_channel_capacity: 64,
            ..GameConfig::default()
        };
        GameState::new(Arc::new(GameMap::parse(rows).unwrap()), config)
    }

    fn open_map() -> Vec<String> {
        let mut rows = vec![" ".repeat(20); 20];
        rows[19] = format!("S{}S", " ".repeat(18));
        rows
    }

    fn open_game() -> (GameState, Receiver<Change>) {
        let rows = open_map();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        test_game(&rows)
    }

    fn add_player(game: &mut GameState, name: &str, x: i32, y: i32) -> Uuid {
        let id = Uuid::new_v4();
        game.add_entity(Player::new(id, name, Coordinate::new(x, y)).into());
        id
    }

    fn position_of(game: &GameState, id: Uuid) -> Coordinate {
        game.get_entity(id).unwrap().position_at(T)
    }

    #[test]
    fn test_move_changes_position_by_one_cell() {
        let (mut game, mut changes) = open_game();
        let id = add_player(&mut game, "Alice", 5, 5);

        let steps = [
            (Direction::Up, Coordinate::new(5, 4)),
            (Direction::Left, Coordinate::new(4, 4)),
            (Direction::Down, Coordinate::new(4, 5)),
            (Direction::Right, Coordinate::new(5, 5)),
        ];

        for (i, (direction, expected)) in steps.into_iter().enumerate() {
            let created = T + i as u64 * 100;
            Action::from(MoveAction::new(id, direction, created)).perform(&mut game);

            match changes.try_recv().unwrap() {
                Change::Move {
                    player,
                    direction: changed,
                    position,
                } => {
                    assert_eq!(player.id, id);
                    assert_eq!(changed, direction);
                    assert_eq!(position, expected);
                }
                other => panic!("Unexpected change {:?}", other),
            }
        }
        assert_eq!(position_of(&game, id), Coordinate::new(5, 5));
    }

    #[test]
    fn test_move_into_wall_is_rejected() {
        let (mut game, mut changes) = test_game(&["#S  ", "#   "]);
        let id = add_player(&mut game, "Alice", 1, 0);

        Action::from(MoveAction::new(id, Direction::Left, T)).perform(&mut game);

        assert_eq!(position_of(&game, id), Coordinate::new(1, 0));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_move_out_of_bounds_is_rejected() {
        let (mut game, mut changes) = open_game();
        let id = add_player(&mut game, "Alice", 0, 0);

        Action::from(MoveAction::new(id, Direction::Left, T)).perform(&mut game);
        Action::from(MoveAction::new(id, Direction::Up, T + 100)).perform(&mut game);

        assert_eq!(position_of(&game, id), Coordinate::new(0, 0));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_players_block_each_other() {
        let (mut game, mut changes) = open_game();
        let alice = add_player(&mut game, "Alice", 3, 3);
        let _bob = add_player(&mut game, "Bob", 4, 3);

        Action::from(MoveAction::new(alice, Direction::Right, T)).perform(&mut game);

        assert_eq!(position_of(&game, alice), Coordinate::new(3, 3));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_lasers_do_not_block_players() {
        let (mut game, mut changes) = open_game();
        let alice = add_player(&mut game, "Alice", 3, 3);
        let laser = Laser::fired_from(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Coordinate::new(4, 2),
            Direction::Down,
            T,
        );
        game.add_entity(laser.into());

        Action::from(MoveAction::new(alice, Direction::Right, T)).perform(&mut game);

        assert_eq!(position_of(&game, alice), Coordinate::new(4, 3));
        assert!(matches!(changes.try_recv(), Ok(Change::Move { .. })));
    }

    #[test]
    fn test_move_burst_is_throttled() {
        let (mut game, mut changes) = open_game();
        let id = add_player(&mut game, "Alice", 5, 10);

        for i in 0..10 {
            Action::from(MoveAction::new(id, Direction::Up, T + i)).perform(&mut game);
        }

        assert_eq!(position_of(&game, id), Coordinate::new(5, 9));
        assert!(matches!(changes.try_recv(), Ok(Change::Move { .. })));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_move_accepted_after_throttle_window() {
        let (mut game, _changes) = open_game();
        let id = add_player(&mut game, "Alice", 5, 10);
        let window = game.config().move_throttle_ms;

        Action::from(MoveAction::new(id, Direction::Up, T)).perform(&mut game);
        Action::from(MoveAction::new(id, Direction::Up, T + window - 1)).perform(&mut game);
        assert_eq!(position_of(&game, id), Coordinate::new(5, 9));

        Action::from(MoveAction::new(id, Direction::Up, T + window)).perform(&mut game);
        assert_eq!(position_of(&game, id), Coordinate::new(5, 8));
    }

    #[test]
    fn test_rejected_move_does_not_consume_throttle() {
        let (mut game, _changes) = test_game(&["#S  ", "#   "]);
        let id = add_player(&mut game, "Alice", 1, 0);

        Action::from(MoveAction::new(id, Direction::Left, T)).perform(&mut game);
        Action::from(MoveAction::new(id, Direction::Right, T + 1)).perform(&mut game);

        assert_eq!(position_of(&game, id), Coordinate::new(2, 0));
    }

    #[test]
    fn test_throttle_is_per_actor() {
        let (mut game, _changes) = open_game();
        let alice = add_player(&mut game, "Alice", 1, 10);
        let bob = add_player(&mut game, "Bob", 10, 10);

        Action::from(MoveAction::new(alice, Direction::Up, T)).perform(&mut game);
        Action::from(MoveAction::new(bob, Direction::Up, T)).perform(&mut game);

        assert_eq!(position_of(&game, alice), Coordinate::new(1, 9));
        assert_eq!(position_of(&game, bob), Coordinate::new(10, 9));
    }

    #[test]
    fn test_move_unknown_entity_or_stop_is_noop() {
        let (mut game, mut changes) = open_game();
        let id = add_player(&mut game, "Alice", 1, 1);

        Action::from(MoveAction::new(Uuid::new_v4(), Direction::Up, T)).perform(&mut game);
        Action::from(MoveAction::new(id, Direction::Stop, T)).perform(&mut game);

        assert_eq!(position_of(&game, id), Coordinate::new(1, 1));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_laser_spawns_next_to_owner() {
        let (mut game, mut changes) = open_game();
        let owner = add_player(&mut game, "Alice", 4, 4);
        let laser_id = Uuid::new_v4();

        Action::from(LaserAction::new(laser_id, owner, Direction::Right, T)).perform(&mut game);

        let laser = game.get_entity(laser_id).and_then(Entity::as_laser).unwrap();
        assert_eq!(laser.owner_id, owner);
        assert_eq!(laser.initial_position, Coordinate::new(5, 4));
        assert_eq!(laser.created, T);
        match changes.try_recv().unwrap() {
            Change::AddEntity { entity } => assert_eq!(entity.as_laser(), Some(laser)),
            other => panic!("Unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_laser_throttle_and_duplicate_ids() {
        let (mut game, _changes) = open_game();
        let owner = add_player(&mut game, "Alice", 4, 4);
        let window = game.config().laser_throttle_ms;
        let first = Uuid::new_v4();

        Action::from(LaserAction::new(first, owner, Direction::Up, T)).perform(&mut game);
        Action::from(LaserAction::new(Uuid::new_v4(), owner, Direction::Up, T + window - 1))
            .perform(&mut game);
        assert_eq!(game.entities().filter(|e| e.is_laser()).count(), 1);

        Action::from(LaserAction::new(first, owner, Direction::Down, T + window))
            .perform(&mut game);
        assert_eq!(game.entities().filter(|e| e.is_laser()).count(), 1);

        Action::from(LaserAction::new(Uuid::new_v4(), owner, Direction::Down, T + window))
            .perform(&mut game);
        assert_eq!(game.entities().filter(|e| e.is_laser()).count(), 2);
    }

    #[test]
    fn test_laser_from_unknown_owner_is_noop() {
        let (mut game, mut changes) = open_game();
        let laser_id = Uuid::new_v4();

        Action::from(LaserAction::new(laser_id, Uuid::new_v4(), Direction::Up, T))
            .perform(&mut game);

        assert!(game.get_entity(laser_id).is_none());
        assert!(changes.try_recv().is_err());
    }
}
