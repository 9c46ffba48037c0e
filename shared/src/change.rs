//! Notifications the engine emits after mutating state.

use crate::coordinate::{Coordinate, Direction};
use crate::entity::{Entity, Player};
use log::debug;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A player moved one cell
    Move {
        player: Player,
        direction: Direction,
        position: Coordinate,
    },
    AddEntity {
        entity: Entity,
    },
    RemoveEntity {
        id: Uuid,
    },
    /// A player was killed and moved to a spawn point
    PlayerRespawn {
        player: Player,
        killed_by: Uuid,
    },
    RoundOver {
        winner: Uuid,
        new_round_at: u64,
    },
    RoundStart {
        players: Vec<Player>,
    },
}

/// Sending half of the change channel.
///
/// Sends never block: when the consumer has not drained the previous change
/// the new one is dropped.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: mpsc::Sender<Change>,
}

impl ChangeSender {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Change>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Returns false when the change was dropped.
    pub fn send(&self, change: Change) -> bool {
        match self.tx.try_send(change) {
            Ok(()) => true,
            Err(TrySendError::Full(change)) => {
                debug!("Change channel full, dropping {:?}", change);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
