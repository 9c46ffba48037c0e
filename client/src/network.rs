//! Client network layer: joins a server, forwards local actions as requests
//! and applies the server's responses to the local mirror engine

use log::{debug, info, warn};
use shared::protocol::{self, ProtocolError};
use shared::{Change, Coordinate, Entity, GameState, Packet, Request, Response};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};
use uuid::Uuid;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Locally predicted positions remembered to recognise the server's echo
const PREDICTION_HISTORY: usize = 5;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("could not resolve server address {0}")]
    UnknownHost(String),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("no answer from server")]
    Timeout,
}

/// Applies server responses to a non-authoritative engine and turns local
/// engine changes into requests.
#[derive(Debug)]
pub struct Mirror {
    player_id: Uuid,
    recent_positions: VecDeque<Coordinate>,
}

impl Mirror {
    pub fn new(player_id: Uuid) -> Self {
        Self {
            player_id,
            recent_positions: VecDeque::with_capacity(PREDICTION_HISTORY),
        }
    }

    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    fn record_position(&mut self, position: Coordinate) {
        if self.recent_positions.len() == PREDICTION_HISTORY {
            self.recent_positions.pop_front();
        }
        self.recent_positions.push_back(position);
    }

    /// Request to send for a change the local engine made, if it came from
    /// the local player.
    pub fn outgoing_request(&mut self, change: &Change) -> Option<Request> {
        match change {
            Change::Move {
                player,
                direction,
                position,
            } if player.id == self.player_id => {
                self.record_position(*position);
                Some(Request::Move {
                    direction: (*direction).into(),
                })
            }
            Change::AddEntity {
                entity: Entity::Laser(laser),
            } if laser.owner_id == self.player_id => Some(Request::Laser {
                id: laser.id.to_string(),
                direction: laser.direction.into(),
            }),
            _ => None,
        }
    }

    /// Applies one response. Callers hold the engine's write lock.
    pub fn apply(&mut self, state: &mut GameState, response: Response) -> Result<(), ProtocolError> {
        match response {
            Response::AddEntity { entity } => {
                let entity = Entity::try_from(entity)?;
                if let Entity::Laser(laser) = &entity {
                    // Our own lasers were added when we fired them.
                    if laser.owner_id == self.player_id {
                        return Ok(());
                    }
                }
                state.update_entity(entity);
            }
            Response::UpdateEntity { entity } => {
                let entity = Entity::try_from(entity)?;
                if let Entity::Player(player) = &entity {
                    if player.id == self.player_id
                        && self.recent_positions.contains(&player.position)
                    {
                        return Ok(());
                    }
                }
                state.update_entity(entity);
            }
            Response::RemoveEntity { id } => {
                state.remove_entity(protocol::parse_id(&id)?);
            }
            Response::PlayerRespawn {
                player,
                killed_by_id,
            } => {
                let player: shared::Player = player.try_into()?;
                let killer = protocol::parse_id(&killed_by_id)?;
                if player.id == self.player_id {
                    self.recent_positions.clear();
                }
                state.update_entity(player.into());
                state.add_score(killer);
            }
            Response::RoundOver {
                round_winner_id,
                new_round_at,
            } => {
                let winner = protocol::parse_id(&round_winner_id)?;
                state.set_round_over(winner, new_round_at);
            }
            Response::RoundStart { players } => {
                state.reset_round();
                self.recent_positions.clear();
                for player in players {
                    let player: shared::Player = player.try_into()?;
                    state.update_entity(player.into());
                }
            }
        }
        Ok(())
    }
}

/// Connection to a remote arena server
pub struct GameClient {
    socket: UdpSocket,
    server_addr: SocketAddr,
    token: String,
    mirror: Mirror,
}

impl GameClient {
    /// Joins the server as `player_id`. Returns the client and the snapshot
    /// of every entity on the server, the new player included.
    pub async fn connect(
        server: &str,
        player_id: Uuid,
        name: &str,
        password: &str,
    ) -> Result<(Self, Vec<Entity>), ClientError> {
        let server_addr = lookup_host(server)
            .await?
            .next()
            .ok_or_else(|| ClientError::UnknownHost(server.to_string()))?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        info!("Connecting to {} as {}", server_addr, name);
        let connect = Packet::Connect {
            id: player_id.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        };
        socket
            .send_to(&protocol::encode(&connect)?, server_addr)
            .await?;

        let mut buffer = vec![0u8; protocol::MAX_PACKET_SIZE];
        let (token, entities) = timeout(CONNECT_TIMEOUT, async {
            loop {
                let (len, _) = socket.recv_from(&mut buffer).await?;
                match protocol::decode(&buffer[..len])? {
                    Packet::Connected { token, entities } => return Ok((token, entities)),
                    Packet::Rejected { reason } => return Err(ClientError::Rejected(reason)),
                    other => debug!("Ignoring {:?} while connecting", other),
                }
            }
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        let entities = entities
            .into_iter()
            .map(Entity::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        info!("Connected with {} entities in the arena", entities.len());

        let client = Self {
            socket,
            server_addr,
            token,
            mirror: Mirror::new(player_id),
        };
        Ok((client, entities))
    }

    pub fn player_id(&self) -> Uuid {
        self.mirror.player_id()
    }

    async fn send(&self, packet: &Packet) -> Result<(), ClientError> {
        let data = protocol::encode(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, state: &RwLock<GameState>, packet: Packet) -> bool {
        match packet {
            Packet::Response(response) => {
                let mut state = state.write().await;
                if let Err(e) = self.mirror.apply(&mut state, response) {
                    warn!("Discarding response: {}", e);
                }
                true
            }
            Packet::Rejected { reason } => {
                warn!("Server closed the session: {}", reason);
                false
            }
            other => {
                debug!("Unexpected packet {:?}", other);
                true
            }
        }
    }

    /// Runs until `shutdown` fires or the server ends the session.
    ///
    /// `changes` is the local engine's change stream; changes made by the
    /// local player are forwarded to the server.
    pub async fn run(
        mut self,
        state: Arc<RwLock<GameState>>,
        mut changes: mpsc::Receiver<Change>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ClientError> {
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut buffer = vec![0u8; protocol::MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let (len, addr) = result?;
                    if addr != self.server_addr {
                        continue;
                    }
                    match protocol::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if !self.handle_packet(&state, packet).await {
                                return Ok(());
                            }
                        }
                        Err(e) => warn!("Discarding packet: {}", e),
                    }
                }

                change = changes.recv() => {
                    let change = match change {
                        Some(change) => change,
                        None => break,
                    };
                    if let Some(request) = self.mirror.outgoing_request(&change) {
                        let packet = Packet::Request {
                            token: self.token.clone(),
                            request,
                        };
                        self.send(&packet).await?;
                    }
                }

                _ = heartbeat.tick() => {
                    self.send(&Packet::Heartbeat { token: self.token.clone() }).await?;
                }

                _ = shutdown.changed() => break,
            }
        }

        info!("Leaving server");
        self.send(&Packet::Disconnect {
            token: self.token.clone(),
        })
        .await
    }
}
