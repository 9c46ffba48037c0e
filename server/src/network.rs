//! Server network layer: UDP transport, session admission and the bridge
//! between wire packets and the authoritative engine

use crate::session_manager::SessionManager;
use log::{debug, error, info, warn};
use shared::protocol::{self, WireEntity, MAX_PACKET_SIZE};
use shared::{
    timestamp_millis, Change, Game, LaserAction, MoveAction, Packet, Player, Request,
    Response, MAX_NAME_LEN,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub const DEFAULT_MAX_CLIENTS: usize = 8;
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reasons a Connect is refused, checked in declaration order
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("the server is full")]
    ServerFull,
    #[error("invalid player id provided")]
    InvalidId,
    #[error("invalid password provided")]
    InvalidPassword,
    #[error("duplicate player id provided")]
    DuplicatePlayer,
    #[error("invalid name provided")]
    InvalidName,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub password: String,
    pub max_clients: usize,
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            max_clients: DEFAULT_MAX_CLIENTS,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    SessionTimeout { token: Uuid, player_id: Uuid },
    SendFailed { token: Uuid },
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutgoingMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// Names are 1 to 16 ASCII letters or digits
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Authoritative arena server
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    game: Game,
    changes: mpsc::Receiver<Change>,
    password: String,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<OutgoingMessage>>,
}

impl Server {
    /// Binds the socket and starts the engine loops of `game`.
    pub async fn new(
        addr: &str,
        mut game: Game,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let changes = game
            .take_changes()
            .ok_or("engine change stream already taken")?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        game.start();

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            game,
            changes,
            password: config.password,
            server_tx,
            server_rx,
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match protocol::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Discarding packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing queue. Sessions whose send fails
    /// are reported back once the whole broadcast went out.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();
        let mut outgoing_rx = match self.outgoing_rx.take() {
            Some(rx) => rx,
            None => return,
        };

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                match message {
                    OutgoingMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutgoingMessage::BroadcastPacket { packet } => {
                        let data = match protocol::encode(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast: {}", e);
                                continue;
                            }
                        };
                        let session_addrs = sessions.read().await.session_addrs();

                        let mut failed = Vec::new();
                        for (token, addr) in session_addrs {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to session {}: {}", token, e);
                                failed.push(token);
                            }
                        }
                        for token in failed {
                            let _ = server_tx.send(ServerMessage::SendFailed { token });
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors session timeouts
    fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = sessions.write().await.check_timeouts();
                for session in timed_out {
                    info!("Session {} timed out", session.token);
                    let message = ServerMessage::SessionTimeout {
                        token: session.token,
                        player_id: session.player_id,
                    };
                    if server_tx.send(message).is_err() {
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outgoing_tx
            .send(OutgoingMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast(&self, response: Response) {
        let packet = Packet::Response(response);
        if let Err(e) = self
            .outgoing_tx
            .send(OutgoingMessage::BroadcastPacket { packet })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Validates a Connect and registers the new player.
    ///
    /// Returns the session token and a snapshot of every entity, the new
    /// player included.
    async fn connect(
        &self,
        id: &str,
        name: &str,
        password: &str,
        addr: SocketAddr,
    ) -> Result<(Uuid, Vec<WireEntity>), ConnectError> {
        if self.sessions.read().await.is_full() {
            return Err(ConnectError::ServerFull);
        }
        let player_id = protocol::parse_id(id).map_err(|_| ConnectError::InvalidId)?;
        if password != self.password {
            return Err(ConnectError::InvalidPassword);
        }
        if self.game.read().await.contains_entity(player_id) {
            return Err(ConnectError::DuplicatePlayer);
        }
        if !is_valid_name(name) {
            return Err(ConnectError::InvalidName);
        }

        let player = Player::new(player_id, name, self.game.map().random_spawn_point());
        let entities = {
            let mut state = self.game.write().await;
            state.add_entity(player.clone().into());
            state.entities().map(WireEntity::from).collect()
        };

        let token = match self.sessions.write().await.add_session(player_id, addr) {
            Some(token) => token,
            None => {
                self.game.write().await.remove_entity(player_id);
                return Err(ConnectError::ServerFull);
            }
        };

        info!("Player {} ({}) joined from {}", player.name, player_id, addr);
        self.broadcast(Response::AddEntity {
            entity: WireEntity::Player((&player).into()),
        });
        Ok((token, entities))
    }

    /// Turns a client request into an engine action stamped with the
    /// server's clock.
    async fn handle_request(&self, player_id: Uuid, request: Request) {
        let created = timestamp_millis();
        match request {
            Request::Move { direction } => {
                let action = MoveAction::new(player_id, direction.into(), created);
                self.game.submit_action(action.into()).await;
            }
            Request::Laser { id, direction } => {
                let laser_id = match protocol::parse_id(&id) {
                    Ok(laser_id) => laser_id,
                    Err(e) => {
                        warn!("Discarding laser from {}: {}", player_id, e);
                        return;
                    }
                };
                if self.game.read().await.contains_entity(laser_id) {
                    warn!("Discarding laser from {}: duplicate id {}", player_id, laser_id);
                    return;
                }
                let action = LaserAction::new(laser_id, player_id, direction.into(), created);
                self.game.submit_action(action.into()).await;
            }
        }
    }

    /// Removes a player's entity and tells everyone it is gone.
    async fn remove_player(&self, player_id: Uuid) {
        if self.game.write().await.remove_entity(player_id).is_some() {
            self.broadcast(Response::RemoveEntity {
                id: player_id.to_string(),
            });
        }
    }

    async fn close_session(&self, token: Uuid) {
        let session = self.sessions.write().await.remove_session(&token);
        if let Some(session) = session {
            self.remove_player(session.player_id).await;
        }
    }

    /// Processes one incoming packet
    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { id, name, password } => {
                info!("Player {} connecting from {}", name, addr);
                let response = match self.connect(&id, &name, &password, addr).await {
                    Ok((token, entities)) => Packet::Connected {
                        token: token.to_string(),
                        entities,
                    },
                    Err(e) => {
                        warn!("Rejected connect from {}: {}", addr, e);
                        Packet::Rejected {
                            reason: e.to_string(),
                        }
                    }
                };
                self.send_packet(response, addr);
            }

            Packet::Request { token, request } => {
                match self.session_player(&token, addr).await {
                    Some(player_id) => self.handle_request(player_id, request).await,
                    None => warn!("Discarding request with unknown token from {}", addr),
                }
            }

            Packet::Heartbeat { token } => {
                if self.session_player(&token, addr).await.is_none() {
                    debug!("Heartbeat with unknown token from {}", addr);
                }
            }

            Packet::Disconnect { token } => {
                if let Ok(token) = protocol::parse_id(&token) {
                    self.close_session(token).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Resolves a token to its player and records activity.
    async fn session_player(&self, token: &str, addr: SocketAddr) -> Option<Uuid> {
        let token = protocol::parse_id(token).ok()?;
        self.sessions.write().await.touch(&token, addr)
    }

    /// Main server loop: incoming packets, engine changes and session
    /// housekeeping
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::SessionTimeout { player_id, .. }) => {
                            self.remove_player(player_id).await;
                        }
                        Some(ServerMessage::SendFailed { token }) => {
                            self.close_session(token).await;
                        }
                        None => break,
                    }
                }

                change = self.changes.recv() => {
                    match change {
                        Some(change) => self.broadcast(Response::from(&change)),
                        None => break,
                    }
                }
            }
        }

        info!("Server shutting down");
        self.game.shutdown();
        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = protocol::encode(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Coordinate, Direction, Entity, GameConfig, GameMap, Identifier};
    use tokio_test::assert_ok;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    async fn test_server(max_clients: usize) -> Server {
        let map = GameMap::parse(&[
            format!("S{}S", " ".repeat(18)),
            " ".repeat(20),
            " ".repeat(20),
        ])
        .unwrap();
        let config = GameConfig {
            change_channel_capacity: 64,
            ..GameConfig::default()
        };
        let server_config = ServerConfig {
            password: "secret".to_string(),
            max_clients,
            ..ServerConfig::default()
        };
        Server::new("127.0.0.1:0", Game::new(map, config), server_config)
            .await
            .unwrap()
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("Alice"));
        assert!(is_valid_name("bot7"));
        assert!(is_valid_name(&"a".repeat(MAX_NAME_LEN)));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(&"a".repeat(MAX_NAME_LEN + 1)));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name("émile"));
    }

    #[test]
    fn test_connect_error_messages() {
        assert_eq!(ConnectError::ServerFull.to_string(), "the server is full");
        assert_eq!(
            ConnectError::InvalidPassword.to_string(),
            "invalid password provided"
        );
    }

    #[tokio::test]
    async fn test_connect_registers_player() {
        let server = test_server(4).await;
        let id = Uuid::new_v4();

        let (token, entities) =
            assert_ok!(server.connect(&id.to_string(), "Alice", "secret", test_addr()).await);

        assert_eq!(entities.len(), 1);
        let state = server.game.read().await;
        let player = state.player(id).unwrap();
        assert_eq!(player.name, "Alice");
        assert!(state.map().spawn_points().contains(&player.position));
        assert_eq!(
            server.sessions.read().await.get(&token).unwrap().player_id,
            id
        );
    }

    #[tokio::test]
    async fn test_connect_validation_order() {
        let server = test_server(1).await;
        let taken = Uuid::new_v4();
        server
            .connect(&taken.to_string(), "Alice", "secret", test_addr())
            .await
            .unwrap();

        // Capacity is checked before anything else.
        assert_eq!(
            server.connect("garbage", "!!", "wrong", test_addr()).await,
            Err(ConnectError::ServerFull)
        );

        let server = test_server(4).await;
        server
            .connect(&taken.to_string(), "Alice", "secret", test_addr())
            .await
            .unwrap();
        assert_eq!(
            server.connect("garbage", "!!", "wrong", test_addr()).await,
            Err(ConnectError::InvalidId)
        );
        assert_eq!(
            server
                .connect(&taken.to_string(), "!!", "wrong", test_addr())
                .await,
            Err(ConnectError::InvalidPassword)
        );
        assert_eq!(
            server
                .connect(&taken.to_string(), "!!", "secret", test_addr())
                .await,
            Err(ConnectError::DuplicatePlayer)
        );
        assert_eq!(
            server
                .connect(&Uuid::new_v4().to_string(), "no spaces", "secret", test_addr())
                .await,
            Err(ConnectError::InvalidName)
        );
        assert_eq!(server.game.read().await.players().count(), 1);
    }

    #[tokio::test]
    async fn test_move_burst_is_throttled() {
        let server = test_server(4).await;
        let id = Uuid::new_v4();
        server
            .connect(&id.to_string(), "Alice", "secret", test_addr())
            .await
            .unwrap();
        let spawn = server.game.read().await.player(id).unwrap().position;

        // Spawns sit on the top row, so down is always open.
        for _ in 0..2 {
            server
                .handle_request(
                    id,
                    Request::Move {
                        direction: Direction::Down.into(),
                    },
                )
                .await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let position = server.game.read().await.player(id).unwrap().position;
        assert_eq!(position, Coordinate::new(spawn.x, spawn.y + 1));
    }

    #[tokio::test]
    async fn test_laser_is_stamped_with_server_time() {
        let server = test_server(4).await;
        let id = Uuid::new_v4();
        server
            .connect(&id.to_string(), "Alice", "secret", test_addr())
            .await
            .unwrap();
        let spawn = server.game.read().await.player(id).unwrap().position;
        let direction = if spawn.x == 0 {
            Direction::Right
        } else {
            Direction::Left
        };

        let before = timestamp_millis();
        let laser_id = Uuid::new_v4();
        server
            .handle_request(
                id,
                Request::Laser {
                    id: laser_id.to_string(),
                    direction: direction.into(),
                },
            )
            .await;
        let after = timestamp_millis();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let state = server.game.read().await;
        match state.get_entity(laser_id) {
            Some(Entity::Laser(laser)) => {
                assert!(laser.created >= before && laser.created <= after)
            }
            other => panic!("Unexpected entity {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_laser_id_is_discarded() {
        let server = test_server(4).await;
        let id = Uuid::new_v4();
        server
            .connect(&id.to_string(), "Alice", "secret", test_addr())
            .await
            .unwrap();

        server
            .handle_request(
                id,
                Request::Laser {
                    id: "nope".to_string(),
                    direction: protocol::WireDirection::Up,
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = server.game.read().await;
        assert!(state.entities().all(|entity| entity.id() == id));
    }

    #[tokio::test]
    async fn test_close_session_removes_player() {
        let server = test_server(4).await;
        let id = Uuid::new_v4();
        let (token, _) =
            assert_ok!(server.connect(&id.to_string(), "Alice", "secret", test_addr()).await);

        server.close_session(token).await;

        assert!(server.sessions.read().await.is_empty());
        assert!(!server.game.read().await.contains_entity(id));
    }
}
