//! Session bookkeeping for connected players
//!
//! A session is created by a successful Connect and identified by a random
//! token the client echoes in every later packet. The manager enforces the
//! server's capacity and detects sessions that went quiet.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One connected client and the player it controls
#[derive(Debug, Clone)]
pub struct Session {
    /// Token handed out on connect
    pub token: Uuid,
    /// Entity id of the player this session controls
    pub player_id: Uuid,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Session {
    pub fn new(token: Uuid, player_id: Uuid, addr: SocketAddr) -> Self {
        Self {
            token,
            player_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the session as active. A client that roams to a new address
    /// keeps its session.
    pub fn touch(&mut self, addr: SocketAddr) {
        self.last_seen = Instant::now();
        self.addr = addr;
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all sessions, keyed by token
pub struct SessionManager {
    sessions: HashMap<Uuid, Session>,
    /// Maximum number of concurrent sessions allowed
    max_sessions: usize,
    /// Idle time after which a session is dropped
    timeout: Duration,
}

impl SessionManager {
    /// Creates an empty manager that admits at most `max_sessions` clients
    /// and drops those silent for longer than `timeout`.
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            timeout,
        }
    }

    /// Returns true if no further session can be opened
    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_sessions
    }

    /// Opens a session for `player_id` and returns its token, or None if the
    /// server is at capacity.
    pub fn add_session(&mut self, player_id: Uuid, addr: SocketAddr) -> Option<Uuid> {
        if self.is_full() {
            return None;
        }

        let token = Uuid::new_v4();
        info!("Session {} opened for player {} from {}", token, player_id, addr);
        self.sessions
            .insert(token, Session::new(token, player_id, addr));

        Some(token)
    }

    /// Closes the session, e.g. on Disconnect. Unknown tokens are ignored.
    pub fn remove_session(&mut self, token: &Uuid) -> Option<Session> {
        let session = self.sessions.remove(token)?;
        info!("Session {} closed", session.token);
        Some(session)
    }

    /// Looks up a session without marking it active
    pub fn get(&self, token: &Uuid) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Records activity on a session and returns the player it controls.
    pub fn touch(&mut self, token: &Uuid, addr: SocketAddr) -> Option<Uuid> {
        let session = self.sessions.get_mut(token)?;
        session.touch(addr);
        Some(session.player_id)
    }

    /// Removes and returns every session idle longer than the timeout
    pub fn check_timeouts(&mut self) -> Vec<Session> {
        let timed_out: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(self.timeout))
            .map(|session| session.token)
            .collect();

        timed_out
            .iter()
            .filter_map(|token| self.remove_session(token))
            .collect()
    }

    /// Token and address of every session, for broadcasting
    pub fn session_addrs(&self) -> Vec<(Uuid, SocketAddr)> {
        self.sessions
            .values()
            .map(|session| (session.token, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_sessions: usize) -> SessionManager {
        SessionManager::new(max_sessions, Duration::from_secs(30))
    }

    #[test]
    fn test_session_timeout() {
        let mut session = Session::new(Uuid::new_v4(), Uuid::new_v4(), test_addr());

        assert!(!session.is_timed_out(Duration::from_secs(1)));

        session.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(session.is_timed_out(Duration::from_secs(1)));

        session.touch(test_addr2());
        assert!(!session.is_timed_out(Duration::from_secs(1)));
        assert_eq!(session.addr, test_addr2());
    }

    #[test]
    fn test_manager_creation() {
        let manager = manager(5);
        assert_eq!(manager.max_sessions, 5);
        assert!(manager.is_empty());
        assert!(!manager.is_full());
    }

    #[test]
    fn test_add_sessions() {
        let mut manager = manager(3);
        let player1 = Uuid::new_v4();
        let player2 = Uuid::new_v4();

        let token1 = manager.add_session(player1, test_addr()).unwrap();
        let token2 = manager.add_session(player2, test_addr2()).unwrap();

        assert_ne!(token1, token2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get(&token1).unwrap().player_id, player1);
        assert_eq!(manager.get(&token2).unwrap().player_id, player2);
    }

    #[test]
    fn test_add_session_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_session(Uuid::new_v4(), test_addr()).is_some());
        assert!(manager.is_full());
        assert!(manager.add_session(Uuid::new_v4(), test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = manager(2);
        let player = Uuid::new_v4();
        let token = manager.add_session(player, test_addr()).unwrap();

        let removed = manager.remove_session(&token).unwrap();
        assert_eq!(removed.player_id, player);
        assert!(manager.is_empty());
        assert!(manager.remove_session(&token).is_none());
    }

    #[test]
    fn test_touch_unknown_token() {
        let mut manager = manager(2);
        assert_eq!(manager.touch(&Uuid::new_v4(), test_addr()), None);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = manager(3);
        let stale = manager.add_session(Uuid::new_v4(), test_addr()).unwrap();
        let fresh = manager.add_session(Uuid::new_v4(), test_addr2()).unwrap();

        manager.sessions.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(60);

        let removed = manager.check_timeouts();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].token, stale);
        assert!(manager.get(&fresh).is_some());
        assert_eq!(manager.session_addrs(), vec![(fresh, test_addr2())]);
    }
}
