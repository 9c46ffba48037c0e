//! # Arena Server Library
//!
//! Authoritative server for the laser arena. It owns the only engine whose
//! collision, respawn and scoring decisions are binding; every client runs a
//! non-authoritative mirror fed by this server's responses.
//!
//! ## Responsibilities
//!
//! ### Session Admission
//! A `Connect` is validated in a fixed order (capacity, player id, password,
//! duplicate id, name) and either rejected with a reason or answered with a
//! session token plus a snapshot of every entity.
//!
//! ### Request Translation
//! Move and laser requests become engine actions tagged with the session's
//! player. Client timestamps are clamped to the server clock before the
//! engine's throttles see them.
//!
//! ### Change Broadcasting
//! Every engine change maps to exactly one wire response, sent to all
//! sessions. A session whose send fails is closed after the broadcast.
//!
//! ## Module Organization
//!
//! - `session_manager`: session table, capacity limit and idle timeouts
//! - `network`: UDP transport, the main server loop and packet handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use shared::{Game, GameConfig, GameMap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = Game::new(GameMap::default_arena(), GameConfig::default());
//!     let mut server = Server::new("127.0.0.1:8080", game, ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod session_manager;

pub use network::{ConnectError, Server, ServerConfig};
