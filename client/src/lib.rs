//! # Laser Arena Client Library
//!
//! Terminal client for the laser arena. The client runs its own copy of the
//! engine in mirror mode: local input is applied immediately, and the server's
//! responses overwrite whatever the server disagrees with.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Reads key presses on a background thread and maps them to move, fire and
//! quit commands.
//!
//! ### Network Module (`network`)
//! Joins a server over UDP, forwards the local player's actions as requests
//! and applies every response to the mirror engine. Echoes of positions the
//! client already predicted are skipped so the local player does not jitter.
//!
//! ### Rendering Module (`rendering`)
//! Draws the arena, every player and laser, the scoreboard and the round
//! banner with crossterm.

pub mod input;
pub mod network;
pub mod rendering;
