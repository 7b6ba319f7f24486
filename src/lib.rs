//! Snowfight Server - authoritative real-time snowball arena
//!
//! The library holds the simulation and its transport; `main.rs` wires it up:
//! - `game`: world state, bots, collisions and the fixed-rate tick scheduler
//! - `store`: persisted bot skill progression
//! - `ws` / `http`: websocket sessions, health and bot stats endpoints

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod store;
pub mod util;
pub mod ws;
