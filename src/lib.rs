//! Arena Game Server - authoritative session server for a multiplayer arena shooter
//!
//! - `game`: the single-owner session task and its rules (spawns, hits, kills, scoring)
//! - `ws`: WebSocket transport and the JSON wire protocol
//! - `sync`: client-side movement compression and interpolation helpers
//! - `http`: health and upgrade routes

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod sync;
pub mod util;
pub mod ws;
