//! # Huddle
//!
//! A real-time multiplayer session server: clients create and join named
//! rooms bound to a game protocol and exchange turn-based state over a
//! persistent WebSocket connection.
//!
//! This crate ties the layers together: transport → protocol → rooms.
//! The per-connection gateway lives here, as do the server accept loop
//! and the environment-driven configuration.

mod config;
mod error;
mod gateway;
mod server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{seed_debug_rooms, Server, ServerBuilder};
