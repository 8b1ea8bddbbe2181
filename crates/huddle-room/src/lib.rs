//! Room lifecycle management for Huddle.
//!
//! Each room runs as an isolated Tokio task (actor model) owning all of
//! its mutable state; the registry maps room ids to live rooms and
//! protocol names to room constructors.
//!
//! # Key types
//!
//! - [`RoomLogic`] — the trait a game protocol implements
//! - [`Registry`] — creates rooms, allocates ids, resolves lookups
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`Roster`] — the participant set a room's hooks observe
//! - [`Ask`] — the quiz protocol, the one concrete game today

pub mod ask;
mod error;
mod logic;
mod registry;
mod room;

pub use ask::Ask;
pub use error::RoomError;
pub use logic::{Recipient, RoomLogic};
pub use registry::Registry;
pub use room::{EventSender, RoomEvent, RoomHandle, RoomSummary, Roster};
