//! Room registry: protocol constructors, id allocation, and lookups.

use std::collections::HashMap;

use huddle_protocol::RoomId;

use crate::room::spawn_room;
use crate::{RoomError, RoomHandle, RoomLogic};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Spawns a room actor for one protocol, given the id it will live under.
type Spawner = Box<dyn Fn(RoomId) -> RoomHandle + Send + Sync>;

/// Process-wide map of protocols and live rooms.
///
/// Explicitly constructed and handed to whoever builds the gateway — not
/// ambient global state — so tests can build isolated registries. Rooms
/// are never pruned: the map grows for the lifetime of the process.
pub struct Registry {
    protocols: HashMap<String, Spawner>,
    rooms: HashMap<RoomId, RoomHandle>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            protocols: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    /// Registers a protocol under a name. Last registration wins.
    ///
    /// The constructor receives the id the room will live under, which is
    /// how debug rooms learn their mode.
    pub fn register_protocol<L, F>(&mut self, name: &str, constructor: F)
    where
        L: RoomLogic,
        F: Fn(RoomId) -> L + Send + Sync + 'static,
    {
        let spawner: Spawner = Box::new(move |id: RoomId| {
            spawn_room(
                id.clone(),
                Box::new(constructor(id)),
                DEFAULT_CHANNEL_SIZE,
            )
        });
        self.protocols.insert(name.to_string(), spawner);
    }

    /// Creates a room for the named protocol and returns its fresh id.
    ///
    /// This is the only place new ids are allocated. A collision with an
    /// existing id (vanishingly rare at 36^6) regenerates rather than
    /// fails.
    pub fn create_room(
        &mut self,
        protocol: &str,
    ) -> Result<RoomId, RoomError> {
        let spawner = self.protocols.get(protocol).ok_or_else(|| {
            RoomError::UnknownProtocol(protocol.to_string())
        })?;

        let mut rng = rand::rng();
        let id = loop {
            let candidate = RoomId::random(&mut rng);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle = spawner(id.clone());
        self.rooms.insert(id.clone(), handle);
        tracing::info!(room_id = %id, protocol, "room created");
        Ok(id)
    }

    /// Creates a room under a caller-chosen id (debug rooms), replacing
    /// any existing room with that id.
    pub fn seed_room(
        &mut self,
        protocol: &str,
        id: RoomId,
    ) -> Result<(), RoomError> {
        let spawner = self.protocols.get(protocol).ok_or_else(|| {
            RoomError::UnknownProtocol(protocol.to_string())
        })?;

        let handle = spawner(id.clone());
        self.rooms.insert(id.clone(), handle);
        tracing::info!(room_id = %id, protocol, "room seeded");
        Ok(())
    }

    /// Looks up a live room by id.
    pub fn lookup(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(id).cloned()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
