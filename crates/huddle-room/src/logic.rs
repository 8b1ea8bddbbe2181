//! The `RoomLogic` trait — the extension point for game protocols.
//!
//! A protocol implements this trait and registers a constructor with the
//! [`Registry`](crate::Registry); the room actor calls the hooks at the
//! right time. The actor owns the participant set ([`Roster`]) and keeps
//! it in step with transport membership before any hook runs, so an
//! implementation can't forget the bookkeeping — it only layers game
//! behavior on top.

use huddle_protocol::{ParticipantId, ReadySignal};
use serde_json::Value;

use crate::Roster;

/// Where an outbound status projection should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every participant in the room.
    All,

    /// One specific participant.
    Participant(ParticipantId),
}

/// The capability set of a room protocol.
///
/// Hooks return `(Recipient, projection)` pairs; the actor delivers them.
/// The roster passed in already reflects the membership change that
/// triggered the hook.
///
/// Object-safe on purpose: the registry holds many protocols behind one
/// name-keyed map, and a room actor owns its logic as `Box<dyn RoomLogic>`.
pub trait RoomLogic: Send + 'static {
    /// The protocol tag this room speaks (e.g. `"ASK"`).
    fn protocol(&self) -> &'static str;

    /// Whether new participants may join right now.
    fn joinable(&self) -> bool {
        true
    }

    /// Called after a participant has been added to the roster.
    fn on_join(
        &mut self,
        _participant: ParticipantId,
        _roster: &Roster,
    ) -> Vec<(Recipient, Value)> {
        Vec::new()
    }

    /// Called after a participant has been removed from the roster.
    fn on_leave(
        &mut self,
        _participant: ParticipantId,
        _roster: &Roster,
    ) -> Vec<(Recipient, Value)> {
        Vec::new()
    }

    /// Handles a readiness signal from a participant.
    fn on_ready(
        &mut self,
        participant: ParticipantId,
        signal: ReadySignal,
        roster: &Roster,
    ) -> Vec<(Recipient, Value)>;

    /// The current status projection, for a direct query.
    fn status(&self, roster: &Roster) -> Value;
}
