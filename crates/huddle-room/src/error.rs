//! Error types for the room layer.

use huddle_protocol::{codes, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No protocol is registered under this name.
    #[error("no protocol registered as {0:?}")]
    UnknownProtocol(String),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room exists but speaks a different protocol than requested.
    #[error("room {room} speaks {actual}, not {requested}")]
    ProtocolMismatch {
        room: RoomId,
        actual: String,
        requested: String,
    },

    /// The room is not accepting new participants right now.
    #[error("room {0} is not accepting joins")]
    NotJoinable(RoomId),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The error code carried in the acknowledgement for this failure.
    pub fn wire_code(&self) -> &'static str {
        match self {
            RoomError::UnknownProtocol(_)
            | RoomError::ProtocolMismatch { .. } => codes::INVALID_PROTOCOL,
            RoomError::NotFound(_) | RoomError::Unavailable(_) => {
                codes::INVALID_ROOM
            }
            RoomError::NotJoinable(_) => codes::NOT_JOINABLE,
        }
    }
}
