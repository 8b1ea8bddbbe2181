//! Core wire types: identities, requests, and the frames that carry them.
//!
//! Every request a client makes is a [`ClientFrame`]; everything the server
//! sends back is a [`ServerFrame`]. Acknowledgements are correlated by the
//! client-chosen `seq` number, because several requests may be in flight on
//! one connection at a time.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant.
///
/// Participant identity is connection identity: the server mints one of
/// these per accepted connection and it never outlives the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}", self.0)
    }
}

/// A room identifier: six characters drawn from `0-9A-Z`.
///
/// Ids are case-insensitive from the caller's perspective and canonically
/// stored upper-case — [`RoomId::normalized`] is the only way to build one
/// from client input. Debug rooms use fixed ids outside the random format
/// (`DEBUG`, `DEBUG:RESULT`, ...), which is why the inner value is a plain
/// string rather than a fixed-size array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

/// Alphabet for generated room ids: digits and uppercase letters.
const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of generated room ids.
const ID_LEN: usize = 6;

impl RoomId {
    /// Generates a fresh random id.
    ///
    /// Collision checking is the caller's job — the registry regenerates
    /// until the id is unused.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..ID_LEN)
            .map(|_| {
                ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char
            })
            .collect();
        Self(id)
    }

    /// Canonicalizes a caller-supplied id (ids are case-insensitive).
    pub fn normalized(raw: &str) -> Self {
        Self(raw.to_ascii_uppercase())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A readiness signal, with its stage-dependent payload.
///
/// `data` is deliberately untyped here: its schema depends on the room's
/// current stage and is validated at the room boundary, not at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadySignal {
    /// `true` to enter the ready set, `false` to withdraw.
    /// Absent on the wire means not ready.
    #[serde(default)]
    pub ready: bool,

    /// Stage-dependent payload (a question text, a list of answers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A client request.
///
/// `new`/`join`/`leave`/`room` are acknowledged; `ready`/`status` are not
/// (`ready` answers with a room-wide `status` broadcast, `status` with a
/// direct `status` event).
///
/// The `protocol`/`room` fields of `new` and `join` are `Option` on
/// purpose: required-field presence is a *validation* concern surfaced as
/// `MISSING_FIELDS`, not a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Create a room for the named protocol.
    New {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },

    /// Join an existing room, asserting its protocol.
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },

    /// Leave the current room, if any.
    Leave,

    /// Query which room this connection is bound to.
    Room,

    /// Signal readiness to the bound room. The signal's fields sit at the
    /// same level as the tag (internally tagged newtype variant).
    Ready(ReadySignal),

    /// Ask the bound room for a direct status projection.
    Status,
}

/// Top-level client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Correlation number echoed in the acknowledgement. Client-chosen.
    #[serde(default)]
    pub seq: u64,

    /// The request itself.
    pub request: Request,
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Fixed error codes carried in error replies.
///
/// The "already in room" rejection is not listed here — its code is the
/// dynamic message `already in room <ID>`.
pub mod codes {
    pub const MISSING_FIELDS: &str = "MISSING_FIELDS";
    pub const INVALID_PROTOCOL: &str = "INVALID_PROTOCOL";
    pub const INVALID_ROOM: &str = "INVALID_ROOM";
    pub const NOT_JOINABLE: &str = "NOT_JOINABLE";
    pub const NOT_IN_ROOM: &str = "NOT_IN_ROOM";
}

/// The acknowledgement body for an acked request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    /// The request succeeded. `id` is present for `new`/`join`/`room`.
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RoomId>,
    },

    /// The request failed. `fields` names what was missing for
    /// `MISSING_FIELDS` and is omitted otherwise.
    Error {
        code: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<String>,
    },
}

impl Reply {
    /// A bare success (for `leave`).
    pub fn ok() -> Self {
        Reply::Ok { id: None }
    }

    /// A success carrying a room id.
    pub fn ok_id(id: RoomId) -> Self {
        Reply::Ok { id: Some(id) }
    }

    /// A failure with the given code.
    pub fn error(code: impl Into<String>) -> Self {
        Reply::Error {
            code: code.into(),
            fields: Vec::new(),
        }
    }

    /// The `MISSING_FIELDS` failure, naming the absent fields.
    pub fn missing_fields(fields: Vec<String>) -> Self {
        Reply::Error {
            code: codes::MISSING_FIELDS.to_string(),
            fields,
        }
    }
}

/// Top-level server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Acknowledgement of an acked request, correlated by `seq`.
    Ack { seq: u64, reply: Reply },

    /// A stage projection — either a room-wide broadcast or the direct
    /// answer to a `status` query. The payload shape is protocol-defined.
    Status { data: serde_json::Value },
}

// =========================================================================
// Tests
// =========================================================================
