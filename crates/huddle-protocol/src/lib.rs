//! Wire protocol for Huddle.
//!
//! This crate defines the language that clients and the server speak:
//!
//! - **Types** ([`ClientFrame`], [`Request`], [`ServerFrame`], [`Reply`],
//!   [`ReadySignal`]) — the frames that travel on the wire, plus the
//!   [`RoomId`]/[`ParticipantId`] identity newtypes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames are converted
//!   to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! The protocol layer sits between transport (raw frames) and the room
//! layer (participants and game state). It doesn't know about connections
//! or rooms — it only knows how to describe and serialize messages.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    codes, ClientFrame, ParticipantId, ReadySignal, Reply, Request, RoomId,
    ServerFrame,
};
