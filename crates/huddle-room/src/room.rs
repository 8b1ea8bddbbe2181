//! Room actor: an isolated Tokio task that owns one room's state.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands are processed strictly in arrival
//! order, which is the whole concurrency story for a single room: no two
//! mutations of the same room ever interleave. Distinct rooms run freely
//! in parallel.

use std::collections::{HashMap, HashSet};

use huddle_protocol::{ParticipantId, ReadySignal, RoomId};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{Recipient, RoomError, RoomLogic};

/// The set of participants currently in a room.
///
/// Mutation is crate-private: only the room actor, which *is* the
/// transport-level membership, may insert or remove. Protocol hooks get a
/// shared reference, so the participant set can never drift from the
/// membership that produced the hook call.
#[derive(Debug, Default)]
pub struct Roster {
    members: HashSet<ParticipantId>,
}

impl Roster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of connected participants.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the given participant is connected.
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.members.contains(&participant)
    }

    /// Iterates over connected participants (unspecified order).
    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.members.iter().copied()
    }

    pub(crate) fn insert(&mut self, participant: ParticipantId) -> bool {
        self.members.insert(participant)
    }

    pub(crate) fn remove(&mut self, participant: ParticipantId) -> bool {
        self.members.remove(&participant)
    }
}

/// An outbound event from a room to a participant's connection handler.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A status projection to deliver as a `status` event.
    Status(Value),
}

/// Channel sender for delivering outbound events to a participant.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// A snapshot of room metadata, used for join arbitration.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    /// The room's id.
    pub id: RoomId,
    /// The protocol tag the room speaks.
    pub protocol: String,
    /// Whether the room currently accepts joins.
    pub joinable: bool,
    /// Number of connected participants.
    pub participants: usize,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Add a participant. Validates the requested protocol and current
    /// joinability atomically with the insertion.
    Join {
        participant: ParticipantId,
        protocol: String,
        sender: EventSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a participant. A no-op for non-members.
    Leave { participant: ParticipantId },

    /// Deliver a readiness signal.
    Ready {
        participant: ParticipantId,
        signal: ReadySignal,
    },

    /// Send the current status projection to one participant.
    Status { participant: ParticipantId },

    /// Request room metadata.
    Summary {
        reply: oneshot::Sender<RoomSummary>,
    },
}

/// Handle to a running room actor. Cheap to clone — an `mpsc::Sender`
/// wrapper. The registry holds one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Asks the room to admit a participant under the given protocol.
    pub async fn join(
        &self,
        participant: ParticipantId,
        protocol: &str,
        sender: EventSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                participant,
                protocol: protocol.to_string(),
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?
    }

    /// Notifies the room that a participant left (fire-and-forget,
    /// idempotent).
    pub async fn leave(
        &self,
        participant: ParticipantId,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Leave { participant })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Delivers a readiness signal (fire-and-forget; the room answers
    /// with a broadcast).
    pub async fn ready(
        &self,
        participant: ParticipantId,
        signal: ReadySignal,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Ready {
                participant,
                signal,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Asks the room to send its status projection to one participant.
    pub async fn status(
        &self,
        participant: ParticipantId,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Status { participant })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Requests the current room metadata.
    pub async fn summary(&self) -> Result<RoomSummary, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Summary { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    id: RoomId,
    roster: Roster,
    /// Per-participant outbound channels.
    senders: HashMap<ParticipantId, EventSender>,
    logic: Box<dyn RoomLogic>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until every handle is dropped.
    ///
    /// The registry never prunes rooms, so in practice a room task lives
    /// for the rest of the process.
    async fn run(mut self) {
        tracing::info!(
            room_id = %self.id,
            protocol = self.logic.protocol(),
            "room started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    participant,
                    protocol,
                    sender,
                    reply,
                } => {
                    let result =
                        self.handle_join(participant, &protocol, sender);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { participant } => {
                    self.handle_leave(participant);
                }
                RoomCommand::Ready {
                    participant,
                    signal,
                } => {
                    self.handle_ready(participant, signal);
                }
                RoomCommand::Status { participant } => {
                    self.handle_status(participant);
                }
                RoomCommand::Summary { reply } => {
                    let _ = reply.send(self.summary());
                }
            }
        }

        tracing::info!(room_id = %self.id, "room stopped");
    }

    fn handle_join(
        &mut self,
        participant: ParticipantId,
        protocol: &str,
        sender: EventSender,
    ) -> Result<(), RoomError> {
        if self.logic.protocol() != protocol {
            return Err(RoomError::ProtocolMismatch {
                room: self.id.clone(),
                actual: self.logic.protocol().to_string(),
                requested: protocol.to_string(),
            });
        }
        if !self.logic.joinable() {
            return Err(RoomError::NotJoinable(self.id.clone()));
        }

        self.roster.insert(participant);
        self.senders.insert(participant, sender);
        tracing::info!(
            room_id = %self.id,
            %participant,
            participants = self.roster.len(),
            "participant joined"
        );

        let msgs = self.logic.on_join(participant, &self.roster);
        self.dispatch(msgs);
        Ok(())
    }

    fn handle_leave(&mut self, participant: ParticipantId) {
        if !self.roster.remove(participant) {
            return;
        }
        self.senders.remove(&participant);
        tracing::info!(
            room_id = %self.id,
            %participant,
            participants = self.roster.len(),
            "participant left"
        );

        let msgs = self.logic.on_leave(participant, &self.roster);
        self.dispatch(msgs);
    }

    fn handle_ready(
        &mut self,
        participant: ParticipantId,
        signal: ReadySignal,
    ) {
        if !self.roster.contains(participant) {
            tracing::warn!(
                room_id = %self.id,
                %participant,
                "ready signal from non-member, ignoring"
            );
            return;
        }

        let msgs = self.logic.on_ready(participant, signal, &self.roster);
        self.dispatch(msgs);
    }

    fn handle_status(&self, participant: ParticipantId) {
        if !self.roster.contains(participant) {
            return;
        }
        let projection = self.logic.status(&self.roster);
        self.send_to(participant, RoomEvent::Status(projection));
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            protocol: self.logic.protocol().to_string(),
            joinable: self.logic.joinable(),
            participants: self.roster.len(),
        }
    }

    /// Delivers projections to their recipients.
    fn dispatch(&self, msgs: Vec<(Recipient, Value)>) {
        for (recipient, projection) in msgs {
            match recipient {
                Recipient::All => {
                    for participant in self.roster.iter() {
                        self.send_to(
                            participant,
                            RoomEvent::Status(projection.clone()),
                        );
                    }
                }
                Recipient::Participant(participant) => {
                    self.send_to(
                        participant,
                        RoomEvent::Status(projection),
                    );
                }
            }
        }
    }

    /// Sends an event to a single participant. Silently drops if the
    /// receiver is gone (connection mid-close).
    fn send_to(&self, participant: ParticipantId, event: RoomEvent) {
        if let Some(sender) = self.senders.get(&participant) {
            let _ = sender.send(event);
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate
/// with it.
pub(crate) fn spawn_room(
    room_id: RoomId,
    logic: Box<dyn RoomLogic>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        id: room_id.clone(),
        roster: Roster::new(),
        senders: HashMap::new(),
        logic,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
