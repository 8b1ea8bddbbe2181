//! Per-connection gateway: request dispatch and room binding.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The only state it keeps is the one scalar the contract allows: which
//! room (if any) this connection is currently bound to. Everything else —
//! participant bookkeeping, stage state, broadcasts — lives in the room
//! actors, reached through handles.

use std::sync::Arc;

use huddle_protocol::{
    codes, ClientFrame, Codec, ParticipantId, Reply, Request, RoomId,
    ServerFrame,
};
use huddle_room::{EventSender, RoomEvent, RoomHandle};
use huddle_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::ServerError;

/// The room a connection is currently bound to.
struct Binding {
    room: RoomId,
    handle: RoomHandle,
}

/// Clears the room binding when the connection task exits.
///
/// `Drop` also runs when the task panics, so the leave notification —
/// and with it the room's participant and readiness bookkeeping — cannot
/// be skipped by an abnormal exit. `Drop` is synchronous, so the actual
/// leave is a fire-and-forget task.
struct LeaveGuard {
    participant: ParticipantId,
    binding: Option<Binding>,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            let participant = self.participant;
            tokio::spawn(async move {
                let _ = binding.handle.leave(participant).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    mut conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ServerError> {
    let participant = ParticipantId(conn.id().into_inner());
    tracing::debug!(%participant, "handling new connection");

    // Rooms push status events here; the loop below forwards them to the
    // socket. The same channel is handed to every room this connection
    // joins over its lifetime.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut guard = LeaveGuard {
        participant,
        binding: None,
    };

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%participant, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%participant, error = %e, "recv error");
                        break;
                    }
                };

                let frame: ClientFrame = match state.codec.decode(&data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(
                            %participant, error = %e, "failed to decode frame"
                        );
                        continue;
                    }
                };

                handle_request(
                    &conn, &state, participant, &event_tx, &mut guard, frame,
                )
                .await?;
            }

            event = event_rx.recv() => {
                // The sender half lives in this task, so the channel
                // cannot close while we're here.
                if let Some(RoomEvent::Status(data)) = event {
                    send_frame(
                        &conn,
                        &state.codec,
                        &ServerFrame::Status { data },
                    )
                    .await?;
                }
            }
        }
    }

    // guard drops here → the leave notification fires for any bound room.
    Ok(())
}

/// Dispatches one decoded request.
async fn handle_request<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    participant: ParticipantId,
    event_tx: &EventSender,
    guard: &mut LeaveGuard,
    frame: ClientFrame,
) -> Result<(), ServerError> {
    let seq = frame.seq;
    match frame.request {
        Request::New { protocol } => {
            let Some(protocol) = protocol else {
                let reply =
                    Reply::missing_fields(vec!["protocol".to_string()]);
                return ack(conn, state, seq, reply).await;
            };

            let result = state.registry.lock().await.create_room(&protocol);
            let reply = match result {
                Ok(id) => Reply::ok_id(id),
                Err(e) => Reply::error(e.wire_code()),
            };
            ack(conn, state, seq, reply).await
        }

        Request::Join { room, protocol } => {
            // All absent fields are reported together.
            let (room, protocol) = match (room, protocol) {
                (Some(room), Some(protocol)) => (room, protocol),
                (room, protocol) => {
                    let mut missing = Vec::new();
                    if room.is_none() {
                        missing.push("room".to_string());
                    }
                    if protocol.is_none() {
                        missing.push("protocol".to_string());
                    }
                    let reply = Reply::missing_fields(missing);
                    return ack(conn, state, seq, reply).await;
                }
            };

            let room_id = RoomId::normalized(&room);

            // Lock only for the lookup; the lock is released before any
            // room I/O below.
            let found = state.registry.lock().await.lookup(&room_id);
            let Some(handle) = found else {
                let reply = Reply::error(codes::INVALID_ROOM);
                return ack(conn, state, seq, reply).await;
            };

            let summary = match handle.summary().await {
                Ok(summary) => summary,
                Err(e) => {
                    let reply = Reply::error(e.wire_code());
                    return ack(conn, state, seq, reply).await;
                }
            };
            if summary.protocol != protocol {
                let reply = Reply::error(codes::INVALID_PROTOCOL);
                return ack(conn, state, seq, reply).await;
            }
            if !summary.joinable {
                let reply = Reply::error(codes::NOT_JOINABLE);
                return ack(conn, state, seq, reply).await;
            }

            match &guard.binding {
                Some(binding) if binding.room != room_id => {
                    let reply = Reply::error(format!(
                        "already in room {}",
                        binding.room
                    ));
                    return ack(conn, state, seq, reply).await;
                }
                Some(_) => {
                    // Already bound to this very room; nothing to redo.
                    return ack(conn, state, seq, Reply::ok_id(room_id))
                        .await;
                }
                None => {}
            }

            match handle
                .join(participant, &protocol, event_tx.clone())
                .await
            {
                Ok(()) => {
                    guard.binding = Some(Binding {
                        room: room_id.clone(),
                        handle,
                    });
                    ack(conn, state, seq, Reply::ok_id(room_id)).await
                }
                // Lost a race with another connection flipping the
                // room's joinability between summary and join.
                Err(e) => {
                    ack(conn, state, seq, Reply::error(e.wire_code())).await
                }
            }
        }

        Request::Leave => {
            if let Some(binding) = guard.binding.take() {
                let _ = binding.handle.leave(participant).await;
            }
            ack(conn, state, seq, Reply::ok()).await
        }

        Request::Room => {
            let reply = match &guard.binding {
                Some(binding) => Reply::ok_id(binding.room.clone()),
                None => Reply::error(codes::NOT_IN_ROOM),
            };
            ack(conn, state, seq, reply).await
        }

        Request::Ready(signal) => {
            match &guard.binding {
                Some(binding) => {
                    let _ = binding.handle.ready(participant, signal).await;
                }
                None => {
                    tracing::debug!(
                        %participant,
                        "ready signal while not in a room, ignoring"
                    );
                }
            }
            Ok(())
        }

        Request::Status => {
            match &guard.binding {
                Some(binding) => {
                    let _ = binding.handle.status(participant).await;
                }
                None => {
                    tracing::debug!(
                        %participant,
                        "status query while not in a room, ignoring"
                    );
                }
            }
            Ok(())
        }
    }
}

/// Sends the acknowledgement for an acked request.
async fn ack<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    seq: u64,
    reply: Reply,
) -> Result<(), ServerError> {
    send_frame(conn, &state.codec, &ServerFrame::Ack { seq, reply }).await
}

/// Encodes and sends one server frame.
async fn send_frame<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    frame: &ServerFrame,
) -> Result<(), ServerError> {
    let bytes = codec.encode(frame)?;
    conn.send(&bytes).await.map_err(ServerError::Transport)
}
