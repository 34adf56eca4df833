//! Per-connection read and write loops.
//!
//! Each accepted WebSocket runs one read loop and one write loop. The
//! write loop drains the session's bounded queue, bursting any backlog
//! into the same wakeup, and pings on an interval; the read loop
//! enforces a deadline refreshed by every inbound frame (pongs
//! included) and feeds decoded envelopes to the [`MoveRouter`].

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use roundtable_protocol::{ClientMessage, ServerEnvelope};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::MoveRouter;
use crate::hub::{HubHandle, SEND_QUEUE_CAPACITY};

/// Time allowed between inbound frames before the peer is considered
/// dead. Pong replies to our pings refresh it.
const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping period; must stay under [`PONG_WAIT`].
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Identity of one connected client on one socket.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub room_id: Uuid,
    pub room_player_id: Uuid,
    pub display_name: String,
    /// Client IP captured at upgrade time, used to rate-limit chat.
    pub rate_limit_key: String,
}

impl SessionContext {
    pub fn new(
        room_id: Uuid,
        room_player_id: Uuid,
        display_name: String,
        rate_limit_key: String,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            room_id,
            room_player_id,
            display_name,
            rate_limit_key,
        }
    }
}

/// Runs a session to completion: registers with the hub, pumps both
/// directions, and unregisters on the way out.
pub async fn run_session(
    socket: WebSocket,
    ctx: SessionContext,
    hub: HubHandle,
    router: Arc<MoveRouter>,
) {
    let (queue_tx, queue_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
    hub.register(ctx.room_id, ctx.session_id, queue_tx).await;

    let (sink, stream) = socket.split();
    let write_task = tokio::spawn(write_loop(sink, queue_rx));

    read_loop(stream, &ctx, &hub, &router).await;

    // The hub drops the queue sender, which ends the write loop.
    hub.unregister(ctx.room_id, ctx.session_id).await;
    let _ = write_task.await;

    tracing::debug!(
        room_id = %ctx.room_id,
        session_id = %ctx.session_id,
        "session closed"
    );
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    ctx: &SessionContext,
    hub: &HubHandle,
    router: &MoveRouter,
) {
    loop {
        let frame = match tokio::time::timeout(PONG_WAIT, stream.next()).await {
            Err(_) => {
                tracing::info!(session_id = %ctx.session_id, "read deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %ctx.session_id, error = %e, "read error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let data: Bytes = match frame {
            Message::Text(text) => Bytes::from(text.as_bytes().to_vec()),
            Message::Binary(data) => data,
            Message::Close(_) => break,
            // Ping/pong refresh the deadline by arriving at all.
            _ => continue,
        };

        let msg: ClientMessage = match serde_json::from_slice(&data) {
            Ok(msg) => msg,
            Err(e) => {
                // Decode errors are the client's problem; keep reading.
                tracing::debug!(
                    session_id = %ctx.session_id,
                    error = %e,
                    "undecodable message"
                );
                continue;
            }
        };

        if !msg.kind_allowed() {
            hub.send_to(
                ctx.room_id,
                ctx.session_id,
                ServerEnvelope::error("unsupported message type"),
            )
            .await;
            continue;
        }

        router.route(ctx, msg).await;
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<ServerEnvelope>,
) {
    let start = tokio::time::Instant::now() + PING_PERIOD;
    let mut ping = tokio::time::interval_at(start, PING_PERIOD);

    loop {
        tokio::select! {
            received = queue.recv() => {
                let Some(envelope) = received else {
                    // Queue closed: evicted or shutting down.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if feed(&mut sink, envelope).await.is_err() {
                    break;
                }
                // Burst the backlog into the same write wakeup.
                let mut drained = true;
                while let Ok(next) = queue.try_recv() {
                    if feed(&mut sink, next).await.is_err() {
                        drained = false;
                        break;
                    }
                }
                if !drained || sink.flush().await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn feed(
    sink: &mut SplitSink<WebSocket, Message>,
    envelope: ServerEnvelope,
) -> Result<(), ()> {
    let text = match serde_json::to_string(&envelope) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode outbound envelope");
            return Ok(());
        }
    };
    sink.feed(Message::Text(text.into())).await.map_err(|_| ())
}
