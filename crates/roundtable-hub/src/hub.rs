//! The coordinator task owning the room registry.

use std::collections::HashMap;

use roundtable_protocol::ServerEnvelope;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Bound on each session's send queue. A full queue marks the session
/// as a slow consumer and costs it the connection.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Bound on the coordinator's command channel.
const COMMAND_CHANNEL_SIZE: usize = 256;

/// Commands the coordinator processes, in arrival order.
enum HubCommand {
    Register {
        room_id: Uuid,
        session_id: Uuid,
        queue: mpsc::Sender<ServerEnvelope>,
    },
    Unregister {
        room_id: Uuid,
        session_id: Uuid,
    },
    Broadcast {
        room_id: Uuid,
        envelope: ServerEnvelope,
        except: Option<Uuid>,
    },
    SendTo {
        room_id: Uuid,
        session_id: Uuid,
        envelope: ServerEnvelope,
    },
    RoomCount {
        room_id: Uuid,
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to the running coordinator. Cheap to clone; every session and
/// the entry layer hold one.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Adds a session's send queue to its room. After shutdown the
    /// queue is dropped immediately, closing the session.
    pub async fn register(
        &self,
        room_id: Uuid,
        session_id: Uuid,
        queue: mpsc::Sender<ServerEnvelope>,
    ) {
        self.send(HubCommand::Register {
            room_id,
            session_id,
            queue,
        })
        .await;
    }

    /// Removes a session; its send queue closes exactly once.
    pub async fn unregister(&self, room_id: Uuid, session_id: Uuid) {
        self.send(HubCommand::Unregister {
            room_id,
            session_id,
        })
        .await;
    }

    /// Enqueues one envelope for every session currently in the room.
    pub async fn broadcast(&self, room_id: Uuid, envelope: ServerEnvelope) {
        self.send(HubCommand::Broadcast {
            room_id,
            envelope,
            except: None,
        })
        .await;
    }

    /// Same as [`broadcast`](Self::broadcast), skipping one session.
    pub async fn broadcast_except(
        &self,
        room_id: Uuid,
        envelope: ServerEnvelope,
        except: Uuid,
    ) {
        self.send(HubCommand::Broadcast {
            room_id,
            envelope,
            except: Some(except),
        })
        .await;
    }

    /// Delivers one envelope to a single session, through the same
    /// ordered path as broadcasts.
    pub async fn send_to(
        &self,
        room_id: Uuid,
        session_id: Uuid,
        envelope: ServerEnvelope,
    ) {
        self.send(HubCommand::SendTo {
            room_id,
            session_id,
            envelope,
        })
        .await;
    }

    /// Number of sessions currently registered in the room.
    pub async fn room_count(&self, room_id: Uuid) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::RoomCount { room_id, reply }).await;
        rx.await.unwrap_or(0)
    }

    /// Closes every session queue and refuses new registrations.
    pub async fn shutdown(&self) {
        self.send(HubCommand::Shutdown).await;
    }

    async fn send(&self, command: HubCommand) {
        // A failed send means the coordinator is gone; sessions then
        // observe their queues closing, which is the fail-closed path.
        if self.sender.send(command).await.is_err() {
            tracing::debug!("hub coordinator is gone, dropping command");
        }
    }
}

struct Hub {
    rooms: HashMap<Uuid, HashMap<Uuid, mpsc::Sender<ServerEnvelope>>>,
    receiver: mpsc::Receiver<HubCommand>,
    shutting_down: bool,
}

/// Spawns the coordinator task and returns a handle to it.
pub fn spawn_hub() -> HubHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let hub = Hub {
        rooms: HashMap::new(),
        receiver,
        shutting_down: false,
    };
    tokio::spawn(hub.run());
    HubHandle { sender }
}

impl Hub {
    async fn run(mut self) {
        tracing::info!("hub coordinator started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                HubCommand::Register {
                    room_id,
                    session_id,
                    queue,
                } => self.handle_register(room_id, session_id, queue),
                HubCommand::Unregister {
                    room_id,
                    session_id,
                } => self.handle_unregister(room_id, session_id),
                HubCommand::Broadcast {
                    room_id,
                    envelope,
                    except,
                } => self.handle_broadcast(room_id, envelope, except),
                HubCommand::SendTo {
                    room_id,
                    session_id,
                    envelope,
                } => self.handle_send_to(room_id, session_id, envelope),
                HubCommand::RoomCount { room_id, reply } => {
                    let count =
                        self.rooms.get(&room_id).map(HashMap::len).unwrap_or(0);
                    let _ = reply.send(count);
                }
                HubCommand::Shutdown => {
                    tracing::info!(
                        rooms = self.rooms.len(),
                        "hub shutting down, closing all sessions"
                    );
                    self.shutting_down = true;
                    // Dropping the queues closes every write loop.
                    self.rooms.clear();
                }
            }
        }

        tracing::info!("hub coordinator stopped");
    }

    fn handle_register(
        &mut self,
        room_id: Uuid,
        session_id: Uuid,
        queue: mpsc::Sender<ServerEnvelope>,
    ) {
        if self.shutting_down {
            // Fail closed: dropping the queue closes the session.
            tracing::debug!(%room_id, %session_id, "register refused during shutdown");
            return;
        }
        let room = self.rooms.entry(room_id).or_default();
        room.insert(session_id, queue);
        tracing::info!(%room_id, %session_id, total = room.len(), "session registered");
    }

    fn handle_unregister(&mut self, room_id: Uuid, session_id: Uuid) {
        if let Some(room) = self.rooms.get_mut(&room_id) {
            if room.remove(&session_id).is_some() {
                tracing::info!(%room_id, %session_id, "session unregistered");
            }
            if room.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }

    fn handle_broadcast(
        &mut self,
        room_id: Uuid,
        envelope: ServerEnvelope,
        except: Option<Uuid>,
    ) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        let mut evicted = Vec::new();
        for (session_id, queue) in room.iter() {
            if except == Some(*session_id) {
                continue;
            }
            if queue.try_send(envelope.clone()).is_err() {
                evicted.push(*session_id);
            }
        }

        // Slow consumers lose their connection rather than blocking the
        // room; their queues close when the senders drop here.
        for session_id in evicted {
            room.remove(&session_id);
            tracing::warn!(%room_id, %session_id, "evicting slow consumer");
        }
        if room.is_empty() {
            self.rooms.remove(&room_id);
        }
    }

    fn handle_send_to(
        &mut self,
        room_id: Uuid,
        session_id: Uuid,
        envelope: ServerEnvelope,
    ) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(queue) = room.get(&session_id) else {
            return;
        };
        if queue.try_send(envelope).is_err() {
            room.remove(&session_id);
            tracing::warn!(%room_id, %session_id, "evicting slow consumer");
            if room.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }
}
