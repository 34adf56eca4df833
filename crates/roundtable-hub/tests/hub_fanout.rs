//! Fan-out, ordering, and eviction behavior of the hub coordinator.

use std::time::Duration;

use roundtable_hub::spawn_hub;
use roundtable_protocol::ServerEnvelope;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

async fn recv(
    rx: &mut mpsc::Receiver<ServerEnvelope>,
) -> Option<ServerEnvelope> {
    timeout(Duration::from_secs(1), rx.recv()).await.ok()?
}

fn envelope(n: usize) -> ServerEnvelope {
    ServerEnvelope::event("chat", json!({ "n": n }))
}

#[tokio::test]
async fn test_broadcast_reaches_all_sessions_in_identical_order() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();

    let (tx1, mut rx1) = mpsc::channel(16);
    let (tx2, mut rx2) = mpsc::channel(16);
    let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
    hub.register(room, s1, tx1).await;
    hub.register(room, s2, tx2).await;

    for n in 0..5 {
        hub.broadcast(room, envelope(n)).await;
    }

    // Both subscribers observe the same sequence.
    for n in 0..5 {
        let a = recv(&mut rx1).await.expect("rx1 message");
        let b = recv(&mut rx2).await.expect("rx2 message");
        assert_eq!(a.payload["n"], n);
        assert_eq!(b.payload["n"], n);
    }
}

#[tokio::test]
async fn test_broadcast_except_skips_the_sender() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();

    let (tx1, mut rx1) = mpsc::channel(16);
    let (tx2, mut rx2) = mpsc::channel(16);
    let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
    hub.register(room, s1, tx1).await;
    hub.register(room, s2, tx2).await;

    hub.broadcast_except(room, envelope(1), s1).await;

    let got = recv(&mut rx2).await.expect("other session receives");
    assert_eq!(got.payload["n"], 1);

    // The excluded session got nothing; a follow-up broadcast is the
    // first thing it sees.
    hub.broadcast(room, envelope(2)).await;
    let got = recv(&mut rx1).await.expect("excluded session next message");
    assert_eq!(got.payload["n"], 2);
}

#[tokio::test]
async fn test_send_to_targets_one_session() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();

    let (tx1, mut rx1) = mpsc::channel(16);
    let (tx2, mut rx2) = mpsc::channel(16);
    let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
    hub.register(room, s1, tx1).await;
    hub.register(room, s2, tx2).await;

    hub.send_to(room, s1, ServerEnvelope::error("just for you"))
        .await;
    hub.broadcast(room, envelope(7)).await;

    let first = recv(&mut rx1).await.expect("targeted message");
    assert_eq!(first.kind, "error");
    let second = recv(&mut rx1).await.expect("broadcast follows");
    assert_eq!(second.payload["n"], 7);

    // The other session only sees the broadcast.
    let only = recv(&mut rx2).await.expect("broadcast");
    assert_eq!(only.payload["n"], 7);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let hub = spawn_hub();
    let (room_a, room_b) = (Uuid::new_v4(), Uuid::new_v4());

    let (tx_a, mut rx_a) = mpsc::channel(16);
    let (tx_b, mut rx_b) = mpsc::channel(16);
    hub.register(room_a, Uuid::new_v4(), tx_a).await;
    hub.register(room_b, Uuid::new_v4(), tx_b).await;

    hub.broadcast(room_a, envelope(1)).await;

    assert!(recv(&mut rx_a).await.is_some());
    // Drain through a room_count round-trip, then confirm B is empty.
    assert_eq!(hub.room_count(room_b).await, 1);
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_unregister_closes_queue_and_empties_room() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();
    let session = Uuid::new_v4();

    let (tx, mut rx) = mpsc::channel(16);
    hub.register(room, session, tx).await;
    assert_eq!(hub.room_count(room).await, 1);

    hub.unregister(room, session).await;
    assert_eq!(hub.room_count(room).await, 0);

    // The sender was dropped, so the queue reports closed.
    let closed = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("queue should close promptly");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_slow_consumer_is_evicted_not_waited_on() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();

    // A one-slot queue that nobody drains models a stalled client.
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let (fast_tx, mut fast_rx) = mpsc::channel(16);
    let (slow, fast) = (Uuid::new_v4(), Uuid::new_v4());
    hub.register(room, slow, slow_tx).await;
    hub.register(room, fast, fast_tx).await;

    hub.broadcast(room, envelope(1)).await;
    hub.broadcast(room, envelope(2)).await; // overflows the slow queue

    // The fast session saw everything.
    assert_eq!(recv(&mut fast_rx).await.unwrap().payload["n"], 1);
    assert_eq!(recv(&mut fast_rx).await.unwrap().payload["n"], 2);

    // The slow session was evicted: one delivery, then a closed queue.
    assert_eq!(hub.room_count(room).await, 1);
    assert_eq!(recv(&mut slow_rx).await.unwrap().payload["n"], 1);
    let closed = timeout(Duration::from_secs(1), slow_rx.recv())
        .await
        .expect("queue should close promptly");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_register_after_shutdown_fails_closed() {
    let hub = spawn_hub();
    let room = Uuid::new_v4();

    let (tx1, mut rx1) = mpsc::channel(16);
    hub.register(room, Uuid::new_v4(), tx1).await;
    hub.shutdown().await;

    // Existing queues are closed.
    let closed = timeout(Duration::from_secs(1), rx1.recv())
        .await
        .expect("queue should close promptly");
    assert!(closed.is_none());

    // New registrations are dropped immediately.
    let (tx2, mut rx2) = mpsc::channel(16);
    hub.register(room, Uuid::new_v4(), tx2).await;
    let closed = timeout(Duration::from_secs(1), rx2.recv())
        .await
        .expect("queue should close promptly");
    assert!(closed.is_none());
    assert_eq!(hub.room_count(room).await, 0);
}
