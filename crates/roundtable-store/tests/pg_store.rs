//! Postgres-backed store tests.
//!
//! These run against a real database and are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p roundtable-store -- --ignored
//! ```

use std::path::Path;

use serde_json::json;
use uuid::Uuid;

use roundtable_engine::StatusChange;
use roundtable_store::{
    connect, migrate, GameStore, RoomStore, StoreError, UserStore,
    GAME_STATUS_WAITING,
};

async fn pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for store tests");
    let pool = connect(&url).await.expect("connect");
    migrate(&pool, Path::new("../../migrations"))
        .await
        .expect("migrate");
    pool
}

fn unique_email() -> String {
    format!("store-test-{}@example.com", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_lifecycle_and_password_verification() {
    let users = UserStore::new(pool().await);
    let email = unique_email();

    let user = users
        .create_user(&email, "hunter2-hunter2", "Store Tester")
        .await
        .expect("create user");
    assert_eq!(user.email, email);

    // Duplicate email is a conflict, case-insensitively.
    let err = users
        .create_user(&email.to_uppercase(), "hunter2-hunter2", "Other")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::EmailExists));

    // Wrong password and unknown email both come back as None.
    assert!(users
        .verify_password(&email, "wrong-password")
        .await
        .unwrap()
        .is_none());
    assert!(users
        .verify_password("nobody@example.com", "hunter2-hunter2")
        .await
        .unwrap()
        .is_none());
    assert!(users
        .verify_password(&email, "hunter2-hunter2")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_room_lifecycle_creates_host_game_and_snapshot() {
    let pg = pool().await;
    let users = UserStore::new(pg.clone());
    let rooms = RoomStore::new(pg.clone());
    let games = GameStore::new(pg);

    let host = users
        .create_user(&unique_email(), "hunter2-hunter2", "Host")
        .await
        .unwrap();

    let created = rooms
        .create_room(host.id, "Host", None, json!({}))
        .await
        .expect("create room");
    assert!(created.room_player.is_host);
    assert_eq!(created.game.status, GAME_STATUS_WAITING);

    // The initial snapshot is v1 lobby state.
    let snapshot = games
        .latest_snapshot(created.game.id)
        .await
        .unwrap()
        .expect("initial snapshot");
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.state["phase"], "lobby");

    // Joining seats the newcomer in the latest game.
    let joiner = users
        .create_user(&unique_email(), "hunter2-hunter2", "Joiner")
        .await
        .unwrap();
    let joined = rooms
        .join_room(&created.room.code, joiner.id, "Joiner", None)
        .await
        .expect("join room");
    assert!(joined.game_player.is_some());
    assert_eq!(
        joined.latest_game.as_ref().map(|g| g.id),
        Some(created.game.id)
    );

    // Duplicate display name within the room conflicts.
    let err = rooms
        .join_room(&created.room.code, joiner.id, "Host", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NameTaken));

    // Join order is host first, then the joiner.
    let order = games
        .player_ids_in_join_order(created.game.id)
        .await
        .unwrap();
    assert_eq!(order, vec![created.room_player.id, joined.room_player.id]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_append_event_and_snapshot_versions_are_consecutive() {
    let pg = pool().await;
    let users = UserStore::new(pg.clone());
    let rooms = RoomStore::new(pg.clone());
    let games = GameStore::new(pg);

    let host = users
        .create_user(&unique_email(), "hunter2-hunter2", "Host")
        .await
        .unwrap();
    let created = rooms
        .create_room(host.id, "Host", None, json!({}))
        .await
        .unwrap();

    // Lobby snapshot is v1; appends continue from there with no gaps.
    for expected in 2..=4 {
        let version = games
            .append_event_and_snapshot(
                created.game.id,
                Some(created.room_player.id),
                "vote",
                &json!({"approved": true, "move_type": "vote"}),
                &json!({"phase": "team_vote"}),
                None,
            )
            .await
            .unwrap();
        assert_eq!(version, expected);
    }

    // A status change lands in the same transaction as the snapshot.
    let version = games
        .append_event_and_snapshot(
            created.game.id,
            None,
            "action",
            &json!({"action": "start_game", "move_type": "action"}),
            &json!({"phase": "team_selection", "status": "in_progress"}),
            Some(StatusChange::Started),
        )
        .await
        .unwrap();
    assert_eq!(version, 5);

    let game = games
        .latest_game(created.room.id)
        .await
        .unwrap()
        .expect("latest game");
    assert_eq!(game.status, "in_progress");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_password_protected_room_requires_matching_password() {
    let pg = pool().await;
    let users = UserStore::new(pg.clone());
    let rooms = RoomStore::new(pg);

    let host = users
        .create_user(&unique_email(), "hunter2-hunter2", "Host")
        .await
        .unwrap();
    let created = rooms
        .create_room(host.id, "Host", Some("open-sesame"), json!({}))
        .await
        .unwrap();

    let joiner = users
        .create_user(&unique_email(), "hunter2-hunter2", "Joiner")
        .await
        .unwrap();

    let err = rooms
        .join_room(&created.room.code, joiner.id, "Joiner", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::PasswordRequired));

    let err = rooms
        .join_room(&created.room.code, joiner.id, "Joiner", Some("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPassword));

    rooms
        .join_room(&created.room.code, joiner.id, "Joiner", Some("open-sesame"))
        .await
        .expect("correct password joins");
}
