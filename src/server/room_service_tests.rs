use super::game_engine_tests::{connect, create_room, create_test_server, drain};
use crate::protocol::{
    Role, RoomState, ServerEvent, SettingsPatch, MAX_PLAYERS_PER_ROOM, MAX_SPECTATORS_PER_ROOM,
};

#[tokio::test]
async fn create_room_commits_host_atomically() {
    let server = create_test_server();
    let mut rx = connect(&server, "alice").await;
    let (room_id, code) = create_room(&server, "alice", &mut rx).await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.code, code);
    assert_eq!(room.host_uid, "alice");
    assert_eq!(room.state, RoomState::Waiting);

    let players = server.store().list_players(&room_id).await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].join_order, 1);
    assert_eq!(players[0].score, 0);
    assert!(players[0].online);
    assert_eq!(players[0].role, Role::Player);
}

#[tokio::test]
async fn join_with_unknown_code_fails() {
    let server = create_test_server();
    let mut rx = connect(&server, "bob").await;

    server.handle_join_room("bob", "ZZZZZZ", None).await;

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));
}

#[tokio::test]
async fn join_assigns_monotonic_join_order() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let _c = connect(&server, "carol").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;

    server.handle_join_room("bob", &code, None).await;
    server.handle_join_room("carol", &code, None).await;

    let players = server.store().list_players(&room_id).await.unwrap();
    let orders: Vec<u32> = players.iter().map(|p| p.join_order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
}

#[tokio::test]
async fn capacity_demotes_ninth_player_and_rejects_fourteenth() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;

    // Fill the player slots (host is #1).
    for i in 2..=MAX_PLAYERS_PER_ROOM {
        let uid = format!("player{i}");
        let _rx = connect(&server, &uid).await;
        server.handle_join_room(&uid, &code, None).await;
    }

    let players = server.store().list_players(&room_id).await.unwrap();
    assert_eq!(
        players.iter().filter(|p| p.role == Role::Player).count(),
        MAX_PLAYERS_PER_ROOM
    );

    // Joiners 9..13 are demoted into the spectator slots.
    for i in 1..=MAX_SPECTATORS_PER_ROOM {
        let uid = format!("extra{i}");
        let _rx = connect(&server, &uid).await;
        server.handle_join_room(&uid, &code, None).await;
        let player = server
            .store()
            .get_player(&room_id, &uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.role, Role::Spectator, "{uid} should spectate");
    }

    // The fourteenth participant has nowhere to go.
    let mut last_rx = connect(&server, "overflow").await;
    server.handle_join_room("overflow", &code, None).await;
    let events = drain(&mut last_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));
    assert!(server
        .store()
        .get_player(&room_id, "overflow")
        .await
        .unwrap()
        .is_none());

    let players = server.store().list_players(&room_id).await.unwrap();
    assert_eq!(
        players.len(),
        MAX_PLAYERS_PER_ROOM + MAX_SPECTATORS_PER_ROOM
    );
}

#[tokio::test]
async fn rejoining_member_keeps_role_and_comes_online() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;

    let mut bob = server
        .store()
        .get_player(&room_id, "bob")
        .await
        .unwrap()
        .unwrap();
    bob.online = false;
    server.store().upsert_player(&room_id, &bob).await.unwrap();

    server.handle_join_room("bob", &code, None).await;
    let bob = server
        .store()
        .get_player(&room_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert!(bob.online);
    assert_eq!(bob.role, Role::Player);
    assert_eq!(bob.join_order, 2, "join order must not be reissued");
}

#[tokio::test]
async fn joining_an_ended_room_fails() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;

    let mut room = server.store().get_room(&room_id).await.unwrap().unwrap();
    room.state = RoomState::Ended;
    server.store().update_room(&room).await.unwrap();

    let mut bob_rx = connect(&server, "bob").await;
    server.handle_join_room("bob", &code, None).await;
    let events = drain(&mut bob_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));
}

#[tokio::test]
async fn leaving_last_participant_deletes_the_room() {
    let server = create_test_server();
    let mut rx = connect(&server, "alice").await;
    let (room_id, code) = create_room(&server, "alice", &mut rx).await;

    server.handle_leave_room("alice", room_id).await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::RoomLeft {
            room_deleted: true,
            ..
        }
    )));
    assert!(server.store().get_room(&room_id).await.unwrap().is_none());
    assert!(server
        .store()
        .find_room_by_code(&code)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn host_leave_migrates_to_first_online_player() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let mut bob_rx = connect(&server, "bob").await;
    let _c = connect(&server, "carol").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;
    server.handle_join_room("carol", &code, None).await;
    drain(&mut bob_rx);

    server.handle_leave_room("alice", room_id).await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.host_uid, "bob");

    let events = drain(&mut bob_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::PlayerLeft {
            uid,
            new_host_uid: Some(new_host),
        } if uid == "alice" && new_host == "bob"
    )));
    assert!(server
        .store()
        .get_player(&room_id, "alice")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn host_leave_promotes_spectator_when_no_players_remain() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;

    let _s = connect(&server, "watcher").await;
    server.handle_join_room("watcher", &code, None).await;
    let mut watcher = server
        .store()
        .get_player(&room_id, "watcher")
        .await
        .unwrap()
        .unwrap();
    watcher.role = Role::Spectator;
    server
        .store()
        .upsert_player(&room_id, &watcher)
        .await
        .unwrap();

    server.handle_leave_room("alice", room_id).await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.host_uid, "watcher");
    let watcher = server
        .store()
        .get_player(&room_id, "watcher")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(watcher.role, Role::Player, "promoted with the host seat");
}

#[tokio::test]
async fn update_settings_is_host_only_and_waiting_only() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let mut bob_rx = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;
    drain(&mut bob_rx);

    let patch = SettingsPatch {
        questions_per_player: Some(3),
        ..Default::default()
    };

    // Non-host rejected.
    server
        .handle_update_settings("bob", room_id, patch.clone())
        .await;
    let events = drain(&mut bob_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));

    // Host accepted.
    server
        .handle_update_settings("alice", room_id, patch.clone())
        .await;
    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.settings.questions_per_player, 3);

    // Not while active.
    server.handle_start_game("alice", room_id, None).await;
    server.handle_update_settings("alice", room_id, patch).await;
    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.state, RoomState::Active);
    assert_eq!(room.settings.questions_per_player, 3);
}

#[tokio::test]
async fn out_of_range_settings_fail_whole_call() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let (room_id, _code) = create_room(&server, "alice", &mut alice_rx).await;

    let patch = SettingsPatch {
        questions_per_player: Some(3),
        turn_timeout_sec: Some(600),
        ..Default::default()
    };
    server.handle_update_settings("alice", room_id, patch).await;

    let events = drain(&mut alice_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));
    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    // Nothing merged, not even the in-range field.
    assert_eq!(room.settings.questions_per_player, 5);
    assert_eq!(room.settings.turn_timeout_sec, 30);
}

#[tokio::test]
async fn voluntary_leave_trims_turn_order_mid_game() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let _c = connect(&server, "carol").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;
    server.handle_join_room("carol", &code, None).await;

    server
        .handle_start_game(
            "alice",
            room_id,
            Some(SettingsPatch {
                questions_per_player: Some(2),
                ..Default::default()
            }),
        )
        .await;

    server.handle_leave_room("carol", room_id).await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(
        room.turn_order,
        vec!["alice".to_string(), "bob".to_string()],
        "voluntary leave forfeits the rotation slot"
    );
    assert_eq!(room.state, RoomState::Active);
}
