use tokio::time::Duration;

use super::game_engine_tests::{
    answer_for, connect, create_room, create_test_server, current_turn, drain, score_of, wait_for,
};
use crate::protocol::{Role, RoomState, ServerEvent, SettingsPatch};

#[tokio::test]
async fn disconnect_in_waiting_room_is_a_full_leave() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;

    server.handle_disconnect("bob").await;

    assert!(server
        .store()
        .get_player(&room_id, "bob")
        .await
        .unwrap()
        .is_none());
    assert!(!server.is_connected(&"bob".to_string()));
}

#[tokio::test]
async fn host_disconnect_in_waiting_room_migrates_host() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;

    server.handle_disconnect("alice").await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.host_uid, "bob");
}

#[tokio::test]
async fn mid_game_disconnect_marks_offline_and_keeps_the_record() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let mut bob_rx = connect(&server, "bob").await;
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
    drain(&mut bob_rx);

    // Carol is not the turn-taker; her drop must not disturb the turn.
    server.handle_disconnect("carol").await;

    let carol = server
        .store()
        .get_player(&room_id, "carol")
        .await
        .unwrap()
        .unwrap();
    assert!(!carol.online);
    assert_eq!(carol.role, Role::Player, "record survives for rejoin");

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.current_turn_uid.as_deref(), Some("alice"));
    assert!(
        room.turn_order.contains(&"carol".to_string()),
        "disconnect must not trim the rotation"
    );
}

#[tokio::test]
async fn turn_taker_disconnect_synthesizes_timeout_and_opens_steal() {
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

    // Alice holds the turn and drops.
    server.handle_disconnect("alice").await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    let steal = room.steal_attempt.expect("missed turn goes to steal");
    assert_eq!(steal.stealer_uid, "bob");

    // The stealer converts the dropped turn for 1 + bonus.
    let (question_id, correct) = answer_for(&server, &room_id, true).await;
    server
        .handle_submit_steal("bob", room_id, &question_id, correct)
        .await;
    assert_eq!(score_of(&server, &room_id, "bob").await, 2);
    assert_eq!(current_turn(&server, &room_id).await.as_deref(), Some("bob"));
}

#[tokio::test]
async fn rejoin_after_passed_slot_demotes_to_spectator() {
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
                questions_per_player: Some(3),
                ..Default::default()
            }),
        )
        .await;

    // Alice (slot 0) disconnects mid-turn; the game moves on past her slot.
    server.handle_disconnect("alice").await;
    let (question_id, correct) = answer_for(&server, &room_id, true).await;
    server
        .handle_submit_steal("bob", room_id, &question_id, correct)
        .await;

    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert!(room.turn_cursor >= 1, "rotation has moved past slot 0");

    // Alice reconnects and rejoins: her slot has passed this cycle.
    let mut alice_rx = connect(&server, "alice").await;
    server.handle_rejoin("alice", room_id).await;

    let alice = server
        .store()
        .get_player(&room_id, "alice")
        .await
        .unwrap()
        .unwrap();
    assert!(alice.online);
    assert_eq!(alice.role, Role::Spectator);

    let events = drain(&mut alice_rx);
    let snapshot = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::RejoinState(snapshot) => Some(snapshot.clone()),
            _ => None,
        })
        .expect("RejoinState missing");
    assert_eq!(snapshot.role, Role::Spectator);
    assert_eq!(snapshot.room_state, RoomState::Active);
    assert!(snapshot.question.is_some());
    assert!(snapshot.phase_remaining_sec.is_some());
}

#[tokio::test]
async fn rejoin_before_slot_reinstates_player() {
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
                questions_per_player: Some(3),
                ..Default::default()
            }),
        )
        .await;

    // Carol (slot 2) drops while Alice still holds slot 0.
    server.handle_disconnect("carol").await;
    let _carol_rx = connect(&server, "carol").await;
    server.handle_rejoin("carol", room_id).await;

    let carol = server
        .store()
        .get_player(&room_id, "carol")
        .await
        .unwrap()
        .unwrap();
    assert!(carol.online);
    assert_eq!(carol.role, Role::Player, "slot not yet passed this cycle");
}

#[tokio::test]
async fn rejoin_in_waiting_room_restores_player_role() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;

    // Simulate a tracked offline member (not a full leave).
    let mut bob = server
        .store()
        .get_player(&room_id, "bob")
        .await
        .unwrap()
        .unwrap();
    bob.online = false;
    bob.role = Role::Spectator;
    server.store().upsert_player(&room_id, &bob).await.unwrap();

    server.handle_rejoin("bob", room_id).await;

    let bob = server
        .store()
        .get_player(&room_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert!(bob.online);
    assert_eq!(bob.role, Role::Player);
}

#[tokio::test]
async fn rejoin_unknown_member_gets_rejoin_error() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let (room_id, _code) = create_room(&server, "alice", &mut alice_rx).await;

    let mut ghost_rx = connect(&server, "ghost").await;
    server.handle_rejoin("ghost", room_id).await;

    let events = drain(&mut ghost_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::RejoinError { .. })));
}

// ------------------------------------------------------------------
// Play-again quorum
// ------------------------------------------------------------------

async fn finished_three_player_game() -> (
    std::sync::Arc<super::TriviaServer>,
    crate::protocol::RoomId,
    tokio::sync::mpsc::Receiver<std::sync::Arc<ServerEvent>>,
) {
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
                questions_per_player: Some(1),
                ..Default::default()
            }),
        )
        .await;

    // Run the game to completion on correct answers.
    loop {
        let room = server.store().get_room(&room_id).await.unwrap().unwrap();
        if room.state != RoomState::Active {
            break;
        }
        let turn_uid = room.current_turn_uid.clone().unwrap();
        let (question_id, index) = answer_for(&server, &room_id, true).await;
        server
            .handle_submit_answer(&turn_uid, room_id, &question_id, index)
            .await;
    }

    drain(&mut alice_rx);
    (server, room_id, alice_rx)
}

#[tokio::test(start_paused = true)]
async fn play_again_quorum_restarts_with_previous_settings() {
    let (server, room_id, mut alice_rx) = finished_three_player_game().await;

    server.handle_play_again("alice", room_id).await;
    let events = drain(&mut alice_rx);
    let status = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::PlayAgainStatus {
                votes,
                total_online,
                required,
            } => Some((*votes, *total_online, *required)),
            _ => None,
        })
        .expect("PlayAgainStatus missing");
    assert_eq!(status, (1, 3, 2));

    server.handle_play_again("bob", room_id).await;

    let room = wait_for(&server, &room_id, |room| room.state == RoomState::Active).await;
    // Previous settings retained: 3 players x 1 question each.
    assert_eq!(room.settings.questions_per_player, 1);
    assert_eq!(room.question_count, 3);
    assert_eq!(room.current_question_index, 0);
    assert_eq!(score_of(&server, &room_id, "alice").await, 0);

    let events = drain(&mut alice_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::GameStarted(_))));
}

#[tokio::test(start_paused = true)]
async fn play_again_window_expires_without_quorum() {
    let (server, room_id, mut alice_rx) = finished_three_player_game().await;

    server.handle_play_again("alice", room_id).await;
    drain(&mut alice_rx);

    tokio::time::sleep(Duration::from_secs(31)).await;
    // Let the expiry task run.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let events = drain(&mut alice_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::PlayAgainFailed)));
    let room = server.store().get_room(&room_id).await.unwrap().unwrap();
    assert_eq!(room.state, RoomState::Ended);
}

#[tokio::test]
async fn play_again_rejected_while_game_is_running() {
    let server = create_test_server();
    let mut alice_rx = connect(&server, "alice").await;
    let _b = connect(&server, "bob").await;
    let (room_id, code) = create_room(&server, "alice", &mut alice_rx).await;
    server.handle_join_room("bob", &code, None).await;
    server.handle_start_game("alice", room_id, None).await;
    drain(&mut alice_rx);

    server.handle_play_again("alice", room_id).await;

    let events = drain(&mut alice_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::ActionFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn voter_disconnect_clears_a_lone_vote() {
    let (server, room_id, mut alice_rx) = finished_three_player_game().await;

    server.handle_play_again("alice", room_id).await;
    drain(&mut alice_rx);

    server.handle_disconnect("alice").await;

    // Bob voting alone again should read votes=1, not 2: Alice's vote died
    // with her connection.
    let mut bob_rx = connect(&server, "bob").await;
    server.handle_rejoin("bob", room_id).await;
    drain(&mut bob_rx);
    server.handle_play_again("bob", room_id).await;

    let events = drain(&mut bob_rx);
    let votes = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::PlayAgainStatus { votes, .. } => Some(*votes),
            _ => None,
        })
        .expect("PlayAgainStatus missing");
    assert_eq!(votes, 1);
}
