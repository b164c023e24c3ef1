//! Shared helpers for integration tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Duration;

use quiz_rally_server::auth::{HmacTokenVerifier, VerifiedIdentity};
use quiz_rally_server::protocol::{Room, RoomId, ServerEvent};
use quiz_rally_server::server::{InMemoryEventDispatcher, RuntimeConfig, TriviaServer};
use quiz_rally_server::store::InMemoryStore;
use quiz_rally_server::trivia::{QuestionSource, StaticQuestionBank};

pub type EventRx = mpsc::Receiver<Arc<ServerEvent>>;

pub fn create_test_server() -> Arc<TriviaServer> {
    create_test_server_with_source(Arc::new(StaticQuestionBank::new()))
}

pub fn create_test_server_with_source(source: Arc<dyn QuestionSource>) -> Arc<TriviaServer> {
    TriviaServer::new(
        RuntimeConfig::default(),
        Arc::new(InMemoryStore::new()),
        source,
        Arc::new(InMemoryEventDispatcher::new()),
        Arc::new(HmacTokenVerifier::new(b"integration-secret".to_vec())),
    )
}

pub async fn connect(server: &Arc<TriviaServer>, uid: &str) -> EventRx {
    let (tx, rx) = mpsc::channel(256);
    let identity = VerifiedIdentity {
        uid: uid.to_string(),
        name: Some(uid.to_string()),
        picture: None,
    };
    server.handle_connect(&identity, tx).await;
    rx
}

pub fn drain(rx: &mut EventRx) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push((*event).clone());
    }
    events
}

pub async fn create_room(
    server: &Arc<TriviaServer>,
    host_uid: &str,
    rx: &mut EventRx,
) -> (RoomId, String) {
    server.handle_create_room(host_uid, Some(host_uid)).await;
    for event in drain(rx) {
        if let ServerEvent::RoomCreated { room_id, room_code } = event {
            return (room_id, room_code);
        }
    }
    panic!("RoomCreated reply missing");
}

pub async fn room(server: &Arc<TriviaServer>, room_id: &RoomId) -> Room {
    server
        .store()
        .get_room(room_id)
        .await
        .expect("store read")
        .expect("room exists")
}

/// Correct (or deliberately wrong) answer index for the current question.
pub async fn answer_for(
    server: &Arc<TriviaServer>,
    room_id: &RoomId,
    correct: bool,
) -> (String, i32) {
    let room = room(server, room_id).await;
    let question = server
        .store()
        .get_question(room_id, room.current_question_index)
        .await
        .expect("store read")
        .expect("question exists");
    let index = if correct {
        i32::from(question.correct_index)
    } else {
        (i32::from(question.correct_index) + 1) % 4
    };
    (question.id, index)
}

pub async fn score_of(server: &Arc<TriviaServer>, room_id: &RoomId, uid: &str) -> u32 {
    server
        .store()
        .get_player(room_id, uid)
        .await
        .expect("store read")
        .expect("player exists")
        .score
}

/// Poll the room until the predicate holds. Paused-clock friendly: the 20ms
/// poll sleeps advance virtual time between checks.
pub async fn wait_for(
    server: &Arc<TriviaServer>,
    room_id: &RoomId,
    predicate: impl Fn(&Room) -> bool,
) -> Room {
    for _ in 0..2000 {
        if let Ok(Some(room)) = server.store().get_room(room_id).await {
            if predicate(&room) {
                return room;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never satisfied for room {room_id}");
}
