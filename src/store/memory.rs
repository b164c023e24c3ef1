use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::protocol::{Player, Question, Room, RoomId};

use super::{GameStore, RoomCodeTakenError, UserProfile};

/// One room document plus its owned subcollections.
///
/// Questions are keyed by their numeric index in a `BTreeMap`, so ordered
/// iteration is numeric rather than lexicographic and stringified ids never
/// need zero-padding.
#[derive(Debug, Clone, Default)]
struct RoomRecord {
    room: Option<Room>,
    players: HashMap<String, Player>,
    questions: BTreeMap<u32, Question>,
}

#[derive(Debug, Default)]
struct StoreState {
    rooms: HashMap<RoomId, RoomRecord>,
    /// Secondary index: room code -> room id.
    codes: HashMap<String, RoomId>,
    users: HashMap<String, UserProfile>,
}

/// In-memory document store. All mutating methods take the single state
/// write lock, which makes each trait method atomic with respect to every
/// other.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_user_profile(
        &self,
        uid: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.users.insert(
            uid.to_string(),
            UserProfile {
                uid: uid.to_string(),
                display_name: display_name.to_string(),
                avatar_url: avatar_url.map(str::to_string),
                last_login: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_user_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        let state = self.state.read().await;
        Ok(state.users.get(uid).cloned())
    }

    async fn create_room(&self, room: Room, host: Player) -> Result<()> {
        let mut state = self.state.write().await;
        if state.codes.contains_key(&room.code) {
            return Err(RoomCodeTakenError {
                code: room.code.clone(),
            }
            .into());
        }

        let room_id = room.id;
        state.codes.insert(room.code.clone(), room_id);
        let record = state.rooms.entry(room_id).or_default();
        record.players.insert(host.uid.clone(), host);
        record.room = Some(room);
        Ok(())
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<RoomId>> {
        let state = self.state.read().await;
        Ok(state.codes.get(code).copied())
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .get(room_id)
            .and_then(|record| record.room.clone()))
    }

    async fn update_room(&self, room: &Room) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.rooms.get_mut(&room.id) {
            Some(record) => {
                record.room = Some(room.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.rooms.remove(room_id) {
            Some(record) => {
                if let Some(room) = &record.room {
                    state.codes.remove(&room.code);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_player(&self, room_id: &RoomId, uid: &str) -> Result<Option<Player>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .get(room_id)
            .and_then(|record| record.players.get(uid).cloned()))
    }

    async fn upsert_player(&self, room_id: &RoomId, player: &Player) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(record) = state.rooms.get_mut(room_id) {
            record.players.insert(player.uid.clone(), player.clone());
        }
        Ok(())
    }

    async fn remove_player(&self, room_id: &RoomId, uid: &str) -> Result<Option<Player>> {
        let mut state = self.state.write().await;
        Ok(state
            .rooms
            .get_mut(room_id)
            .and_then(|record| record.players.remove(uid)))
    }

    async fn list_players(&self, room_id: &RoomId) -> Result<Vec<Player>> {
        let state = self.state.read().await;
        let mut players: Vec<Player> = state
            .rooms
            .get(room_id)
            .map(|record| record.players.values().cloned().collect())
            .unwrap_or_default();
        players.sort_by_key(|player| player.join_order);
        Ok(players)
    }

    async fn add_score(&self, room_id: &RoomId, uid: &str, delta: u32) -> Result<Option<u32>> {
        let mut state = self.state.write().await;
        Ok(state
            .rooms
            .get_mut(room_id)
            .and_then(|record| record.players.get_mut(uid))
            .map(|player| {
                player.score = player.score.saturating_add(delta);
                player.score
            }))
    }

    async fn commit_game_start(&self, room: &Room, questions: &[Question]) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(record) = state.rooms.get_mut(&room.id) else {
            return Err(anyhow::anyhow!("room {} no longer exists", room.id));
        };

        record.questions.clear();
        for (index, question) in questions.iter().enumerate() {
            record.questions.insert(index as u32, question.clone());
        }
        for player in record.players.values_mut() {
            player.score = 0;
        }
        record.room = Some(room.clone());
        Ok(())
    }

    async fn get_question(&self, room_id: &RoomId, index: u32) -> Result<Option<Question>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .get(room_id)
            .and_then(|record| record.questions.get(&index).cloned()))
    }

    async fn list_questions(&self, room_id: &RoomId) -> Result<Vec<Question>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .get(room_id)
            .map(|record| record.questions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
