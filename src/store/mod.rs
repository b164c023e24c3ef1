use crate::protocol::{Player, Question, Room, RoomId};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

mod memory;

pub use memory::InMemoryStore;

/// Raised by [`GameStore::create_room`] when the generated room code is
/// already taken. The registry resolves this by regenerating and retrying.
#[derive(Debug, Error)]
#[error("Room code `{code}` is already in use")]
pub struct RoomCodeTakenError {
    pub code: String,
}

/// Persisted user profile, upserted on every authenticated connect.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub last_login: chrono::DateTime<chrono::Utc>,
}

/// Document-store abstraction for game state.
///
/// Layout mirrors the persisted document tree: `users/{uid}` profiles,
/// `rooms/{roomId}` room documents, `rooms/{roomId}/players/{uid}` player
/// documents and `rooms/{roomId}/questions/{index}` question documents.
/// A room owns its subcollections; `delete_room` cascades.
///
/// Multi-document methods (`create_room`, `commit_game_start`,
/// `delete_room`) are atomic: either every write lands or none does.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Initialize the store (connection checks, migrations).
    async fn initialize(&self) -> Result<()>;

    /// Upsert a `users/{uid}` profile document, refreshing `last_login`.
    async fn upsert_user_profile(
        &self,
        uid: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<()>;

    /// Fetch a user profile.
    async fn get_user_profile(&self, uid: &str) -> Result<Option<UserProfile>>;

    /// Commit a new room document together with its host player document in
    /// one atomic batch. Fails with [`RoomCodeTakenError`] on code collision.
    async fn create_room(&self, room: Room, host: Player) -> Result<()>;

    /// Resolve a room code to a room id.
    async fn find_room_by_code(&self, code: &str) -> Result<Option<RoomId>>;

    /// Get a room document by id.
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>>;

    /// Replace a room document. Returns false if the room no longer exists.
    async fn update_room(&self, room: &Room) -> Result<bool>;

    /// Delete a room and cascade its player and question subcollections.
    async fn delete_room(&self, room_id: &RoomId) -> Result<bool>;

    /// Get one player document.
    async fn get_player(&self, room_id: &RoomId, uid: &str) -> Result<Option<Player>>;

    /// Insert or replace a player document.
    async fn upsert_player(&self, room_id: &RoomId, player: &Player) -> Result<()>;

    /// Delete a player document, returning it if it existed.
    async fn remove_player(&self, room_id: &RoomId, uid: &str) -> Result<Option<Player>>;

    /// All players in a room ordered by `join_order` ascending.
    async fn list_players(&self, room_id: &RoomId) -> Result<Vec<Player>>;

    /// Atomically increment a player's score, returning the new value.
    /// Returns `None` when the room or player is gone.
    async fn add_score(&self, room_id: &RoomId, uid: &str, delta: u32) -> Result<Option<u32>>;

    /// Atomic game-start batch: replace the question subcollection, reset
    /// every player score to zero, and write the transitioned room document.
    async fn commit_game_start(&self, room: &Room, questions: &[Question]) -> Result<()>;

    /// Get the question at a 0-based index.
    async fn get_question(&self, room_id: &RoomId, index: u32) -> Result<Option<Question>>;

    /// All questions in index order.
    async fn list_questions(&self, room_id: &RoomId) -> Result<Vec<Question>>;

    /// Health check.
    async fn health_check(&self) -> bool;
}

/// Store configuration; in-memory only for the standalone server binary.
#[derive(Debug, Clone, Default)]
pub enum StoreConfig {
    #[default]
    InMemory,
}

/// Create a store instance based on configuration.
pub fn create_store(config: StoreConfig) -> Box<dyn GameStore> {
    match config {
        StoreConfig::InMemory => Box::new(InMemoryStore::new()),
    }
}
