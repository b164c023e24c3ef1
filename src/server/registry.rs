use super::TriviaServer;
use crate::protocol::{room_codes, ErrorCode, Player, Role, Room, RoomId, ServerEvent};
use crate::store::RoomCodeTakenError;

impl TriviaServer {
    /// Create a room for the caller, who becomes host and first player.
    ///
    /// The room document and the host player document (joinOrder 1, score 0,
    /// online) are committed in one atomic batch. Code collisions are
    /// resolved by regenerate-and-retry; at a 32-character alphabet and six
    /// positions a handful of attempts is effectively always enough.
    pub async fn handle_create_room(&self, uid: &str, player_name: Option<&str>) {
        let display_name = crate::protocol::validation::sanitize_player_name(
            player_name,
            &self.display_name_of(uid),
        );

        let mut attempts = 0u32;
        let created: Option<Room> = loop {
            if attempts >= self.config().room_code_attempts {
                break None;
            }
            attempts += 1;

            let code = room_codes::generate_room_code();
            let room = Room::new(code, uid.to_string());
            let host = Player {
                uid: uid.to_string(),
                name: display_name.clone(),
                avatar_url: None,
                join_order: 1,
                score: 0,
                online: true,
                role: Role::Player,
                joined_at: chrono::Utc::now(),
            };

            match self.store().create_room(room.clone(), host).await {
                Ok(()) => break Some(room),
                Err(err) if err.downcast_ref::<RoomCodeTakenError>().is_some() => {
                    tracing::debug!(%uid, attempts, "Room code collision, regenerating");
                    continue;
                }
                Err(err) => {
                    tracing::error!(%uid, error = %err, "Failed to create room");
                    let message = self.internal_error_message(&err);
                    self.reply_error(uid, message, ErrorCode::RoomCreationFailed)
                        .await;
                    return;
                }
            }
        };

        let Some(room) = created else {
            tracing::error!(%uid, attempts, "Exhausted room code attempts");
            self.reply_error(
                uid,
                "Could not allocate a room code; server at capacity",
                ErrorCode::RoomCreationFailed,
            )
            .await;
            return;
        };

        if let Err(err) = self.dispatcher().join_room_channel(uid, room.id).await {
            tracing::warn!(%uid, room_id = %room.id, error = %err, "Failed to subscribe creator to room channel");
        }

        tracing::info!(
            %uid,
            room_id = %room.id,
            room_code = %room.code,
            instance_id = %self.instance_id(),
            "Room created"
        );

        self.reply(
            uid,
            ServerEvent::RoomCreated {
                room_id: room.id,
                room_code: room.code.clone(),
            },
        )
        .await;
    }

    /// Resolve a room code to a room id. Codes are normalized to uppercase.
    pub async fn lookup_by_code(&self, code: &str) -> anyhow::Result<Option<RoomId>> {
        let normalized = code.trim().to_ascii_uppercase();
        if !room_codes::is_well_formed(&normalized) {
            return Ok(None);
        }
        self.store().find_room_by_code(&normalized).await
    }
}
