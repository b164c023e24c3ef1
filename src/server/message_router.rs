use std::sync::Arc;

use super::TriviaServer;
use crate::protocol::{validation, ClientEvent, ErrorCode, RoomId, ServerEvent};

impl TriviaServer {
    /// Route one inbound client event to its handler. The uid comes from the
    /// authenticated connection, never from the payload. Nothing escapes:
    /// every failure path ends in an ack reply to the caller.
    pub async fn handle_client_event(self: &Arc<Self>, uid: &str, event: ClientEvent) {
        match event {
            ClientEvent::CreateRoom { player_name } => {
                self.handle_create_room(uid, player_name.as_deref()).await;
            }
            ClientEvent::JoinRoom {
                room_code,
                player_name,
            } => {
                self.handle_join_room(uid, &room_code, player_name.as_deref())
                    .await;
            }
            ClientEvent::LeaveRoom { room_id } => {
                self.handle_leave_room(uid, room_id).await;
            }
            ClientEvent::UpdateSettings { room_id, settings } => {
                self.handle_update_settings(uid, room_id, settings).await;
            }
            ClientEvent::StartGame { room_id, settings } => {
                self.handle_start_game(uid, room_id, settings).await;
            }
            ClientEvent::SubmitAnswer {
                room_id,
                question_id,
                answer_index,
            } => {
                self.handle_submit_answer(uid, room_id, &question_id, answer_index)
                    .await;
            }
            ClientEvent::SubmitSteal {
                room_id,
                question_id,
                answer_index,
            } => {
                self.handle_submit_steal(uid, room_id, &question_id, answer_index)
                    .await;
            }
            ClientEvent::PlayAgain { room_id } => {
                self.handle_play_again(uid, room_id).await;
            }
            ClientEvent::Rejoin { room_id } => {
                self.handle_rejoin(uid, room_id).await;
            }
            ClientEvent::LobbyMessage { room_id, message } => {
                self.handle_lobby_message(uid, room_id, &message).await;
            }
            ClientEvent::PrivateMessage {
                room_id: _,
                to_uid,
                message,
            } => {
                self.handle_private_message(uid, &to_uid, &message).await;
            }
        }
    }

    /// Room-wide chat. Sender must be a member; bodies are length-capped.
    async fn handle_lobby_message(&self, uid: &str, room_id: RoomId, message: &str) {
        if let Err(reason) = validation::validate_chat_message(message) {
            self.reply_error(uid, reason, ErrorCode::MessageTooLarge)
                .await;
            return;
        }

        let is_member = match self.store().get_player(&room_id, uid).await {
            Ok(player) => player.is_some(),
            Err(err) => {
                let reply = self.internal_error_message(&err);
                self.reply_error(uid, reply, ErrorCode::StorageError).await;
                return;
            }
        };
        if !is_member {
            self.reply_error(
                uid,
                "You are not a participant in this room",
                ErrorCode::NotInRoom,
            )
            .await;
            return;
        }

        self.broadcast(
            &room_id,
            ServerEvent::LobbyMessage {
                from_uid: uid.to_string(),
                from_name: self.display_name_of(uid),
                message: message.to_string(),
            },
        )
        .await;
    }

    /// Point-to-point relay to another connected user.
    async fn handle_private_message(&self, uid: &str, to_uid: &str, message: &str) {
        if let Err(reason) = validation::validate_chat_message(message) {
            self.reply_error(uid, reason, ErrorCode::MessageTooLarge)
                .await;
            return;
        }

        if !self.dispatcher().is_connected(to_uid).await {
            self.reply_error(uid, "That user is not online", ErrorCode::InvalidInput)
                .await;
            return;
        }

        self.reply(
            to_uid,
            ServerEvent::PrivateMessage {
                from_uid: uid.to_string(),
                message: message.to_string(),
            },
        )
        .await;
    }
}
