use std::sync::Arc;

use thiserror::Error;
use tokio::time::Duration;

use super::{collect_scores, TimerContext, TimerPhase, TriviaServer};
use crate::protocol::{
    ErrorCode, GameSnapshot, Player, PublicQuestion, Question, Room, RoomId, RoomState,
    ServerEvent, SettingsPatch, StealAttempt, Uid,
};
use crate::trivia::{prepare_question, QuestionSourceError};

/// Failure modes of a game start. The room stays `waiting` on every one of
/// these; nothing is persisted until the start batch commits.
#[derive(Debug, Error)]
pub enum StartGameError {
    #[error("the room is not waiting for a game to start")]
    NotWaiting,
    #[error("at least two online players are required to start")]
    NotEnoughPlayers,
    #[error(transparent)]
    InvalidSettings(#[from] crate::protocol::SettingsError),
    #[error("question source returned {returned} of {requested} questions")]
    NotEnoughQuestions { requested: usize, returned: usize },
    #[error("question source unavailable: {0}")]
    SourceUnavailable(String),
    #[error(transparent)]
    Store(anyhow::Error),
}

impl TriviaServer {
    // ------------------------------------------------------------------
    // startGame
    // ------------------------------------------------------------------

    /// Host entrypoint for `game:start`.
    pub async fn handle_start_game(
        self: &Arc<Self>,
        uid: &str,
        room_id: RoomId,
        overrides: Option<SettingsPatch>,
    ) {
        let _guard = self.lock_room(room_id).await;

        let mut room = match self.store().get_room(&room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.reply_error(uid, "Room not found", ErrorCode::RoomNotFound)
                    .await;
                return;
            }
            Err(err) => {
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };

        if room.host_uid != uid {
            self.reply_error(uid, "Only the host may start the game", ErrorCode::NotHost)
                .await;
            return;
        }

        match self.start_game_locked(&mut room, overrides.as_ref()).await {
            Ok(snapshot) => {
                self.broadcast(&room_id, ServerEvent::GameStarted(Box::new(snapshot)))
                    .await;
            }
            Err(err) => {
                let (message, code) = start_error_reply(&err);
                tracing::warn!(%room_id, host = %uid, error = %err, "Game start rejected");
                self.reply_error(uid, message, code).await;
            }
        }
    }

    /// Start a game in a waiting room. Caller holds the room lock.
    ///
    /// On success the room document, the freshly shuffled questions and the
    /// zeroed scores are committed in one atomic batch, the first turn timer
    /// is armed, and the initial snapshot is returned for broadcast.
    pub(crate) async fn start_game_locked(
        self: &Arc<Self>,
        room: &mut Room,
        overrides: Option<&SettingsPatch>,
    ) -> Result<GameSnapshot, StartGameError> {
        if room.state != RoomState::Waiting {
            return Err(StartGameError::NotWaiting);
        }

        let players = self
            .store()
            .list_players(&room.id)
            .await
            .map_err(StartGameError::Store)?;

        // Rotation snapshot: online player-role members in join order.
        let participants: Vec<&Player> =
            players.iter().filter(|p| p.is_active_player()).collect();
        if participants.len() < 2 {
            return Err(StartGameError::NotEnoughPlayers);
        }

        let settings = match overrides {
            Some(patch) => crate::protocol::validation::validate_settings_patch(
                &room.settings,
                patch,
            )?,
            None => room.settings.clone(),
        };

        let question_count = participants.len() * settings.questions_per_player as usize;
        let raw = self
            .question_source()
            .fetch(question_count)
            .await
            .map_err(|err| match err {
                QuestionSourceError::NotEnough {
                    requested,
                    returned,
                } => StartGameError::NotEnoughQuestions {
                    requested,
                    returned,
                },
                QuestionSourceError::Unavailable(message) => {
                    StartGameError::SourceUnavailable(message)
                }
            })?;
        if raw.len() < question_count {
            return Err(StartGameError::NotEnoughQuestions {
                requested: question_count,
                returned: raw.len(),
            });
        }

        let questions: Vec<Question> = raw
            .iter()
            .take(question_count)
            .enumerate()
            .map(|(index, item)| prepare_question(index, item))
            .collect();

        let turn_order: Vec<Uid> = participants.iter().map(|p| p.uid.clone()).collect();
        let first_uid = turn_order[0].clone();

        room.state = RoomState::Active;
        room.settings = settings;
        room.question_count = question_count as u32;
        room.current_question_index = 0;
        room.turn_order = turn_order;
        room.current_turn_uid = Some(first_uid.clone());
        room.turn_cursor = 0;
        room.steal_attempt = None;
        room.started_at = Some(chrono::Utc::now());

        self.store()
            .commit_game_start(room, &questions)
            .await
            .map_err(StartGameError::Store)?;

        let first_question = &questions[0];
        self.arm_turn_timer(room, &first_question.id, &first_uid);

        tracing::info!(
            room_id = %room.id,
            room_code = %room.code,
            players = room.turn_order.len(),
            questions = room.question_count,
            "Game started"
        );

        let refreshed = self
            .store()
            .list_players(&room.id)
            .await
            .map_err(StartGameError::Store)?;

        Ok(GameSnapshot {
            room_id: room.id,
            question: PublicQuestion::from(first_question),
            turn_uid: first_uid,
            turn_timeout_sec: room.settings.turn_timeout_sec,
            scores: collect_scores(&refreshed),
            players: refreshed,
            total_questions: room.question_count,
            current_question_num: 1,
            settings: room.settings.clone(),
            host_uid: room.host_uid.clone(),
            questions: questions.iter().map(PublicQuestion::from).collect(),
        })
    }

    // ------------------------------------------------------------------
    // submitAnswer
    // ------------------------------------------------------------------

    /// Turn-taker entrypoint for `submitAnswer`.
    pub async fn handle_submit_answer(
        self: &Arc<Self>,
        uid: &str,
        room_id: RoomId,
        question_id: &str,
        answer_index: i32,
    ) {
        let _guard = self.lock_room(room_id).await;
        self.submit_answer_locked(room_id, uid, question_id, answer_index, false)
            .await;
    }

    /// The single answer reducer: natural submissions and timer-synthesized
    /// ones share this path. Caller holds the room lock.
    pub(crate) async fn submit_answer_locked(
        self: &Arc<Self>,
        room_id: RoomId,
        uid: &str,
        question_id: &str,
        answer_index: i32,
        is_timeout: bool,
    ) {
        let Some(mut room) = self.read_room_or_drop(room_id, uid, is_timeout).await else {
            return;
        };

        if room.state != RoomState::Active {
            if !is_timeout {
                self.reply_no_action(uid, Some("No active game in this room".to_string()))
                    .await;
            }
            return;
        }

        if room.current_turn_uid.as_deref() != Some(uid) {
            if is_timeout {
                // Stale timer: the turn moved on while the callback was queued.
                tracing::debug!(%room_id, %uid, "Dropping stale turn timeout");
            } else {
                self.reply_error(uid, "It is not your turn", ErrorCode::NotYourTurn)
                    .await;
            }
            return;
        }

        // A pending steal means this question was already answered wrong;
        // `current_turn_uid` still names the original turn-taker, so the
        // guards above cannot catch a duplicate resolution on their own.
        if room.steal_attempt.is_some() {
            if is_timeout {
                tracing::debug!(%room_id, %uid, "Dropping turn timeout; steal already in progress");
            } else {
                self.reply_no_action(uid, Some("A steal is already in progress".to_string()))
                    .await;
            }
            return;
        }

        let question = match self
            .store()
            .get_question(&room_id, room.current_question_index)
            .await
        {
            Ok(Some(question)) => question,
            Ok(None) => {
                self.end_game_with_error(&mut room, "Current question is missing")
                    .await;
                return;
            }
            Err(err) => {
                tracing::error!(%room_id, error = %err, "Failed to load current question");
                if !is_timeout {
                    let message = self.internal_error_message(&err);
                    self.reply_error(uid, message, ErrorCode::StorageError).await;
                }
                return;
            }
        };

        if question.id != question_id {
            if is_timeout {
                tracing::debug!(%room_id, %uid, "Dropping turn timeout for a past question");
            } else {
                self.reply_no_action(
                    uid,
                    Some("That question has already been resolved".to_string()),
                )
                .await;
            }
            return;
        }

        // Guards passed; this submission owns the turn.
        self.timers().cancel(&room_id, TimerPhase::Turn);

        let correct =
            !is_timeout && answer_index >= 0 && answer_index as usize == question.correct_index as usize;

        self.broadcast(
            &room_id,
            ServerEvent::AnswerResult {
                uid: uid.to_string(),
                question_id: question.id.clone(),
                correct,
                correct_index: question.correct_index,
                was_timeout: is_timeout,
            },
        )
        .await;

        let players = match self.store().list_players(&room_id).await {
            Ok(players) => players,
            Err(err) => {
                tracing::error!(%room_id, error = %err, "Failed to load players mid-turn");
                self.end_game_with_error(&mut room, "Player records unavailable")
                    .await;
                return;
            }
        };

        if correct {
            if let Err(err) = self.award_points(&room_id, uid, 1).await {
                tracing::error!(%room_id, %uid, error = %err, "Failed to persist score");
            }
            self.advance_after(&mut room, &players, uid).await;
            return;
        }

        // Wrong or timed out: offer the steal when one is viable. The
        // stealer must be a distinct online player and steals must be on.
        let stealer = self
            .next_player_after(&room, &players, uid)
            .filter(|(_, stealer_uid)| stealer_uid != uid && room.settings.allow_steal);

        let Some((_, stealer_uid)) = stealer else {
            self.advance_after(&mut room, &players, uid).await;
            return;
        };
        room.steal_attempt = Some(StealAttempt {
            stealer_uid: stealer_uid.clone(),
            question_index: room.current_question_index,
        });
        if let Err(err) = self.store().update_room(&room).await {
            tracing::error!(%room_id, error = %err, "Failed to persist steal attempt");
            self.advance_after(&mut room, &players, uid).await;
            return;
        }

        self.arm_steal_timer(&room, &question.id, &stealer_uid);
        self.broadcast(
            &room_id,
            ServerEvent::StealOpportunity {
                question_id: question.id,
                stealer_uid,
                steal_timeout_sec: room.settings.steal_timeout_sec,
            },
        )
        .await;
    }

    // ------------------------------------------------------------------
    // submitSteal
    // ------------------------------------------------------------------

    /// Stealer entrypoint for `submitSteal`.
    pub async fn handle_submit_steal(
        self: &Arc<Self>,
        uid: &str,
        room_id: RoomId,
        question_id: &str,
        answer_index: i32,
    ) {
        let _guard = self.lock_room(room_id).await;
        self.submit_steal_locked(room_id, uid, question_id, answer_index, false)
            .await;
    }

    /// Steal reducer, shared by user submissions and the steal timer.
    /// Caller holds the room lock.
    pub(crate) async fn submit_steal_locked(
        self: &Arc<Self>,
        room_id: RoomId,
        uid: &str,
        question_id: &str,
        answer_index: i32,
        is_timeout: bool,
    ) {
        let Some(mut room) = self.read_room_or_drop(room_id, uid, is_timeout).await else {
            return;
        };

        if room.state != RoomState::Active {
            if !is_timeout {
                self.reply_no_action(uid, Some("No active game in this room".to_string()))
                    .await;
            }
            return;
        }

        let Some(steal) = room.steal_attempt.clone() else {
            if is_timeout {
                tracing::debug!(%room_id, "Dropping stale steal timeout; no steal in progress");
            } else {
                self.reply_error(uid, "There is no steal in progress", ErrorCode::NotYourSteal)
                    .await;
            }
            return;
        };

        if steal.stealer_uid != uid || steal.question_index != room.current_question_index {
            if is_timeout {
                tracing::debug!(%room_id, %uid, "Dropping mismatched steal timeout");
            } else {
                self.reply_error(
                    uid,
                    "You are not the stealer for this question",
                    ErrorCode::NotYourSteal,
                )
                .await;
            }
            return;
        }

        let question = match self
            .store()
            .get_question(&room_id, room.current_question_index)
            .await
        {
            Ok(Some(question)) => question,
            Ok(None) => {
                self.end_game_with_error(&mut room, "Current question is missing")
                    .await;
                return;
            }
            Err(err) => {
                tracing::error!(%room_id, error = %err, "Failed to load steal question");
                if !is_timeout {
                    let message = self.internal_error_message(&err);
                    self.reply_error(uid, message, ErrorCode::StorageError).await;
                }
                return;
            }
        };

        if question.id != question_id {
            if is_timeout {
                tracing::debug!(%room_id, %uid, "Dropping steal timeout for a past question");
            } else {
                self.reply_error(
                    uid,
                    "That question has already been resolved",
                    ErrorCode::StaleSubmission,
                )
                .await;
            }
            return;
        }

        self.timers().cancel(&room_id, TimerPhase::Steal);

        let correct =
            !is_timeout && answer_index >= 0 && answer_index as usize == question.correct_index as usize;

        if correct {
            let reward = 1 + room.settings.bonus_for_steal;
            if let Err(err) = self.award_points(&room_id, uid, reward).await {
                tracing::error!(%room_id, %uid, error = %err, "Failed to persist steal score");
            }
        }

        self.broadcast(
            &room_id,
            ServerEvent::StealResult {
                uid: uid.to_string(),
                question_id: question.id.clone(),
                correct,
                correct_index: question.correct_index,
                was_timeout: is_timeout,
            },
        )
        .await;

        // Right or wrong, the stealer holds the next turn's question.
        let Some(stealer_cursor) = room.order_index_of(uid) else {
            self.end_game_with_error(&mut room, "Stealer is not in the turn order")
                .await;
            return;
        };

        let next_question_index = room.current_question_index + 1;
        self.advance_or_end_locked(
            &mut room,
            uid.to_string(),
            stealer_cursor,
            next_question_index,
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Rotation and transitions
    // ------------------------------------------------------------------

    /// Fixed-order rotation scan: the first online player-role member after
    /// `start_after_uid`, wrapping, at most one full cycle. Falls back to the
    /// current cursor when the uid is no longer in the order.
    pub(crate) fn next_player_after(
        &self,
        room: &Room,
        players: &[Player],
        start_after_uid: &str,
    ) -> Option<(usize, Uid)> {
        let n = room.turn_order.len();
        if n == 0 {
            return None;
        }

        let start = room
            .order_index_of(start_after_uid)
            .map(|index| index as i64)
            .unwrap_or_else(|| i64::from(room.turn_cursor).clamp(-1, n as i64 - 1));

        for step in 1..=n as i64 {
            let index = (start + step).rem_euclid(n as i64) as usize;
            let uid = &room.turn_order[index];
            let eligible = players
                .iter()
                .any(|player| &player.uid == uid && player.is_active_player());
            if eligible {
                return Some((index, uid.clone()));
            }
        }
        None
    }

    /// Advance to the next question with the player after `after_uid`, or
    /// end the game when nobody can take the turn.
    async fn advance_after(self: &Arc<Self>, room: &mut Room, players: &[Player], after_uid: &str) {
        match self.next_player_after(room, players, after_uid) {
            Some((cursor, uid)) => {
                let next_question_index = room.current_question_index + 1;
                self.advance_or_end_locked(room, uid, cursor, next_question_index)
                    .await;
            }
            None => {
                self.end_game_locked(room, Some("No online players can take the next turn"))
                    .await;
            }
        }
    }

    /// Move the room to `(new_turn_uid, new_cursor, new_question_index)` or
    /// end the game. The uniform under-two-players check lives here so every
    /// transition path enforces it. Caller holds the room lock.
    pub(crate) async fn advance_or_end_locked(
        self: &Arc<Self>,
        room: &mut Room,
        new_turn_uid: Uid,
        new_cursor: usize,
        new_question_index: u32,
    ) {
        let players = match self.store().list_players(&room.id).await {
            Ok(players) => players,
            Err(err) => {
                tracing::error!(room_id = %room.id, error = %err, "Failed to load players for transition");
                self.end_game_with_error(room, "Player records unavailable")
                    .await;
                return;
            }
        };

        if Self::online_players_in_order(room, &players) < 2 {
            self.end_game_locked(room, Some("Not enough players to continue"))
                .await;
            return;
        }

        if new_question_index >= room.question_count {
            self.end_game_locked(room, None).await;
            return;
        }

        let question = match self.store().get_question(&room.id, new_question_index).await {
            Ok(Some(question)) => question,
            Ok(None) => {
                // Integrity fault: the subcollection is short a document.
                self.end_game_with_error(room, "Next question could not be loaded")
                    .await;
                return;
            }
            Err(err) => {
                tracing::error!(room_id = %room.id, error = %err, "Failed to load next question");
                self.end_game_with_error(room, "Next question could not be loaded")
                    .await;
                return;
            }
        };

        // The chosen player may have dropped since selection; recover once.
        let (turn_uid, cursor) = {
            let still_eligible = players
                .iter()
                .any(|p| p.uid == new_turn_uid && p.is_active_player());
            if still_eligible {
                (new_turn_uid, new_cursor)
            } else {
                match self.next_player_after(room, &players, &new_turn_uid) {
                    Some((cursor, uid)) => (uid, cursor),
                    None => {
                        self.end_game_locked(room, Some("No online players can take the next turn"))
                            .await;
                        return;
                    }
                }
            }
        };

        room.current_question_index = new_question_index;
        room.current_turn_uid = Some(turn_uid.clone());
        room.turn_cursor = cursor as i32;
        room.steal_attempt = None;

        if let Err(err) = self.store().update_room(room).await {
            tracing::error!(room_id = %room.id, error = %err, "Failed to persist turn transition");
            self.end_game_with_error(room, "Could not persist the next turn")
                .await;
            return;
        }

        self.arm_turn_timer(room, &question.id, &turn_uid);

        self.broadcast(
            &room.id,
            ServerEvent::NextTurn {
                question: PublicQuestion::from(&question),
                turn_uid,
                timeout_sec: room.settings.turn_timeout_sec,
                current_question_num: new_question_index + 1,
                total_questions: room.question_count,
            },
        )
        .await;
    }

    /// Voluntary mid-game departure: the leaver is already trimmed from the
    /// rotation. End the game if the room fell under two online players;
    /// otherwise hand a stranded turn or steal to the next player.
    pub(crate) async fn reconcile_after_departure(
        self: &Arc<Self>,
        room: &mut Room,
        departed_uid: &str,
    ) {
        let players = match self.store().list_players(&room.id).await {
            Ok(players) => players,
            Err(err) => {
                tracing::error!(room_id = %room.id, error = %err, "Failed to load players after departure");
                self.end_game_with_error(room, "Player records unavailable")
                    .await;
                return;
            }
        };

        if Self::online_players_in_order(room, &players) < 2 {
            self.end_game_locked(room, Some("Not enough players to continue"))
                .await;
            return;
        }

        let held_steal = room
            .steal_attempt
            .as_ref()
            .is_some_and(|steal| steal.stealer_uid == departed_uid);
        let held_turn = room.current_turn_uid.as_deref() == Some(departed_uid);

        if held_steal {
            self.timers().cancel(&room.id, TimerPhase::Steal);
            room.steal_attempt = None;
            let resume_from = room.current_turn_uid.clone().unwrap_or_default();
            self.advance_after(room, &players, &resume_from).await;
        } else if held_turn {
            self.timers().cancel(&room.id, TimerPhase::Turn);
            // The abandoned question is skipped; no steal for a walk-away.
            self.advance_after(room, &players, departed_uid).await;
        }
    }

    // ------------------------------------------------------------------
    // Game end
    // ------------------------------------------------------------------

    /// Terminal transition. Clears timers and turn state, persists the ended
    /// room, and emits the final scores. Caller holds the room lock.
    pub(crate) async fn end_game_locked(&self, room: &mut Room, reason: Option<&str>) {
        self.timers().cancel_all(&room.id);

        room.state = RoomState::Ended;
        room.current_turn_uid = None;
        room.turn_cursor = -1;
        room.steal_attempt = None;

        if let Err(err) = self.store().update_room(room).await {
            tracing::error!(room_id = %room.id, error = %err, "Failed to persist game end");
        }

        let final_scores = match self.score_board(&room.id).await {
            Ok(scores) => scores,
            Err(err) => {
                tracing::error!(room_id = %room.id, error = %err, "Failed to load final scores");
                Default::default()
            }
        };

        tracing::info!(
            room_id = %room.id,
            room_code = %room.code,
            reason = reason.unwrap_or("completed"),
            "Game ended"
        );

        self.broadcast(
            &room.id,
            ServerEvent::GameEnded {
                final_scores,
                reason: reason.map(str::to_string),
            },
        )
        .await;
    }

    /// Integrity-fault end: a `gameError` broadcast followed by the normal
    /// graceful end with current scores.
    pub(crate) async fn end_game_with_error(&self, room: &mut Room, message: &str) {
        tracing::error!(room_id = %room.id, detail = %message, "Game integrity fault; ending game");
        self.broadcast(
            &room.id,
            ServerEvent::GameError {
                message: message.to_string(),
            },
        )
        .await;
        self.end_game_locked(room, Some(message)).await;
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    pub(crate) fn arm_turn_timer(self: &Arc<Self>, room: &Room, question_id: &str, turn_uid: &str) {
        let server = Arc::clone(self);
        self.timers().arm(
            TimerContext {
                room_id: room.id,
                phase: TimerPhase::Turn,
                question_id: question_id.to_string(),
                expected_uid: turn_uid.to_string(),
            },
            Duration::from_secs(u64::from(room.settings.turn_timeout_sec)),
            move |ctx| async move {
                server.handle_timer_fired(ctx).await;
            },
        );
    }

    pub(crate) fn arm_steal_timer(
        self: &Arc<Self>,
        room: &Room,
        question_id: &str,
        stealer_uid: &str,
    ) {
        let server = Arc::clone(self);
        self.timers().arm(
            TimerContext {
                room_id: room.id,
                phase: TimerPhase::Steal,
                question_id: question_id.to_string(),
                expected_uid: stealer_uid.to_string(),
            },
            Duration::from_secs(u64::from(room.settings.steal_timeout_sec)),
            move |ctx| async move {
                server.handle_timer_fired(ctx).await;
            },
        );
    }

    /// Timer callback. Takes the same per-room lock as inbound events, then
    /// revalidates the armed context against freshly-read state: room still
    /// active, same question, same expected uid for the phase. Stale timers
    /// are dropped without any state change; valid ones re-enter the submit
    /// path as a synthesized timeout answer.
    pub(crate) async fn handle_timer_fired(self: &Arc<Self>, ctx: TimerContext) {
        let _guard = self.lock_room(ctx.room_id).await;

        let room = match self.store().get_room(&ctx.room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(room_id = %ctx.room_id, error = %err, "Timer could not re-read room");
                return;
            }
        };

        if room.state != RoomState::Active {
            return;
        }

        let current_question = match self
            .store()
            .get_question(&ctx.room_id, room.current_question_index)
            .await
        {
            Ok(Some(question)) => question,
            _ => return,
        };
        if current_question.id != ctx.question_id {
            return;
        }

        let expected = match ctx.phase {
            TimerPhase::Turn => room.current_turn_uid.clone(),
            TimerPhase::Steal => room
                .steal_attempt
                .as_ref()
                .map(|steal| steal.stealer_uid.clone()),
        };
        if expected.as_deref() != Some(ctx.expected_uid.as_str()) {
            return;
        }

        tracing::debug!(
            room_id = %ctx.room_id,
            phase = %ctx.phase,
            uid = %ctx.expected_uid,
            "Timer expired; synthesizing timeout submission"
        );

        match ctx.phase {
            TimerPhase::Turn => {
                self.submit_answer_locked(ctx.room_id, &ctx.expected_uid, &ctx.question_id, -1, true)
                    .await;
            }
            TimerPhase::Steal => {
                self.submit_steal_locked(ctx.room_id, &ctx.expected_uid, &ctx.question_id, -1, true)
                    .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Small helpers
    // ------------------------------------------------------------------

    async fn read_room_or_drop(
        &self,
        room_id: RoomId,
        uid: &str,
        is_timeout: bool,
    ) -> Option<Room> {
        match self.store().get_room(&room_id).await {
            Ok(Some(room)) => Some(room),
            Ok(None) => {
                if !is_timeout {
                    self.reply_error(uid, "Room not found", ErrorCode::RoomNotFound)
                        .await;
                }
                None
            }
            Err(err) => {
                tracing::error!(%room_id, error = %err, "Failed to read room");
                if !is_timeout {
                    let message = self.internal_error_message(&err);
                    self.reply_error(uid, message, ErrorCode::StorageError).await;
                }
                None
            }
        }
    }

    /// Persist a score increment and broadcast the new board.
    async fn award_points(&self, room_id: &RoomId, uid: &str, points: u32) -> anyhow::Result<()> {
        self.store().add_score(room_id, uid, points).await?;
        let scores = self.score_board(room_id).await?;
        self.broadcast(room_id, ServerEvent::ScoreUpdate { scores })
            .await;
        Ok(())
    }
}

fn start_error_reply(err: &StartGameError) -> (String, ErrorCode) {
    let code = match err {
        StartGameError::NotWaiting => ErrorCode::InvalidRoomState,
        StartGameError::NotEnoughPlayers => ErrorCode::NotEnoughPlayers,
        StartGameError::InvalidSettings(_) => ErrorCode::InvalidSettings,
        StartGameError::NotEnoughQuestions { .. } => ErrorCode::NotEnoughQuestions,
        StartGameError::SourceUnavailable(_) | StartGameError::Store(_) => ErrorCode::InternalError,
    };
    (err.to_string(), code)
}
