use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{GameSettings, MAX_LOBBY_MESSAGE_LENGTH};

/// Allowed range for `questions_per_player`.
pub const QUESTIONS_PER_PLAYER_RANGE: (i64, i64) = (1, 20);
/// Allowed range for `turn_timeout_sec`.
pub const TURN_TIMEOUT_RANGE: (i64, i64) = (5, 60);
/// Allowed range for `steal_timeout_sec`.
pub const STEAL_TIMEOUT_RANGE: (i64, i64) = (3, 30);
/// Allowed range for `bonus_for_steal`.
pub const BONUS_FOR_STEAL_RANGE: (i64, i64) = (0, 5);

/// Maximum display name length accepted from clients.
pub const MAX_PLAYER_NAME_LENGTH: usize = 32;

/// Partial settings update from a client. Unknown JSON keys are dropped by
/// serde; absent fields keep their persisted values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_per_player: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_timeout_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steal_timeout_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_steal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_for_steal: Option<i64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.questions_per_player.is_none()
            && self.turn_timeout_sec.is_none()
            && self.steal_timeout_sec.is_none()
            && self.allow_steal.is_none()
            && self.bonus_for_steal.is_none()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

fn checked_field(
    field: &'static str,
    value: Option<i64>,
    range: (i64, i64),
    fallback: u32,
) -> Result<u32, SettingsError> {
    match value {
        None => Ok(fallback),
        Some(raw) => {
            let (min, max) = range;
            if raw < min || raw > max {
                return Err(SettingsError::OutOfRange {
                    field,
                    min,
                    max,
                    value: raw,
                });
            }
            // Bounds above guarantee the value fits in u32.
            Ok(raw as u32)
        }
    }
}

/// Merge a patch over existing settings, rejecting the entire call if any
/// field falls outside its documented range.
pub fn validate_settings_patch(
    base: &GameSettings,
    patch: &SettingsPatch,
) -> Result<GameSettings, SettingsError> {
    Ok(GameSettings {
        questions_per_player: checked_field(
            "questions_per_player",
            patch.questions_per_player,
            QUESTIONS_PER_PLAYER_RANGE,
            base.questions_per_player,
        )?,
        turn_timeout_sec: checked_field(
            "turn_timeout_sec",
            patch.turn_timeout_sec,
            TURN_TIMEOUT_RANGE,
            base.turn_timeout_sec,
        )?,
        steal_timeout_sec: checked_field(
            "steal_timeout_sec",
            patch.steal_timeout_sec,
            STEAL_TIMEOUT_RANGE,
            base.steal_timeout_sec,
        )?,
        allow_steal: patch.allow_steal.unwrap_or(base.allow_steal),
        bonus_for_steal: checked_field(
            "bonus_for_steal",
            patch.bonus_for_steal,
            BONUS_FOR_STEAL_RANGE,
            base.bonus_for_steal,
        )?,
    })
}

/// Normalize a client-supplied display name, falling back when absent or
/// unusable. Names are trimmed and truncated rather than rejected; a join
/// should not fail over a long nickname.
pub fn sanitize_player_name(name: Option<&str>, fallback: &str) -> String {
    let trimmed = name.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(MAX_PLAYER_NAME_LENGTH).collect()
}

/// Validate a lobby or private chat message body.
pub fn validate_chat_message(message: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if message.chars().count() > MAX_LOBBY_MESSAGE_LENGTH {
        return Err(format!(
            "Message too long (max {MAX_LOBBY_MESSAGE_LENGTH} characters)"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_patch_keeps_base() {
        let base = GameSettings::default();
        let merged = validate_settings_patch(&base, &SettingsPatch::default()).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn patch_merges_over_base() {
        let base = GameSettings::default();
        let patch = SettingsPatch {
            questions_per_player: Some(2),
            allow_steal: Some(false),
            ..Default::default()
        };
        let merged = validate_settings_patch(&base, &patch).unwrap();
        assert_eq!(merged.questions_per_player, 2);
        assert!(!merged.allow_steal);
        assert_eq!(merged.turn_timeout_sec, base.turn_timeout_sec);
    }

    #[test]
    fn out_of_range_field_fails_the_entire_call() {
        let base = GameSettings::default();
        let patch = SettingsPatch {
            questions_per_player: Some(3),
            turn_timeout_sec: Some(61),
            ..Default::default()
        };
        let err = validate_settings_patch(&base, &patch).unwrap_err();
        assert_eq!(
            err,
            SettingsError::OutOfRange {
                field: "turn_timeout_sec",
                min: 5,
                max: 60,
                value: 61,
            }
        );
    }

    #[test]
    fn unknown_keys_are_dropped_by_serde() {
        let raw = serde_json::json!({
            "questions_per_player": 4,
            "someFutureKnob": "ignored"
        });
        let patch: SettingsPatch = serde_json::from_value(raw).unwrap();
        assert_eq!(patch.questions_per_player, Some(4));
    }

    #[test]
    fn name_sanitizer_trims_and_truncates() {
        assert_eq!(sanitize_player_name(Some("  Alice  "), "anon"), "Alice");
        assert_eq!(sanitize_player_name(Some("   "), "anon"), "anon");
        assert_eq!(sanitize_player_name(None, "anon"), "anon");
        let long = "x".repeat(100);
        assert_eq!(
            sanitize_player_name(Some(&long), "anon").len(),
            MAX_PLAYER_NAME_LENGTH
        );
    }

    #[test]
    fn chat_message_bounds() {
        assert!(validate_chat_message("hello").is_ok());
        assert!(validate_chat_message("   ").is_err());
        assert!(validate_chat_message(&"a".repeat(501)).is_err());
        assert!(validate_chat_message(&"a".repeat(500)).is_ok());
    }

    proptest! {
        #[test]
        fn in_range_patches_always_validate(
            qpp in 1i64..=20,
            turn in 5i64..=60,
            steal in 3i64..=30,
            bonus in 0i64..=5,
            allow in any::<bool>(),
        ) {
            let patch = SettingsPatch {
                questions_per_player: Some(qpp),
                turn_timeout_sec: Some(turn),
                steal_timeout_sec: Some(steal),
                allow_steal: Some(allow),
                bonus_for_steal: Some(bonus),
            };
            let merged = validate_settings_patch(&GameSettings::default(), &patch).unwrap();
            prop_assert_eq!(merged.questions_per_player as i64, qpp);
            prop_assert_eq!(merged.turn_timeout_sec as i64, turn);
            prop_assert_eq!(merged.steal_timeout_sec as i64, steal);
            prop_assert_eq!(merged.bonus_for_steal as i64, bonus);
            prop_assert_eq!(merged.allow_steal, allow);
        }

        #[test]
        fn out_of_range_values_always_fail(raw in prop_oneof![(-1000i64..=0), (21i64..=1000)]) {
            let patch = SettingsPatch {
                questions_per_player: Some(raw),
                ..Default::default()
            };
            prop_assert!(validate_settings_patch(&GameSettings::default(), &patch).is_err());
        }
    }
}
