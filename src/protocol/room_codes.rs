use rand::RngExt;

use super::types::ROOM_CODE_LENGTH;

/// Alphabet for room codes: uppercase letters and digits, excluding the
/// easily-confused characters 0, O, I and 1.
const CLEAN_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a 6-character room code from the clean alphabet.
pub fn generate_room_code() -> String {
    generate_room_code_of_length(ROOM_CODE_LENGTH)
}

/// Generate a clean room code of the requested length.
pub fn generate_room_code_of_length(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CLEAN_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CLEAN_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Check that a client-supplied code has the right shape before hitting the
/// store. Codes are normalized to uppercase by the caller.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.bytes().all(|b| CLEAN_CHARS.contains(&b))
}
