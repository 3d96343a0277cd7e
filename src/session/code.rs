use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a game code.
pub const GAME_CODE_LENGTH: usize = 6;

/// Short human-enterable code students type to join a live session.
///
/// Always exactly six ASCII digits, zero-padded. Codes are only unique among
/// sessions that are still `waiting` or `active`; once a session completes
/// its code may be handed out again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameCode(String);

/// Error returned when parsing a malformed game code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid game code `{0}`: expected exactly {GAME_CODE_LENGTH} digits")]
pub struct InvalidGameCode(String);

impl GameCode {
    /// Draw a uniformly random code, zero-padded to six digits.
    pub fn random() -> Self {
        let value = rand::rng().random_range(0..1_000_000u32);
        Self(format!("{value:06}"))
    }

    /// Borrow the code as its canonical digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameCode {
    type Err = InvalidGameCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.len() == GAME_CODE_LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(InvalidGameCode(raw.to_owned()))
        }
    }
}

impl TryFrom<String> for GameCode {
    type Error = InvalidGameCode;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<GameCode> for String {
    fn from(code: GameCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_six_digits() {
        for _ in 0..256 {
            let code = GameCode::random();
            assert_eq!(code.as_str().len(), GAME_CODE_LENGTH);
            assert!(code.as_str().bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn parse_accepts_zero_padded_codes() {
        let code: GameCode = "004217".parse().unwrap();
        assert_eq!(code.as_str(), "004217");
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let code: GameCode = " 123456 ".parse().unwrap();
        assert_eq!(code.as_str(), "123456");
    }

    #[test]
    fn parse_rejects_malformed_codes() {
        for raw in ["", "12345", "1234567", "12a456", "12 456"] {
            assert!(raw.parse::<GameCode>().is_err(), "accepted `{raw}`");
        }
    }

    #[test]
    fn round_trips_through_serde() {
        let code: GameCode = "900431".parse().unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"900431\"");
        let back: GameCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
