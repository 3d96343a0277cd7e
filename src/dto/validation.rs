//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::session::code::GAME_CODE_LENGTH;

/// Validates that a game code is exactly 6 ASCII digits.
///
/// Codes are zero-padded at generation, so "004217" is valid while "4217"
/// is not.
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != GAME_CODE_LENGTH {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(
            format!(
                "Game code must be exactly {GAME_CODE_LENGTH} digits (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|b| b.is_ascii_digit()) {
        let mut err = ValidationError::new("game_code_format");
        err.message = Some("Game code must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_game_code_valid() {
        assert!(validate_game_code("123456").is_ok());
        assert!(validate_game_code("000000").is_ok());
        assert!(validate_game_code("004217").is_ok());
    }

    #[test]
    fn test_validate_game_code_invalid_length() {
        assert!(validate_game_code("12345").is_err()); // too short
        assert!(validate_game_code("1234567").is_err()); // too long
        assert!(validate_game_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_game_code_invalid_format() {
        assert!(validate_game_code("12345a").is_err()); // letter
        assert!(validate_game_code("12 456").is_err()); // space
        assert!(validate_game_code("12.456").is_err()); // punctuation
    }
}
