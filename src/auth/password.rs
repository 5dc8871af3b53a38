//! Argon2id credential hashing for account passwords.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("stored password hash is corrupt: {0}")]
    CorruptHash(argon2::password_hash::Error),
}

/// Registration rule for a new password; `None` when it is acceptable.
pub fn password_constraint(plain: &str) -> Option<String> {
    if plain.trim().is_empty() {
        return Some("required".into());
    }
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Some(format!("min={MIN_PASSWORD_LEN}"));
    }
    None
}

pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// Accounts without a stored hash can never log in.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    if stored.is_empty() {
        return Ok(false);
    }
    let parsed = PasswordHash::new(stored).map_err(PasswordError::CorruptHash)?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verify() {
        let first = hash_password("correct-horse").expect("hash");
        let second = hash_password("correct-horse").expect("hash");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse", &first).expect("verify"));
        assert!(!verify_password("battery-staple", &first).expect("verify"));
    }

    #[test]
    fn blank_hash_never_matches() {
        assert!(!verify_password("", "").expect("verify"));
        assert!(!verify_password("anything", "").expect("verify"));
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordError::CorruptHash(_))
        ));
    }

    #[test]
    fn registration_rule_counts_characters() {
        assert_eq!(password_constraint("   ").as_deref(), Some("required"));
        assert_eq!(password_constraint("short").as_deref(), Some("min=8"));
        assert_eq!(password_constraint("pässwörd"), None);
    }
}
