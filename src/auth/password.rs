use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })
}

/// Checks `plain` against a user's stored hash. Anonymous accounts have no
/// hash and never match. `Err` only when the stored hash is unreadable.
pub fn verify_stored(plain: &str, stored: Option<&str>) -> anyhow::Result<bool> {
    let Some(stored) = stored else {
        return Ok(false);
    };
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter22").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_stored("hunter22", Some(&hash)).expect("verify should succeed"));
        assert!(!verify_stored("hunter23", Some(&hash)).expect("verify should not error"));
    }

    #[test]
    fn anonymous_account_never_matches() {
        assert!(!verify_stored("", None).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(verify_stored("anything", Some("plaintext-in-db")).is_err());
    }
}
