use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 7;
pub const MAX_PASSWORD_LEN: usize = 100;

/// Salt and one-way hash derived from a plaintext password.
/// `hash` is a PHC string and already embeds `salt`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

pub fn check_password_policy(plain: &str) -> Result<(), String> {
    let len = plain.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

pub fn derive_credential(plain: &str) -> anyhow::Result<Credential> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(Credential {
        salt: salt.as_str().to_string(),
        hash,
    })
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
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
    fn derive_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let credential = derive_credential(password).expect("hashing should succeed");
        assert!(verify_password(password, &credential.hash).expect("verify should succeed"));
        assert!(credential.hash.contains(&credential.salt));
        assert!(!credential.hash.contains(password));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let credential = derive_credential("correct-horse-battery-staple").unwrap();
        assert!(!verify_password("wrong-password", &credential.hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn each_derivation_uses_a_fresh_salt() {
        let a = derive_credential("same-password").unwrap();
        let b = derive_credential("same-password").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn policy_bounds_are_inclusive() {
        assert!(check_password_policy("123456").is_err());
        assert!(check_password_policy("1234567").is_ok());
        assert!(check_password_policy(&"x".repeat(100)).is_ok());
        assert!(check_password_policy(&"x".repeat(101)).is_err());
    }
}
