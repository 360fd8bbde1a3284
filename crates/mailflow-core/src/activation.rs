//! Account activation tokens
//!
//! HMAC-SHA256 over the user id and current password hash, keyed by the
//! server secret. Binding the password hash into the token means a
//! password change invalidates outstanding activation links.

use hmac::{Hmac, Mac};
use mailflow_common::types::UserId;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, user_id: UserId, password_hash: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(user_id.as_bytes());
    mac.update(password_hash.as_bytes());
    mac
}

/// Generate the activation token for a user
pub fn activation_token(secret: &str, user_id: UserId, password_hash: &str) -> String {
    let mac = mac_for(secret, user_id, password_hash);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an activation token in constant time
pub fn verify_activation_token(
    secret: &str,
    user_id: UserId,
    password_hash: &str,
    token: &str,
) -> bool {
    let Ok(bytes) = hex::decode(token) else {
        return false;
    };
    mac_for(secret, user_id, password_hash)
        .verify_slice(&bytes)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = activation_token("secret", user_id, "$argon2$hash");
        assert!(verify_activation_token("secret", user_id, "$argon2$hash", &token));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let user_id = Uuid::new_v4();
        let mut token = activation_token("secret", user_id, "$argon2$hash");
        token.replace_range(0..1, if token.starts_with('0') { "1" } else { "0" });
        assert!(!verify_activation_token("secret", user_id, "$argon2$hash", &token));
    }

    #[test]
    fn token_is_bound_to_user_and_password() {
        let user_id = Uuid::new_v4();
        let token = activation_token("secret", user_id, "$argon2$hash");
        assert!(!verify_activation_token("secret", Uuid::new_v4(), "$argon2$hash", &token));
        assert!(!verify_activation_token("secret", user_id, "$argon2$other", &token));
        assert!(!verify_activation_token("other-secret", user_id, "$argon2$hash", &token));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let user_id = Uuid::new_v4();
        assert!(!verify_activation_token("secret", user_id, "hash", "not-hex"));
        assert!(!verify_activation_token("secret", user_id, "hash", ""));
    }
}
