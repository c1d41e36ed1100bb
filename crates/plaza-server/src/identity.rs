use hmac::{Hmac, Mac};
use sha2::Sha256;

use plaza_core::participant::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Longest accepted user id, applied after verification.
const MAX_USER_ID_LEN: usize = 64;

/// External identity-verification collaborator: resolves an already-issued
/// credential to a user identity, or refuses it.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Option<UserId>;
}

/// Verifies HMAC-SHA256 signed credentials of the form `<user-id>.<hex sig>`.
/// With no secret configured, verification is disabled and the credential is
/// taken as the user id directly (dev mode).
pub struct TokenVerifier {
    secret: Option<String>,
}

impl TokenVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

impl IdentityVerifier for TokenVerifier {
    fn verify(&self, credential: &str) -> Option<UserId> {
        let Some(ref secret) = self.secret else {
            return sanitize_user_id(credential);
        };

        let (user_id, sig_hex) = credential.rsplit_once('.')?;
        let expected = hex::decode(sig_hex).ok()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(user_id.as_bytes());
        mac.verify_slice(&expected).ok()?;
        sanitize_user_id(user_id)
    }
}

/// Sign a user id into a credential accepted by `TokenVerifier`.
pub fn sign_credential(secret: &str, user_id: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(user_id.as_bytes());
    let sig = mac.finalize().into_bytes();
    Some(format!("{user_id}.{}", hex::encode(sig)))
}

fn sanitize_user_id(raw: &str) -> Option<UserId> {
    let id = raw.trim();
    if id.is_empty() || id.len() > MAX_USER_ID_LEN || id.chars().any(char::is_control) {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_credential_verifies() {
        let verifier = TokenVerifier::new(Some("test-secret".to_string()));
        let credential = sign_credential("test-secret", "u-42").unwrap();
        assert_eq!(verifier.verify(&credential), Some("u-42".to_string()));
    }

    #[test]
    fn wrong_secret_refused() {
        let verifier = TokenVerifier::new(Some("test-secret".to_string()));
        let credential = sign_credential("other-secret", "u-42").unwrap();
        assert_eq!(verifier.verify(&credential), None);
    }

    #[test]
    fn tampered_user_id_refused() {
        let verifier = TokenVerifier::new(Some("test-secret".to_string()));
        let credential = sign_credential("test-secret", "u-42").unwrap();
        let tampered = credential.replacen("u-42", "u-43", 1);
        assert_eq!(verifier.verify(&tampered), None);
    }

    #[test]
    fn malformed_credential_refused() {
        let verifier = TokenVerifier::new(Some("test-secret".to_string()));
        assert_eq!(verifier.verify("no-signature"), None);
        assert_eq!(verifier.verify("u-42.notvalidhex!"), None);
        assert_eq!(verifier.verify(""), None);
    }

    #[test]
    fn disabled_verification_takes_credential_as_user_id() {
        let verifier = TokenVerifier::new(None);
        assert_eq!(verifier.verify("alice"), Some("alice".to_string()));
        assert_eq!(verifier.verify("  bob  "), Some("bob".to_string()));
        assert_eq!(verifier.verify(""), None);
        assert_eq!(verifier.verify("evil\u{0}name"), None);
        assert_eq!(verifier.verify(&"x".repeat(65)), None);
    }
}
