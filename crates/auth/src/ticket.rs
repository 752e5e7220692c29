//! Sealed authentication tickets carried in the `__visor_auth` cookie.

use crate::error::{AuthError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const AUTH_COOKIE_NAME: &str = "__visor_auth";

const NONCE_LEN: usize = 12;
const KEY_PURPOSE: &[u8] = b"visor.auth-ticket.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTicket {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthTicket {
    pub fn new(user_id: Uuid, email: &str, roles: Vec<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: email.to_string(),
            roles,
            issued_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Sliding expiration: renew once more than half the window has elapsed
    pub fn needs_renewal_at(&self, now: DateTime<Utc>) -> bool {
        let window = self.expires_at - self.issued_at;
        now - self.issued_at > window / 2
    }

    /// Same identity with a fresh window of the original length
    pub fn renewed_at(&self, now: DateTime<Utc>) -> Self {
        let window = self.expires_at - self.issued_at;
        Self {
            issued_at: now,
            expires_at: now + window,
            ..self.clone()
        }
    }
}

/// Encrypts and authenticates tickets with AES-256-GCM
pub struct TicketProtector {
    cipher: Aes256Gcm,
}

impl TicketProtector {
    /// Derive the cipher key from the application signing key
    pub fn new(secret: &str) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(KEY_PURPOSE);
        let key_bytes = hasher.finalize();

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| AuthError::ConfigurationError(format!("Ticket key: {}", e)))?;

        Ok(Self { cipher })
    }

    pub fn protect(&self, ticket: &AuthTicket) -> Result<String> {
        let plaintext = serde_json::to_vec(ticket)
            .map_err(|e| AuthError::Internal(format!("Ticket serialization: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| AuthError::Internal(format!("Ticket encrypt error: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(&payload))
    }

    /// `None` for anything that was not sealed by this key
    pub fn unprotect(&self, value: &str) -> Option<AuthTicket> {
        let payload = URL_SAFE_NO_PAD.decode(value).ok()?;
        if payload.len() <= NONCE_LEN {
            return None;
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;

        serde_json::from_slice(&plaintext).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> AuthTicket {
        AuthTicket::new(
            Uuid::new_v4(),
            "jane@example.com",
            vec!["user".to_string()],
            Duration::minutes(60),
        )
    }

    #[test]
    fn test_round_trip() {
        let protector = TicketProtector::new("test-secret-key-min-32-characters-long").unwrap();
        let ticket = ticket();

        let sealed = protector.protect(&ticket).unwrap();
        assert!(!sealed.contains('='));
        assert_eq!(protector.unprotect(&sealed), Some(ticket));
    }

    #[test]
    fn test_tampered_or_foreign_cookie_rejected() {
        let protector = TicketProtector::new("test-secret-key-min-32-characters-long").unwrap();
        let sealed = protector.protect(&ticket()).unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(protector.unprotect(&URL_SAFE_NO_PAD.encode(&bytes)), None);

        let other = TicketProtector::new("another-secret-key-that-is-32-bytes!").unwrap();
        assert_eq!(other.unprotect(&sealed), None);

        assert_eq!(protector.unprotect("not base64 !"), None);
        assert_eq!(protector.unprotect(""), None);
    }

    #[test]
    fn test_sliding_expiration() {
        let ticket = ticket();
        let early = ticket.issued_at + Duration::minutes(10);
        let late = ticket.issued_at + Duration::minutes(31);

        assert!(!ticket.needs_renewal_at(early));
        assert!(ticket.needs_renewal_at(late));
        assert!(!ticket.is_expired_at(late));
        assert!(ticket.is_expired_at(ticket.issued_at + Duration::minutes(60)));

        let renewed = ticket.renewed_at(late);
        assert_eq!(renewed.issued_at, late);
        assert_eq!(renewed.expires_at, late + Duration::minutes(60));
        assert_eq!(renewed.user_id, ticket.user_id);
    }
}
