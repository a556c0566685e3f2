//! Web auth: bcrypt password hashing and an in-memory bearer-token session store.
//! Tokens are 32 random bytes hex-encoded, live 24h, and expire lazily — a lookup past
//! expiry removes the entry instead of a background sweep, which keeps the store free
//! of any timer task for what is, in practice, a single operator's browser tab.

use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Default)]
pub struct SessionStore {
    tokens: Mutex<HashMap<String, Instant>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token valid for `SESSION_LIFETIME`.
    pub fn issue(&self) -> String {
        let token = generate_token();
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), Instant::now() + SESSION_LIFETIME);
        token
    }

    /// True if `token` names a live session; removes it first if it has expired.
    pub fn is_valid(&self, token: &str) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.get(token) {
            Some(expires_at) if *expires_at > Instant::now() => true,
            Some(_) => {
                tokens.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.lock().unwrap().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn issued_token_is_valid_then_revoke_invalidates_it() {
        let store = SessionStore::new();
        let token = store.issue();
        assert!(store.is_valid(&token));
        store.revoke(&token);
        assert!(!store.is_valid(&token));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let store = SessionStore::new();
        assert!(!store.is_valid("nonexistent"));
    }

    #[test]
    fn generated_tokens_are_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
