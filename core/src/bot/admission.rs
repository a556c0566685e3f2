//! First-run admission handshake: a fresh install has no `allowed_users`, so setup
//! prints a single 8-digit approval code to the server's own log/console, and the bot
//! admits whichever chat echoes that code back correctly. Crypto-random generation and
//! constant-time comparison close the obvious timing and guessing side channels on
//! something that's otherwise an 8-digit PIN guarded only by a handful of attempts.

use rand::Rng;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

pub const CODE_EXPIRY: Duration = Duration::from_secs(15 * 60);
pub const MAX_ATTEMPTS: u32 = 5;

pub struct PendingApproval {
    code: String,
    issued_at: Instant,
    attempts: u32,
}

pub enum AdmissionOutcome {
    Approved,
    WrongCode { attempts_left: u32 },
    TooManyAttempts,
    Expired,
}

impl Default for PendingApproval {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingApproval {
    pub fn new() -> Self {
        Self {
            code: generate_code(),
            issued_at: Instant::now(),
            attempts: 0,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Re-issuing while a code is already pending resets both the code and the attempt
    /// counter, rather than layering a second pending code on top of the first.
    pub fn regenerate(&mut self) {
        self.code = generate_code();
        self.issued_at = Instant::now();
        self.attempts = 0;
    }

    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() >= CODE_EXPIRY
    }

    pub fn try_approve(&mut self, submitted: &str) -> AdmissionOutcome {
        if self.is_expired() {
            return AdmissionOutcome::Expired;
        }
        if self.attempts >= MAX_ATTEMPTS {
            return AdmissionOutcome::TooManyAttempts;
        }
        if constant_time_eq(self.code.as_bytes(), submitted.trim().as_bytes()) {
            return AdmissionOutcome::Approved;
        }
        self.attempts += 1;
        if self.attempts >= MAX_ATTEMPTS {
            AdmissionOutcome::TooManyAttempts
        } else {
            AdmissionOutcome::WrongCode {
                attempts_left: MAX_ATTEMPTS - self.attempts,
            }
        }
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:08}", rng.gen_range(0..100_000_000u32))
}

/// Compares two byte strings without leaking, via timing, where (or whether) they
/// first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_code_approves() {
        let mut pending = PendingApproval::new();
        let code = pending.code().to_string();
        assert!(matches!(pending.try_approve(&code), AdmissionOutcome::Approved));
    }

    #[test]
    fn wrong_code_decrements_attempts_then_locks_out() {
        let mut pending = PendingApproval::new();
        for i in 0..MAX_ATTEMPTS - 1 {
            match pending.try_approve("00000000") {
                AdmissionOutcome::WrongCode { attempts_left } => {
                    assert_eq!(attempts_left, MAX_ATTEMPTS - i - 1);
                }
                _ => panic!("expected WrongCode"),
            }
        }
        assert!(matches!(pending.try_approve("00000000"), AdmissionOutcome::TooManyAttempts));
    }

    #[test]
    fn exhausted_attempts_blocks_even_the_right_code() {
        let mut pending = PendingApproval::new();
        let code = pending.code().to_string();
        for _ in 0..MAX_ATTEMPTS {
            pending.try_approve("wrong");
        }
        assert!(matches!(pending.try_approve(&code), AdmissionOutcome::TooManyAttempts));
    }

    #[test]
    fn regenerate_resets_attempts_and_issues_new_code() {
        let mut pending = PendingApproval::new();
        let old_code = pending.code().to_string();
        pending.try_approve("wrong");
        pending.regenerate();
        assert_ne!(pending.code(), old_code);
        match pending.try_approve("wrong-again") {
            AdmissionOutcome::WrongCode { attempts_left } => assert_eq!(attempts_left, MAX_ATTEMPTS - 1),
            _ => panic!("expected WrongCode with full attempts available"),
        }
    }

    #[test]
    fn generated_codes_are_eight_digits() {
        for _ in 0..20 {
            let pending = PendingApproval::new();
            assert_eq!(pending.code().len(), 8);
            assert!(pending.code().chars().all(|c| c.is_ascii_digit()));
        }
    }
}
