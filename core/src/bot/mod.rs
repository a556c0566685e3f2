//! Chat-bot bridge: whitelist admission, transport-level commands, and the
//! forward-or-classify-or-run-once routing described for incoming chat text. The
//! decision logic lives here as plain data so it can be tested without a live bot
//! connection; `telegram` wires it to a real `teloxide::Bot`.

pub mod admission;
pub mod commands;
pub mod telegram;

use std::sync::Mutex;

use admission::{AdmissionOutcome, PendingApproval};

/// What the caller should do in response to one incoming chat message.
pub enum RouteDecision {
    /// `chat_user_id` echoed the single pending approval code correctly; the caller
    /// should persist it into `allowed_users`.
    ApprovalAccepted { chat_user_id: i64 },
    ApprovalRejected { message: String },
    Status,
    Exit,
    ForwardInput(String),
    CreateInteractiveSession(String),
    RunOneShot(String),
    Ignored,
}

#[derive(Default)]
pub struct Router {
    pending: Mutex<Option<PendingApproval>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh 8-digit approval code, discarding any code already pending,
    /// and returns it to the caller to print once on the server's own console/log —
    /// called synchronously at setup time or bot-bridge startup, never lazily per
    /// incoming message.
    pub fn generate_approval_code(&self) -> String {
        let approval = PendingApproval::new();
        let code = approval.code().to_string();
        *self.pending.lock().unwrap() = Some(approval);
        code
    }

    /// `is_allowed` and `has_active_session` are supplied by the caller (backed by the
    /// real config and session registry) so this type stays free of I/O and easy to
    /// exercise directly in tests.
    pub fn route(
        &self,
        chat_user_id: i64,
        text: &str,
        is_allowed: impl FnOnce(i64) -> bool,
        has_active_session: impl FnOnce() -> bool,
    ) -> RouteDecision {
        if !is_allowed(chat_user_id) {
            return self.route_admission(chat_user_id, text);
        }

        let trimmed = text.trim();
        match trimmed {
            "/start" => return RouteDecision::Status,
            "/status" => return RouteDecision::Status,
            "/exit" | "/stop" => return RouteDecision::Exit,
            _ => {}
        }

        if has_active_session() {
            return RouteDecision::ForwardInput(text.to_string());
        }

        if trimmed.is_empty() {
            return RouteDecision::Ignored;
        }
        if commands::is_interactive(trimmed) {
            RouteDecision::CreateInteractiveSession(trimmed.to_string())
        } else {
            RouteDecision::RunOneShot(trimmed.to_string())
        }
    }

    /// Checks `text` against the single pending approval code, if any — there is one
    /// shared handshake for the whole bridge, not one per unrecognized sender.
    fn route_admission(&self, chat_user_id: i64, text: &str) -> RouteDecision {
        let mut pending = self.pending.lock().unwrap();
        match pending.as_mut() {
            None => RouteDecision::Ignored,
            Some(approval) => match approval.try_approve(text) {
                AdmissionOutcome::Approved => {
                    *pending = None;
                    RouteDecision::ApprovalAccepted { chat_user_id }
                }
                AdmissionOutcome::WrongCode { attempts_left } => RouteDecision::ApprovalRejected {
                    message: format!("Wrong code. {attempts_left} attempt(s) left."),
                },
                AdmissionOutcome::TooManyAttempts => {
                    *pending = None;
                    RouteDecision::ApprovalRejected {
                        message: "Too many attempts. Restart setup to try again.".to_string(),
                    }
                }
                AdmissionOutcome::Expired => {
                    *pending = None;
                    RouteDecision::ApprovalRejected {
                        message: "Approval code expired. Restart setup to try again.".to_string(),
                    }
                }
            },
        }
    }
}

/// Plain-text status icon convention shared by the chat and socket error paths.
pub mod icons {
    pub const OK: &str = "✅";
    pub const ERROR: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const TIMEOUT: &str = "⏱️";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sender_with_no_admission_in_progress_is_ignored() {
        let router = Router::new();
        assert!(matches!(router.route(1, "hello", |_| false, || false), RouteDecision::Ignored));
    }

    #[test]
    fn generated_code_is_eight_digits() {
        let router = Router::new();
        let code = router.generate_approval_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn correct_code_from_any_sender_approves_that_sender() {
        let router = Router::new();
        let code = router.generate_approval_code();
        match router.route(42, &code, |_| false, || false) {
            RouteDecision::ApprovalAccepted { chat_user_id } => assert_eq!(chat_user_id, 42),
            _ => panic!("expected ApprovalAccepted"),
        }
    }

    #[test]
    fn wrong_code_rejects_and_leaves_the_handshake_open() {
        let router = Router::new();
        let code = router.generate_approval_code();
        assert!(matches!(
            router.route(1, "nope", |_| false, || false),
            RouteDecision::ApprovalRejected { .. }
        ));
        assert!(matches!(
            router.route(1, &code, |_| false, || false),
            RouteDecision::ApprovalAccepted { .. }
        ));
    }

    #[test]
    fn allowed_sender_with_active_session_forwards_input() {
        let router = Router::new();
        match router.route(1, "some text", |_| true, || true) {
            RouteDecision::ForwardInput(text) => assert_eq!(text, "some text"),
            _ => panic!("expected ForwardInput"),
        }
    }

    #[test]
    fn allowed_sender_without_session_classifies_interactive_vs_one_shot() {
        let router = Router::new();
        assert!(matches!(
            router.route(1, "vim", |_| true, || false),
            RouteDecision::CreateInteractiveSession(_)
        ));
        assert!(matches!(
            router.route(1, "ls -la", |_| true, || false),
            RouteDecision::RunOneShot(_)
        ));
    }

    #[test]
    fn exit_and_stop_are_aliases() {
        let router = Router::new();
        assert!(matches!(router.route(1, "/exit", |_| true, || true), RouteDecision::Exit));
        assert!(matches!(router.route(1, "/stop", |_| true, || true), RouteDecision::Exit));
    }
}
