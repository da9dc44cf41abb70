//! Login machine - the transition table for a single attempt.
//!
//! The machine is pure: `decide` maps (state, event) to a transport command or
//! a typed rejection, and `apply` folds the transport's answer back into the
//! attempt. The I/O in between belongs to [`super::effects::LoginEffect`].
//!
//! ```text
//! AWAITING_PHONE ─phone─► CODE_REQUESTED ─sent─► AWAITING_CODE ◄─┐
//!                              │                    │  │         │ invalid,
//!                              ▼                    │  └─────────┘ retries left
//!                           FAILED ◄──── rejected ──┤
//!                                                   ├─ password needed ─► PASSWORD_REQUIRED
//!                                                   │                          │
//!                                                   │                          ▼
//!                                                   │                  AWAITING_PASSWORD
//!                                                   │                          │
//!                                                   └─ accepted ─► COMPLETED ◄─┘ accepted
//! any non-terminal ─cancel/timeout─► CANCELLED
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::commands::LoginCommand;
use super::effects::TransportOutcome;
use super::errors::LoginError;
use super::events::LoginEvent;
use super::models::Attempt;
use super::types::{CancelReason, LoginFailure, LoginState};

/// What an event did to an attempt, as seen by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CodeSent,
    CodeRetry { remaining: u32 },
    PasswordRequired,
    Completed { session_string: String },
    Failed(LoginFailure),
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Copy)]
pub struct LoginMachine {
    max_retries: u32,
}

impl LoginMachine {
    /// `max_retries` is the number of invalid codes that ends the attempt; at
    /// least one is always allowed.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn decide(
        &self,
        attempt: &Attempt,
        event: &LoginEvent,
    ) -> Result<LoginCommand, LoginError> {
        let state = attempt.state();
        if state.is_terminal() {
            return Err(LoginError::NoActiveAttempt);
        }

        match (state, event) {
            (_, LoginEvent::CancelRequested) => Ok(LoginCommand::Release {
                reason: CancelReason::UserRequested,
            }),
            (_, LoginEvent::TimedOut) => Ok(LoginCommand::Release {
                reason: CancelReason::TimedOut,
            }),
            (LoginState::AwaitingPhone, LoginEvent::PhoneSubmitted { phone_number }) => {
                Ok(LoginCommand::RequestCode {
                    phone_number: phone_number.clone(),
                })
            }
            (LoginState::AwaitingCode, LoginEvent::CodeSubmitted { code }) => {
                Ok(LoginCommand::SubmitCode {
                    phone_number: attempt.phone_number.clone(),
                    code: code.clone(),
                })
            }
            (LoginState::AwaitingPassword, LoginEvent::PasswordSubmitted { password }) => {
                Ok(LoginCommand::SubmitPassword {
                    password: password.clone(),
                })
            }
            (state, event) => Err(LoginError::UnexpectedInput {
                state: state.name(),
                input: event.input_name(),
            }),
        }
    }

    /// Enter the intermediate state a command implies before its transport
    /// call starts.
    pub fn prepare(&self, attempt: &mut Attempt, command: &LoginCommand, now: DateTime<Utc>) {
        attempt.touch(now);
        if let LoginCommand::RequestCode { .. } = command {
            attempt.set_state(LoginState::CodeRequested);
        }
    }

    pub fn apply(
        &self,
        attempt: &mut Attempt,
        outcome: TransportOutcome,
        now: DateTime<Utc>,
    ) -> Step {
        attempt.touch(now);
        let from = attempt.state().clone();

        let step = match (&from, outcome) {
            (_, TransportOutcome::Released(reason)) => {
                attempt.set_state(LoginState::Cancelled { reason });
                Step::Cancelled(reason)
            }

            (LoginState::CodeRequested, TransportOutcome::CodeSent) => {
                attempt.set_state(LoginState::AwaitingCode);
                Step::CodeSent
            }

            (
                LoginState::AwaitingCode | LoginState::AwaitingPassword,
                TransportOutcome::Authorized { session_string },
            ) => {
                attempt.set_state(LoginState::Completed);
                Step::Completed { session_string }
            }

            (
                LoginState::AwaitingCode,
                TransportOutcome::Rejected(LoginFailure::PasswordRequired),
            ) => {
                attempt.set_state(LoginState::PasswordRequired);
                attempt.set_state(LoginState::AwaitingPassword);
                Step::PasswordRequired
            }

            (LoginState::AwaitingCode, TransportOutcome::Rejected(LoginFailure::InvalidCode)) => {
                let used = attempt.record_invalid_code();
                if used >= self.max_retries {
                    self.fail(attempt, LoginFailure::InvalidCode)
                } else {
                    Step::CodeRetry {
                        remaining: self.max_retries - used,
                    }
                }
            }

            (_, TransportOutcome::Rejected(failure)) => self.fail(attempt, failure),

            (state, outcome) => self.fail(
                attempt,
                LoginFailure::transport(format!(
                    "unexpected transport response {} while {}",
                    outcome.kind(),
                    state
                )),
            ),
        };

        debug!(
            attempt_id = %attempt.id,
            from = %from,
            to = %attempt.state(),
            "Login transition"
        );
        step
    }

    fn fail(&self, attempt: &mut Attempt, failure: LoginFailure) -> Step {
        info!(attempt_id = %attempt.id, reason = %failure, "Login attempt failed");
        attempt.set_state(LoginState::Failed {
            failure: failure.clone(),
        });
        Step::Failed(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;
    use crate::domains::auth::models::{LoginCode, Password, PhoneNumber};

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("+15551234567").unwrap()
    }

    fn attempt_in(state: &[LoginState]) -> Attempt {
        let mut attempt = Attempt::new(UserId::new(1), phone(), Utc::now());
        for s in state {
            attempt.set_state(s.clone());
        }
        attempt
    }

    fn awaiting_code() -> Attempt {
        attempt_in(&[LoginState::CodeRequested, LoginState::AwaitingCode])
    }

    fn code_event() -> LoginEvent {
        LoginEvent::CodeSubmitted {
            code: LoginCode::parse("123456").unwrap(),
        }
    }

    fn password_event() -> LoginEvent {
        LoginEvent::PasswordSubmitted {
            password: Password::parse("hunter2").unwrap(),
        }
    }

    #[test]
    fn test_phone_in_awaiting_phone_requests_code() {
        let machine = LoginMachine::new(3);
        let attempt = attempt_in(&[]);
        let cmd = machine
            .decide(&attempt, &LoginEvent::PhoneSubmitted { phone_number: phone() })
            .unwrap();
        assert!(matches!(cmd, LoginCommand::RequestCode { .. }));
    }

    #[test]
    fn test_prepare_enters_code_requested() {
        let machine = LoginMachine::new(3);
        let mut attempt = attempt_in(&[]);
        let cmd = LoginCommand::RequestCode { phone_number: phone() };
        machine.prepare(&mut attempt, &cmd, Utc::now());
        assert_eq!(attempt.state(), &LoginState::CodeRequested);
    }

    #[test]
    fn test_code_sent_moves_to_awaiting_code() {
        let machine = LoginMachine::new(3);
        let mut attempt = attempt_in(&[LoginState::CodeRequested]);
        let step = machine.apply(&mut attempt, TransportOutcome::CodeSent, Utc::now());
        assert_eq!(step, Step::CodeSent);
        assert_eq!(attempt.state(), &LoginState::AwaitingCode);
    }

    #[test]
    fn test_request_rejection_fails_with_reason() {
        let machine = LoginMachine::new(3);
        let mut attempt = attempt_in(&[LoginState::CodeRequested]);
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::BannedNumber),
            Utc::now(),
        );
        assert_eq!(step, Step::Failed(LoginFailure::BannedNumber));
        assert_eq!(
            attempt.state(),
            &LoginState::Failed {
                failure: LoginFailure::BannedNumber
            }
        );
    }

    #[test]
    fn test_password_in_awaiting_code_is_unexpected() {
        let machine = LoginMachine::new(3);
        let attempt = awaiting_code();
        let err = machine.decide(&attempt, &password_event()).unwrap_err();
        assert!(matches!(
            err,
            LoginError::UnexpectedInput {
                state: "awaiting_code",
                input: "password"
            }
        ));
        assert_eq!(attempt.state(), &LoginState::AwaitingCode);
    }

    #[test]
    fn test_code_in_awaiting_password_is_unexpected() {
        let machine = LoginMachine::new(3);
        let attempt = attempt_in(&[
            LoginState::CodeRequested,
            LoginState::AwaitingCode,
            LoginState::PasswordRequired,
            LoginState::AwaitingPassword,
        ]);
        let err = machine.decide(&attempt, &code_event()).unwrap_err();
        assert!(matches!(err, LoginError::UnexpectedInput { .. }));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let machine = LoginMachine::new(3);
        for terminal in [
            LoginState::Completed,
            LoginState::Failed {
                failure: LoginFailure::InvalidCode,
            },
            LoginState::Cancelled {
                reason: CancelReason::UserRequested,
            },
        ] {
            let attempt = attempt_in(&[terminal]);
            for event in [code_event(), password_event(), LoginEvent::CancelRequested] {
                assert!(matches!(
                    machine.decide(&attempt, &event),
                    Err(LoginError::NoActiveAttempt)
                ));
            }
        }
    }

    #[test]
    fn test_cancel_allowed_from_any_live_state() {
        let machine = LoginMachine::new(3);
        for attempt in [attempt_in(&[]), awaiting_code()] {
            let cmd = machine.decide(&attempt, &LoginEvent::CancelRequested).unwrap();
            assert!(matches!(
                cmd,
                LoginCommand::Release {
                    reason: CancelReason::UserRequested
                }
            ));
        }
    }

    #[test]
    fn test_invalid_code_counts_down_then_fails() {
        let machine = LoginMachine::new(3);
        let mut attempt = awaiting_code();

        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::InvalidCode),
            Utc::now(),
        );
        assert_eq!(step, Step::CodeRetry { remaining: 2 });
        assert_eq!(attempt.state(), &LoginState::AwaitingCode);

        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::InvalidCode),
            Utc::now(),
        );
        assert_eq!(step, Step::CodeRetry { remaining: 1 });

        // retry_count is now max - 1: the next invalid code ends the attempt.
        assert_eq!(attempt.retry_count(), 2);
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::InvalidCode),
            Utc::now(),
        );
        assert_eq!(step, Step::Failed(LoginFailure::InvalidCode));
        assert_eq!(attempt.retry_count(), 3);
        assert!(attempt.state().is_terminal());
    }

    #[test]
    fn test_retry_count_never_exceeds_max() {
        for max in 1..=5 {
            let machine = LoginMachine::new(max);
            let mut attempt = awaiting_code();
            while !attempt.state().is_terminal() {
                machine.apply(
                    &mut attempt,
                    TransportOutcome::Rejected(LoginFailure::InvalidCode),
                    Utc::now(),
                );
                assert!(attempt.retry_count() <= max);
            }
            assert_eq!(attempt.retry_count(), max);
        }
    }

    #[test]
    fn test_zero_max_retries_still_allows_one_code() {
        let machine = LoginMachine::new(0);
        assert_eq!(machine.max_retries(), 1);
    }

    #[test]
    fn test_expired_code_fails_immediately() {
        let machine = LoginMachine::new(3);
        let mut attempt = awaiting_code();
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::ExpiredCode),
            Utc::now(),
        );
        assert_eq!(step, Step::Failed(LoginFailure::ExpiredCode));
        assert_eq!(attempt.retry_count(), 0);
    }

    #[test]
    fn test_password_required_passes_through_intermediate_state() {
        let machine = LoginMachine::new(3);
        let mut attempt = awaiting_code();
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::PasswordRequired),
            Utc::now(),
        );
        assert_eq!(step, Step::PasswordRequired);
        assert_eq!(attempt.state(), &LoginState::AwaitingPassword);
        let trail = attempt.trail();
        assert_eq!(trail[trail.len() - 2], LoginState::PasswordRequired);
    }

    #[test]
    fn test_rejected_password_fails() {
        let machine = LoginMachine::new(3);
        let mut attempt = attempt_in(&[
            LoginState::CodeRequested,
            LoginState::AwaitingCode,
            LoginState::PasswordRequired,
            LoginState::AwaitingPassword,
        ]);
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Rejected(LoginFailure::InvalidPassword),
            Utc::now(),
        );
        assert_eq!(step, Step::Failed(LoginFailure::InvalidPassword));
    }

    #[test]
    fn test_authorized_completes() {
        let machine = LoginMachine::new(3);
        let mut attempt = awaiting_code();
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Authorized {
                session_string: "s".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(
            step,
            Step::Completed {
                session_string: "s".to_string()
            }
        );
        assert_eq!(attempt.state(), &LoginState::Completed);
    }

    #[test]
    fn test_release_cancels() {
        let machine = LoginMachine::new(3);
        let mut attempt = awaiting_code();
        let step = machine.apply(
            &mut attempt,
            TransportOutcome::Released(CancelReason::TimedOut),
            Utc::now(),
        );
        assert_eq!(step, Step::Cancelled(CancelReason::TimedOut));
        assert_eq!(
            attempt.state(),
            &LoginState::Cancelled {
                reason: CancelReason::TimedOut
            }
        );
    }
}
