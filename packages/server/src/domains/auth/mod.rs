//! Auth domain - remote account login via phone, code and optional password
//!
//! Architecture (machines decide, effects execute):
//!   SessionManager → AttemptRegistry lease → LoginMachine::decide
//!     → LoginEffect::execute (transport) → LoginMachine::apply
//!
//! Responsibilities:
//! - One live login attempt per user, driven in arrival order
//! - Mapping platform failures to a closed set of reasons
//! - Releasing the platform connection on every exit
//! - Persisting the exported session on completion

pub mod actions;
pub mod classify;
pub mod commands;
pub mod connection;
pub mod effects;
pub mod errors;
pub mod events;
pub mod machines;
pub mod manager;
pub mod models;
pub mod registry;
pub mod types;

pub use errors::{LoginError, ValidationError};
pub use events::LoginEvent;
pub use machines::{LoginMachine, Step};
pub use manager::{LoginOutcome, SessionManager};
pub use registry::{AttemptLease, AttemptRegistry};
pub use types::{CancelReason, LoginFailure, LoginState};
