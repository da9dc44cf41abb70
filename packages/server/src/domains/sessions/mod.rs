//! Sessions domain - durable record of authorized sessions
//!
//! Completed logins and manually imported session strings end up here.

pub mod models;
pub mod store;

pub use models::{NewSession, SessionBook, SessionSource, SessionSummary, StoredSession};
pub use store::JsonFileSessionStore;
