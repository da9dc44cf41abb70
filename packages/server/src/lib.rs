// Remote Account Login Broker - Core
//
// This crate drives phone/code/password logins against a messaging platform
// on behalf of chat users and keeps the resulting sessions.
//
// Architecture follows domain-driven design: machines decide, effects execute.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
