//! Auth domain actions - business logic functions
//!
//! Actions are async functions the session manager calls. `advance` runs
//! while the manager holds an attempt's lease; `relay_login_code` works on a
//! stored session and never touches the registry.

mod advance;
mod relay_code;

pub use advance::{advance, Advanced};
pub use relay_code::{relay_login_code, CodeRelay};
