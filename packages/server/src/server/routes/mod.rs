// HTTP routes
pub mod health;
pub mod logins;
pub mod messages;
pub mod sessions;

pub use health::*;
pub use logins::*;
pub use messages::*;
pub use sessions::*;
