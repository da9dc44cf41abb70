pub mod session;

pub use session::{NewSession, SessionBook, SessionSource, SessionSummary, StoredSession};
