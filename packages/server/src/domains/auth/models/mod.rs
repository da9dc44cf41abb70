pub mod attempt;
pub mod validation;

pub use attempt::{Attempt, AttemptSnapshot};
pub use validation::{LoginCode, Password, PhoneNumber};
