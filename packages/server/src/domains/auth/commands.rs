use super::models::{LoginCode, Password, PhoneNumber};
use super::types::CancelReason;

/// Auth commands - transport work the machine decided on
#[derive(Debug, Clone)]
pub enum LoginCommand {
    /// Open a connection (if needed) and ask for a login code
    RequestCode { phone_number: PhoneNumber },

    SubmitCode {
        phone_number: PhoneNumber,
        code: LoginCode,
    },

    SubmitPassword { password: Password },

    /// Give the connection back and end the attempt
    Release { reason: CancelReason },
}
