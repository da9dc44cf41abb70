use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform refused the call. `code` is the raw RPC error name,
    /// e.g. `PHONE_CODE_INVALID` or `FLOOD_WAIT_42`.
    #[error("gateway rejected request ({status}): {code}")]
    Rpc {
        status: u16,
        code: String,
        message: Option<String>,
    },

    #[error("request to gateway failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Raw RPC error name, if the platform produced one.
    pub fn rpc_code(&self) -> Option<&str> {
        match self {
            GatewayError::Rpc { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
