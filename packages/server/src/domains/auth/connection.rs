//! Scoped ownership of one platform connection.
//!
//! A `LoginConnection` is the only thing that ever holds a `TransportHandle`.
//! It is released explicitly with [`LoginConnection::release`] on every exit
//! from the code/password range. If it is dropped while still holding the
//! handle (a panic, an aborted task) the disconnect is scheduled on the
//! runtime instead, so an open platform session cannot outlive its attempt.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domains::auth::LoginFailure;
use crate::kernel::{BaseLoginTransport, TransportHandle};

pub struct LoginConnection {
    transport: Arc<dyn BaseLoginTransport>,
    handle: Option<TransportHandle>,
}

impl LoginConnection {
    pub async fn open(transport: Arc<dyn BaseLoginTransport>) -> Result<Self, LoginFailure> {
        let handle = transport.connect().await?;
        debug!(connection = %handle.id, "Login connection opened");
        Ok(Self {
            transport,
            handle: Some(handle),
        })
    }

    /// Restore an authorized connection from an exported session string.
    pub async fn reconnect(
        transport: Arc<dyn BaseLoginTransport>,
        session_string: &str,
    ) -> Result<Self, LoginFailure> {
        let handle = transport.reconnect(session_string).await?;
        debug!(connection = %handle.id, "Stored session reconnected");
        Ok(Self {
            transport,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.id.as_str())
    }

    fn handle_mut(&mut self) -> Result<&mut TransportHandle, LoginFailure> {
        self.handle
            .as_mut()
            .ok_or_else(|| LoginFailure::transport("connection already released"))
    }

    pub async fn request_code(&mut self, phone_number: &str) -> Result<(), LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.request_code(handle, phone_number).await
    }

    pub async fn submit_code(
        &mut self,
        phone_number: &str,
        code: &str,
    ) -> Result<(), LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.submit_code(handle, phone_number, code).await
    }

    pub async fn submit_password(&mut self, password: &str) -> Result<(), LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.submit_password(handle, password).await
    }

    pub async fn export_session(&mut self) -> Result<String, LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.export_session(handle).await
    }

    pub async fn relax_security(&mut self, password: Option<&str>) -> Result<(), LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.relax_security(handle, password).await
    }

    pub async fn account_phone(&mut self) -> Result<String, LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.account_phone(handle).await
    }

    pub async fn await_login_code(&mut self) -> Result<String, LoginFailure> {
        let transport = self.transport.clone();
        let handle = self.handle_mut()?;
        transport.await_login_code(handle).await
    }

    /// Disconnect now. Failures are logged; the caller's transition stands.
    pub async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            let id = handle.id.clone();
            match self.transport.disconnect(handle).await {
                Ok(()) => debug!(connection = %id, "Login connection released"),
                Err(e) => {
                    warn!(connection = %id, error = %e, "Failed to disconnect login connection")
                }
            }
        }
    }
}

impl Drop for LoginConnection {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let id = handle.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    connection = %id,
                    "Login connection dropped while open, disconnecting in background"
                );
                let transport = self.transport.clone();
                runtime.spawn(async move {
                    if let Err(e) = transport.disconnect(handle).await {
                        warn!(connection = %id, error = %e, "Background disconnect failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    connection = %id,
                    "Login connection dropped outside a runtime, cannot disconnect"
                );
            }
        }
    }
}

impl std::fmt::Debug for LoginConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConnection")
            .field("handle", &self.handle)
            .finish()
    }
}
