// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::deps::{LoginSettings, ServerDeps};
use super::{BaseLoginTransport, BaseNotifier, BaseSessionStore, TransportHandle};
use crate::common::{AccessPolicy, UserId};
use crate::domains::auth::{LoginFailure, SessionManager};
use crate::domains::sessions::models::{NewSession, SessionBook, StoredSession};

/// Owner of the broker in tests.
pub const TEST_OWNER: UserId = UserId::new(1000);

// =============================================================================
// Mock Login Transport
// =============================================================================

/// One recorded call against the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    RequestCode { phone_number: String },
    SubmitCode { phone_number: String, code: String },
    SubmitPassword,
    ExportSession,
    RelaxSecurity { password: Option<String> },
    Reconnect { session_string: String },
    AccountPhone,
    AwaitLoginCode,
    Disconnect { connection_id: String },
}

/// Scriptable platform. Every step succeeds unless a result was queued for it.
pub struct MockLoginTransport {
    connect_failure: Mutex<Option<LoginFailure>>,
    request_results: Arc<Mutex<Vec<Result<(), LoginFailure>>>>,
    code_results: Arc<Mutex<Vec<Result<(), LoginFailure>>>>,
    password_results: Arc<Mutex<Vec<Result<(), LoginFailure>>>>,
    export_failure: Mutex<Option<LoginFailure>>,
    relax_failure: Mutex<Option<LoginFailure>>,
    reconnect_failure: Mutex<Option<LoginFailure>>,
    account_phone: Mutex<String>,
    login_code: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    open: Arc<Mutex<HashSet<String>>>,
    next_id: AtomicU64,
    disconnects: AtomicUsize,
}

impl MockLoginTransport {
    pub fn new() -> Self {
        Self {
            connect_failure: Mutex::new(None),
            request_results: Arc::new(Mutex::new(Vec::new())),
            code_results: Arc::new(Mutex::new(Vec::new())),
            password_results: Arc::new(Mutex::new(Vec::new())),
            export_failure: Mutex::new(None),
            relax_failure: Mutex::new(None),
            reconnect_failure: Mutex::new(None),
            account_phone: Mutex::new("+15551234567".to_string()),
            login_code: Mutex::new(Some("24680".to_string())),
            delay: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(Mutex::new(HashSet::new())),
            next_id: AtomicU64::new(1),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Fail every connect attempt
    pub fn with_connect_failure(self, failure: LoginFailure) -> Self {
        *self.connect_failure.lock().unwrap() = Some(failure);
        self
    }

    /// Queue results for code requests, consumed in order
    pub fn with_request_results(self, results: Vec<Result<(), LoginFailure>>) -> Self {
        self.request_results.lock().unwrap().extend(results);
        self
    }

    /// Queue results for code submissions, consumed in order
    pub fn with_code_results(self, results: Vec<Result<(), LoginFailure>>) -> Self {
        self.code_results.lock().unwrap().extend(results);
        self
    }

    /// Queue results for password submissions, consumed in order
    pub fn with_password_results(self, results: Vec<Result<(), LoginFailure>>) -> Self {
        self.password_results.lock().unwrap().extend(results);
        self
    }

    pub fn with_export_failure(self, failure: LoginFailure) -> Self {
        *self.export_failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn with_relax_failure(self, failure: LoginFailure) -> Self {
        *self.relax_failure.lock().unwrap() = Some(failure);
        self
    }

    /// Fail every attempt to restore a stored session
    pub fn with_reconnect_failure(self, failure: LoginFailure) -> Self {
        *self.reconnect_failure.lock().unwrap() = Some(failure);
        self
    }

    /// Phone number reported for restored sessions
    pub fn with_account_phone(self, phone_number: &str) -> Self {
        *self.account_phone.lock().unwrap() = phone_number.to_string();
        self
    }

    /// Never deliver a login code to restored sessions
    pub fn without_login_code(self) -> Self {
        *self.login_code.lock().unwrap() = None;
        self
    }

    /// Make every login step take this long
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn request_code_calls(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::RequestCode { .. }))
    }

    pub fn submit_code_calls(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::SubmitCode { .. }))
    }

    pub fn relax_calls(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::RelaxSecurity { .. }))
    }

    /// Passwords handed to the second-factor removal, in call order
    pub fn relax_passwords(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                TransportCall::RelaxSecurity { password } => Some(password.clone()),
                _ => None,
            })
            .collect()
    }

    /// Connections opened and not yet disconnected
    pub fn open_connections(&self) -> usize {
        self.open.lock().unwrap().len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next(queue: &Mutex<Vec<Result<(), LoginFailure>>>) -> Result<(), LoginFailure> {
        let mut queue = queue.lock().unwrap();
        if queue.is_empty() {
            Ok(())
        } else {
            queue.remove(0)
        }
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockLoginTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseLoginTransport for MockLoginTransport {
    async fn connect(&self) -> Result<TransportHandle, LoginFailure> {
        self.record(TransportCall::Connect);
        if let Some(failure) = self.connect_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        let id = format!("conn-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.open.lock().unwrap().insert(id.clone());
        Ok(TransportHandle::new(id))
    }

    async fn request_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
    ) -> Result<(), LoginFailure> {
        self.record(TransportCall::RequestCode {
            phone_number: phone_number.to_string(),
        });
        self.pause().await;
        Self::next(&self.request_results)?;
        handle.code_token = Some(format!("hash-{}", handle.id));
        Ok(())
    }

    async fn submit_code(
        &self,
        handle: &mut TransportHandle,
        phone_number: &str,
        code: &str,
    ) -> Result<(), LoginFailure> {
        self.record(TransportCall::SubmitCode {
            phone_number: phone_number.to_string(),
            code: code.to_string(),
        });
        self.pause().await;
        if handle.code_token.is_none() {
            return Err(LoginFailure::transport("code submitted before it was requested"));
        }
        Self::next(&self.code_results)
    }

    async fn submit_password(
        &self,
        _handle: &mut TransportHandle,
        _password: &str,
    ) -> Result<(), LoginFailure> {
        self.record(TransportCall::SubmitPassword);
        self.pause().await;
        Self::next(&self.password_results)
    }

    async fn export_session(&self, handle: &TransportHandle) -> Result<String, LoginFailure> {
        self.record(TransportCall::ExportSession);
        if let Some(failure) = self.export_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        Ok(format!("session-{}", handle.id))
    }

    async fn relax_security(
        &self,
        _handle: &TransportHandle,
        password: Option<&str>,
    ) -> Result<(), LoginFailure> {
        self.record(TransportCall::RelaxSecurity {
            password: password.map(str::to_string),
        });
        match self.relax_failure.lock().unwrap().clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    async fn reconnect(&self, session_string: &str) -> Result<TransportHandle, LoginFailure> {
        self.record(TransportCall::Reconnect {
            session_string: session_string.to_string(),
        });
        if let Some(failure) = self.reconnect_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        let id = format!("conn-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.open.lock().unwrap().insert(id.clone());
        Ok(TransportHandle::new(id))
    }

    async fn account_phone(&self, _handle: &TransportHandle) -> Result<String, LoginFailure> {
        self.record(TransportCall::AccountPhone);
        Ok(self.account_phone.lock().unwrap().clone())
    }

    async fn await_login_code(&self, _handle: &TransportHandle) -> Result<String, LoginFailure> {
        self.record(TransportCall::AwaitLoginCode);
        let code = self.login_code.lock().unwrap().clone();
        match code {
            Some(code) => Ok(code),
            None => std::future::pending::<Result<String, LoginFailure>>().await,
        }
    }

    async fn disconnect(&self, handle: TransportHandle) -> Result<()> {
        self.record(TransportCall::Disconnect {
            connection_id: handle.id.clone(),
        });
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.open.lock().unwrap().remove(&handle.id);
        Ok(())
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

pub struct MockNotifier {
    messages: Arc<Mutex<Vec<(UserId, String)>>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Record messages but report every delivery as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Get all sent messages
    pub fn messages(&self) -> Vec<(UserId, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Messages sent to one user, in order
    pub fn messages_for(&self, user_id: UserId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_message_for(&self, user_id: UserId) -> Option<String> {
        self.messages_for(user_id).pop()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((user_id, text.to_string()));
        if self.fail {
            anyhow::bail!("notifier is down");
        }
        Ok(())
    }
}

// =============================================================================
// In-memory Session Store
// =============================================================================

pub struct InMemorySessionStore {
    book: Mutex<SessionBook>,
    saves: AtomicUsize,
    fail: bool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            book: Mutex::new(SessionBook::new()),
            saves: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Reject every save
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Number of save calls, including failed ones
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<StoredSession> {
        self.book.lock().unwrap().list(None)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSessionStore for InMemorySessionStore {
    async fn save(&self, session: NewSession) -> Result<StoredSession> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("disk full");
        }
        Ok(self.book.lock().unwrap().upsert(session, Utc::now()))
    }

    async fn list(&self, owner: Option<UserId>) -> Result<Vec<StoredSession>> {
        Ok(self.book.lock().unwrap().list(owner))
    }

    async fn get(&self, id: &str) -> Result<Option<StoredSession>> {
        Ok(self.book.lock().unwrap().get(id).cloned())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub transport: Arc<MockLoginTransport>,
    pub notifier: Arc<MockNotifier>,
    pub sessions: Arc<InMemorySessionStore>,
    pub access: AccessPolicy,
    pub login: LoginSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(MockLoginTransport::new()),
            notifier: Arc::new(MockNotifier::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            access: AccessPolicy::owner_only(TEST_OWNER),
            login: LoginSettings::default(),
        }
    }

    /// Set a mock transport
    pub fn mock_transport(mut self, transport: MockLoginTransport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Set a mock notifier
    pub fn mock_notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Set the session store
    pub fn mock_sessions(mut self, sessions: InMemorySessionStore) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    pub fn access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn login(mut self, login: LoginSettings) -> Self {
        self.login = login;
        self
    }

    /// Convert into ServerDeps for testing
    pub fn into_deps(self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            self.transport,
            self.notifier,
            self.sessions,
            self.access,
            self.login,
        ))
    }

    /// Build a session manager over these mocks. The mocks stay reachable
    /// through `self`.
    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(self.clone().into_deps()))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
