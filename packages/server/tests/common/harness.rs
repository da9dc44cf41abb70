//! Test harness for login flow integration tests.
//!
//! Every test gets its own session manager over fresh mocks, so tests never
//! share attempts, connections or stored sessions.

use std::sync::Arc;

use login_core::common::UserId;
use login_core::domains::auth::{LoginOutcome, SessionManager};
use login_core::kernel::test_dependencies::{
    InMemorySessionStore, MockLoginTransport, MockNotifier, TEST_OWNER,
};
use login_core::kernel::TestDependencies;
use test_context::AsyncTestContext;

pub const PHONE: &str = "+15551234567";

/// Test harness wrapping a session manager and the mocks behind it.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     ctx.start_login(ctx.owner()).await;
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub manager: Arc<SessionManager>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        // Everything is in memory and dropped with the harness
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_deps(TestDependencies::new())
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let manager = deps.manager();
        Self { deps, manager }
    }

    pub fn owner(&self) -> UserId {
        TEST_OWNER
    }

    pub fn transport(&self) -> &MockLoginTransport {
        &self.deps.transport
    }

    pub fn notifier(&self) -> &MockNotifier {
        &self.deps.notifier
    }

    pub fn sessions(&self) -> &InMemorySessionStore {
        &self.deps.sessions
    }

    /// Notifications sent to `user_id`, oldest first.
    pub fn messages(&self, user_id: UserId) -> Vec<String> {
        self.deps.notifier.messages_for(user_id)
    }

    /// Begin a login for `user_id` and expect the code to be sent.
    pub async fn start_login(&self, user_id: UserId) {
        match self.manager.begin_login(user_id, PHONE).await {
            Ok(LoginOutcome::CodeSent { .. }) => {}
            other => panic!("expected code to be sent, got {:?}", other),
        }
    }
}
