//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use deps::{
    classify_gateway_error, classify_rpc_code, BotNotifier, GatewayTransport, LogNotifier,
    LoginSettings, ServerDeps,
};
pub use scheduled_tasks::start_scheduler;
pub use test_dependencies::TestDependencies;
pub use traits::*;
