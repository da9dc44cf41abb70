//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (every 30 seconds)
//!     │
//!     └─► SessionManager::reap_expired(now)
//!             └─► For each idle attempt → TimedOut event
//!                     └─► Machine → Release → CANCELLED + notification
//! ```

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::auth::SessionManager;

/// Six-field cron expression (with seconds) for the inactivity reaper.
pub const REAPER_SCHEDULE: &str = "*/30 * * * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(manager: Arc<SessionManager>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let reaper_manager = manager.clone();
    let reaper_job = Job::new_async(REAPER_SCHEDULE, move |_uuid, _lock| {
        let manager = reaper_manager.clone();
        Box::pin(async move {
            run_reaper(&manager).await;
        })
    })?;

    scheduler.add(reaper_job).await?;
    scheduler.start().await?;

    tracing::info!(
        timeout_secs = manager.deps().login.login_timeout.num_seconds(),
        "Scheduled tasks started (idle login reaper every 30 seconds)"
    );
    Ok(scheduler)
}

/// Cancel login attempts that have been idle past the timeout.
async fn run_reaper(manager: &SessionManager) {
    let reaped = manager.reap_expired(Utc::now()).await;
    if reaped == 0 {
        tracing::debug!("No idle login attempts");
    }
}
