//! Attempt registry - at most one live login attempt per user.
//!
//! The map is only touched for quick lookups and inserts; shard locks are never
//! held across an await. Each attempt sits behind its own async mutex, and
//! whoever holds that mutex (an [`AttemptLease`]) is the only one driving the
//! attempt. tokio's mutex is fair, so same-user events run in arrival order
//! while different users never wait on each other.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::errors::LoginError;
use super::models::{Attempt, AttemptSnapshot, PhoneNumber};
use crate::common::UserId;

type Slot = Arc<Mutex<Attempt>>;

/// Exclusive access to one attempt. Dropping the lease lets the next event
/// for the same user through.
pub struct AttemptLease {
    slot: Slot,
    guard: OwnedMutexGuard<Attempt>,
}

impl AttemptLease {
    fn is_same_slot(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.slot, other)
    }
}

impl Deref for AttemptLease {
    type Target = Attempt;

    fn deref(&self) -> &Attempt {
        &self.guard
    }
}

impl DerefMut for AttemptLease {
    fn deref_mut(&mut self) -> &mut Attempt {
        &mut self.guard
    }
}

#[derive(Default)]
pub struct AttemptRegistry {
    attempts: DashMap<UserId, Slot>,
}

impl AttemptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh attempt for `user_id` and hand back its lease.
    ///
    /// Fails with `AlreadyPending` while a non-terminal attempt exists or the
    /// current one is busy with a transport call. A terminal leftover is
    /// replaced.
    pub fn begin(
        &self,
        user_id: UserId,
        phone_number: PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<AttemptLease, LoginError> {
        match self.attempts.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let reusable = match entry.get().try_lock() {
                    Ok(current) => current.state().is_terminal(),
                    Err(_) => false,
                };
                if !reusable {
                    return Err(LoginError::AlreadyPending);
                }
                let lease = fresh_lease(Attempt::new(user_id, phone_number, now))?;
                entry.insert(lease.slot.clone());
                debug!(%user_id, attempt_id = %lease.id, "Replaced finished login attempt");
                Ok(lease)
            }
            Entry::Vacant(entry) => {
                let lease = fresh_lease(Attempt::new(user_id, phone_number, now))?;
                entry.insert(lease.slot.clone());
                debug!(%user_id, attempt_id = %lease.id, "Registered login attempt");
                Ok(lease)
            }
        }
    }

    /// Wait for exclusive access to the user's live attempt.
    pub async fn acquire(&self, user_id: UserId) -> Result<AttemptLease, LoginError> {
        let slot = self.slot(user_id).ok_or(LoginError::NoActiveAttempt)?;
        let guard = slot.clone().lock_owned().await;

        // The attempt may have finished while we were queued behind it.
        if guard.state().is_terminal() {
            return Err(LoginError::NoActiveAttempt);
        }
        Ok(AttemptLease { slot, guard })
    }

    /// Like [`acquire`](Self::acquire) but gives up instead of waiting when
    /// the attempt is busy.
    pub fn try_acquire(&self, user_id: UserId) -> Option<AttemptLease> {
        let slot = self.slot(user_id)?;
        let guard = slot.clone().try_lock_owned().ok()?;
        if guard.state().is_terminal() {
            return None;
        }
        Some(AttemptLease { slot, guard })
    }

    /// Drop the user's entry if it still belongs to `lease`. Returns whether
    /// anything was removed; calling it twice is harmless.
    pub fn end(&self, lease: &AttemptLease) -> bool {
        let removed = self
            .attempts
            .remove_if(&lease.user_id, |_, current| lease.is_same_slot(current))
            .is_some();
        if removed {
            debug!(
                user_id = %lease.user_id,
                attempt_id = %lease.id,
                state = %lease.state(),
                "Login attempt removed"
            );
        }
        removed
    }

    /// Users whose attempts have been idle for at least `timeout`. Attempts
    /// that are busy right now are skipped.
    pub fn expired(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<UserId> {
        self.attempts
            .iter()
            .filter(|entry| match entry.value().try_lock() {
                Ok(attempt) => attempt.is_idle(now, timeout),
                Err(_) => false,
            })
            .map(|entry| *entry.key())
            .collect()
    }

    pub async fn snapshot(&self, user_id: UserId) -> Option<AttemptSnapshot> {
        let slot = self.slot(user_id)?;
        let attempt = slot.lock().await;
        Some(attempt.snapshot())
    }

    /// Number of registered attempts, including ones about to be removed.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    fn slot(&self, user_id: UserId) -> Option<Slot> {
        self.attempts.get(&user_id).map(|entry| entry.value().clone())
    }
}

fn fresh_lease(attempt: Attempt) -> Result<AttemptLease, LoginError> {
    let slot = Arc::new(Mutex::new(attempt));
    // Nobody else has seen this slot yet, so the lock is free.
    let guard = slot
        .clone()
        .try_lock_owned()
        .map_err(|_| LoginError::AlreadyPending)?;
    Ok(AttemptLease { slot, guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::types::{CancelReason, LoginState};

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("+15551234567").unwrap()
    }

    #[tokio::test]
    async fn test_begin_registers_attempt() {
        let registry = AttemptRegistry::new();
        let lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        assert_eq!(lease.state(), &LoginState::AwaitingPhone);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_second_begin_is_already_pending() {
        let registry = AttemptRegistry::new();
        let lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();

        // Busy slot.
        assert!(matches!(
            registry.begin(UserId::new(1), phone(), Utc::now()),
            Err(LoginError::AlreadyPending)
        ));

        // Idle but still live.
        drop(lease);
        assert!(matches!(
            registry.begin(UserId::new(1), phone(), Utc::now()),
            Err(LoginError::AlreadyPending)
        ));
    }

    #[tokio::test]
    async fn test_begin_replaces_terminal_attempt() {
        let registry = AttemptRegistry::new();
        let mut lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        let first_id = lease.id;
        lease.set_state(LoginState::Cancelled {
            reason: CancelReason::UserRequested,
        });
        drop(lease);

        let lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        assert_ne!(lease.id, first_id);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_users_do_not_block_each_other() {
        let registry = AttemptRegistry::new();
        let _a = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        let _b = registry.begin(UserId::new(2), phone(), Utc::now()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_begin_exactly_one_wins() {
        let registry = Arc::new(AttemptRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .begin(UserId::new(9), phone(), Utc::now())
                    .map(|lease| lease.id)
            }));
        }

        let mut wins = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert!(matches!(e, LoginError::AlreadyPending)),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_without_attempt() {
        let registry = AttemptRegistry::new();
        assert!(matches!(
            registry.acquire(UserId::new(1)).await,
            Err(LoginError::NoActiveAttempt)
        ));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_current_holder() {
        let registry = Arc::new(AttemptRegistry::new());
        let lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .acquire(UserId::new(1))
                    .await
                    .map(|l| l.retry_count())
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert!(registry.try_acquire(UserId::new(1)).is_none());

        drop(lease);
        assert_eq!(waiter.await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_acquire_after_terminal_is_no_active_attempt() {
        let registry = AttemptRegistry::new();
        let mut lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        lease.set_state(LoginState::Completed);
        drop(lease);
        assert!(matches!(
            registry.acquire(UserId::new(1)).await,
            Err(LoginError::NoActiveAttempt)
        ));
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let registry = AttemptRegistry::new();
        let lease = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        assert!(registry.end(&lease));
        assert!(!registry.end(&lease));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stale_end_keeps_newer_attempt() {
        let registry = AttemptRegistry::new();
        let mut old = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        old.set_state(LoginState::Completed);
        let old_slot = old.slot.clone();
        drop(old);

        let new = registry.begin(UserId::new(1), phone(), Utc::now()).unwrap();
        let stale = AttemptLease {
            guard: old_slot.clone().try_lock_owned().unwrap(),
            slot: old_slot,
        };
        assert!(!registry.end(&stale));
        assert_eq!(registry.len(), 1);
        assert!(registry.end(&new));
    }

    #[tokio::test]
    async fn test_expired_lists_idle_attempts_only() {
        let start = Utc::now();
        let registry = AttemptRegistry::new();
        drop(registry.begin(UserId::new(1), phone(), start).unwrap());
        let _busy = registry.begin(UserId::new(2), phone(), start).unwrap();
        drop(
            registry
                .begin(UserId::new(3), phone(), start + Duration::seconds(250))
                .unwrap(),
        );

        let expired = registry.expired(start + Duration::seconds(300), Duration::seconds(300));
        assert_eq!(expired, vec![UserId::new(1)]);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let registry = AttemptRegistry::new();
        assert!(registry.snapshot(UserId::new(1)).await.is_none());
        drop(registry.begin(UserId::new(1), phone(), Utc::now()).unwrap());
        let snap = registry.snapshot(UserId::new(1)).await.unwrap();
        assert_eq!(snap.state, LoginState::AwaitingPhone);
    }
}
