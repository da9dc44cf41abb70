//! Who may drive logins through the broker.
//!
//! The owner can always log in. Additional users are allowed either by being
//! listed explicitly or by switching the broker to public use.

use std::collections::HashSet;
use thiserror::Error;

use super::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("user {0} is not permitted to use this service")]
    NotPermitted(UserId),
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    owner_id: UserId,
    permitted_users: HashSet<UserId>,
    allow_public_use: bool,
}

impl AccessPolicy {
    /// Only the owner may use the broker.
    pub fn owner_only(owner_id: UserId) -> Self {
        Self {
            owner_id,
            permitted_users: HashSet::new(),
            allow_public_use: false,
        }
    }

    pub fn with_permitted_users(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.permitted_users.extend(users);
        self
    }

    pub fn with_public_use(mut self, allow: bool) -> Self {
        self.allow_public_use = allow;
        self
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        user_id == self.owner_id
    }

    pub fn is_permitted(&self, user_id: UserId) -> bool {
        self.allow_public_use || self.is_owner(user_id) || self.permitted_users.contains(&user_id)
    }

    pub fn check(&self, user_id: UserId) -> Result<(), AccessError> {
        if self.is_permitted(user_id) {
            Ok(())
        } else {
            Err(AccessError::NotPermitted(user_id))
        }
    }

    /// Owner-only operations reject everyone else, permitted or not.
    pub fn check_owner(&self, user_id: UserId) -> Result<(), AccessError> {
        if self.is_owner(user_id) {
            Ok(())
        } else {
            Err(AccessError::NotPermitted(user_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: UserId = UserId::new(1);
    const FRIEND: UserId = UserId::new(2);
    const STRANGER: UserId = UserId::new(3);

    #[test]
    fn test_owner_only_rejects_everyone_else() {
        let policy = AccessPolicy::owner_only(OWNER);
        assert!(policy.check(OWNER).is_ok());
        assert_eq!(
            policy.check(STRANGER),
            Err(AccessError::NotPermitted(STRANGER))
        );
    }

    #[test]
    fn test_permitted_users_are_allowed() {
        let policy = AccessPolicy::owner_only(OWNER).with_permitted_users([FRIEND]);
        assert!(policy.is_permitted(FRIEND));
        assert!(!policy.is_permitted(STRANGER));
        assert!(!policy.is_owner(FRIEND));
    }

    #[test]
    fn test_owner_check_ignores_permitted_users() {
        let policy = AccessPolicy::owner_only(OWNER)
            .with_permitted_users([FRIEND])
            .with_public_use(true);
        assert!(policy.check_owner(OWNER).is_ok());
        assert_eq!(
            policy.check_owner(FRIEND),
            Err(AccessError::NotPermitted(FRIEND))
        );
    }

    #[test]
    fn test_public_use_allows_anyone() {
        let policy = AccessPolicy::owner_only(OWNER).with_public_use(true);
        assert!(policy.is_permitted(STRANGER));
    }
}
