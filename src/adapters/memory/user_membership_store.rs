//! In-memory user membership store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::membership::{MembershipKey, UserMembership};
use crate::ports::UserMembershipStore;

#[derive(Default)]
pub struct InMemoryUserMembershipStore {
    users: RwLock<HashMap<UserId, UserMembership>>,
    fail_writes: AtomicBool,
}

impl InMemoryUserMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with no membership.
    pub async fn add_user(&self, user_id: UserId) {
        self.users
            .write()
            .await
            .insert(user_id.clone(), UserMembership::without_membership(user_id));
    }

    /// Make every write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("user store unavailable"));
        }
        Ok(())
    }
}

fn user_missing(user_id: &UserId) -> DomainError {
    DomainError::not_found(format!("User {} not found", user_id))
        .with_detail("user_id", user_id.as_str())
}

#[async_trait]
impl UserMembershipStore for InMemoryUserMembershipStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn set_membership(
        &self,
        user_id: &UserId,
        membership_key: &MembershipKey,
        membership_expiry: Timestamp,
    ) -> Result<(), DomainError> {
        self.check_write()?;
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or_else(|| user_missing(user_id))?;

        user.membership_key = membership_key.clone();
        user.membership_expiry = Some(membership_expiry);
        Ok(())
    }

    async fn clear_membership_key(&self, user_id: &UserId) -> Result<(), DomainError> {
        self.check_write()?;
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or_else(|| user_missing(user_id))?;

        user.membership_key = MembershipKey::none();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[tokio::test]
    async fn clear_keeps_expiry() {
        let store = InMemoryUserMembershipStore::new();
        let user = UserId::new("u1").unwrap();
        store.add_user(user.clone()).await;
        let expiry = Timestamp::from_unix_secs(1_900_000_000).unwrap();

        store
            .set_membership(&user, &MembershipKey::new("gold"), expiry)
            .await
            .unwrap();
        store.clear_membership_key(&user).await.unwrap();

        let found = store.find(&user).await.unwrap().unwrap();
        assert!(!found.has_membership());
        assert_eq!(found.membership_expiry, Some(expiry));
    }

    #[tokio::test]
    async fn writes_to_unknown_user_are_not_found() {
        let store = InMemoryUserMembershipStore::new();

        let err = store
            .clear_membership_key(&UserId::new("ghost").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
