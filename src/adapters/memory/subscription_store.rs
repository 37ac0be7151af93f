//! In-memory subscription store.
//!
//! Honors the same update-by-filter contract as the PostgreSQL store, so the
//! handlers can be exercised end to end without a database. Failure toggles
//! let tests simulate an unreachable store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CheckoutSessionId, DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::membership::{SubscriptionRecord, SubscriptionStatus};
use crate::ports::SubscriptionStore;

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<Vec<SubscriptionRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with a database error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every record, in insertion order.
    pub async fn all(&self) -> Vec<SubscriptionRecord> {
        self.records.read().await.clone()
    }

    /// Status of the record for `checkout_session_id`.
    pub async fn status_of(&self, checkout_session_id: &str) -> Option<SubscriptionStatus> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.checkout_session_id.as_str() == checkout_session_id)
            .map(|r| r.status)
    }

    fn check_read(&self) -> Result<(), DomainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DomainError::database("subscription store unavailable"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("subscription store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        self.check_write()?;
        let mut records = self.records.write().await;

        if records
            .iter()
            .any(|r| r.checkout_session_id == record.checkout_session_id)
        {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "Checkout session already recorded",
            )
            .with_detail("checkout_session_id", record.checkout_session_id.as_str()));
        }

        records.push(record.clone());
        Ok(())
    }

    async fn find_by_user_and_status(
        &self,
        user_id: &UserId,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        self.check_read()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.user_id == user_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_checkout_session_id(
        &self,
        checkout_session_id: &CheckoutSessionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_read()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| &r.checkout_session_id == checkout_session_id)
            .cloned())
    }

    async fn has_any_for_user(&self, user_id: &UserId) -> Result<bool, DomainError> {
        self.check_read()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .any(|r| &r.user_id == user_id))
    }

    async fn update_status(
        &self,
        checkout_session_id: &CheckoutSessionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, DomainError> {
        self.check_write()?;
        let mut records = self.records.write().await;

        match records
            .iter_mut()
            .find(|r| &r.checkout_session_id == checkout_session_id && r.status == from)
        {
            Some(record) => {
                record.status = to;
                record.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
