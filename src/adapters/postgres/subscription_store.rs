//! PostgreSQL implementation of SubscriptionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CheckoutSessionId, DomainError, ErrorCode, SubscriptionRecordId, Timestamp, UserId,
};
use crate::domain::membership::{SubscriptionRecord, SubscriptionStatus};
use crate::ports::SubscriptionStore;

const CHECKOUT_SESSION_UNIQUE: &str = "subscriptions_checkout_session_id_key";

/// PostgreSQL-backed subscription store.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    checkout_session_id: String,
    price_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<SubscriptionStatus>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status: {}", e))
        })?;

        Ok(SubscriptionRecord {
            id: SubscriptionRecordId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            checkout_session_id: CheckoutSessionId::new(row.checkout_session_id).map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid checkout_session_id: {}", e),
                )
            })?,
            price_id: row.price_id,
            status,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, user_id, checkout_session_id, price_id, status, created_at, updated_at";

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn insert(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, checkout_session_id, price_id, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_str())
        .bind(record.checkout_session_id.as_str())
        .bind(&record.price_id)
        .bind(record.status.as_str())
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(CHECKOUT_SESSION_UNIQUE) {
                    return DomainError::new(
                        ErrorCode::ValidationFailed,
                        "Checkout session already recorded",
                    )
                    .with_detail("checkout_session_id", record.checkout_session_id.as_str());
                }
            }
            DomainError::database(format!("Failed to insert subscription: {}", e))
        })?;

        Ok(())
    }

    async fn find_by_user_and_status(
        &self,
        user_id: &UserId,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND status = $2 ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to query subscriptions: {}", e)))?;

        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }

    async fn find_by_checkout_session_id(
        &self,
        checkout_session_id: &CheckoutSessionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE checkout_session_id = $1",
            SELECT_COLUMNS
        ))
        .bind(checkout_session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch subscription: {}", e)))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn has_any_for_user(&self, user_id: &UserId) -> Result<bool, DomainError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1)")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to check subscriptions: {}", e))
                })?;

        Ok(exists)
    }

    async fn update_status(
        &self,
        checkout_session_id: &CheckoutSessionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $3, updated_at = NOW()
            WHERE checkout_session_id = $1 AND status = $2
            "#,
        )
        .bind(checkout_session_id.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update subscription: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
