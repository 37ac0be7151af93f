//! PostgreSQL implementation of UserMembershipStore.
//!
//! Reads and writes the membership columns of the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::membership::{MembershipKey, UserMembership};
use crate::ports::UserMembershipStore;

pub struct PostgresUserMembershipStore {
    pool: PgPool,
}

impl PostgresUserMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserMembershipRow {
    id: String,
    membership_key: String,
    membership_expiry: Option<DateTime<Utc>>,
}

impl TryFrom<UserMembershipRow> for UserMembership {
    type Error = DomainError;

    fn try_from(row: UserMembershipRow) -> Result<Self, Self::Error> {
        Ok(UserMembership {
            user_id: UserId::new(row.id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
            })?,
            membership_key: MembershipKey::new(row.membership_key),
            membership_expiry: row.membership_expiry.map(Timestamp::from_datetime),
        })
    }
}

fn user_missing(user_id: &UserId) -> DomainError {
    DomainError::not_found(format!("User {} not found", user_id)).with_detail("user_id", user_id.as_str())
}

#[async_trait]
impl UserMembershipStore for PostgresUserMembershipStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        let row: Option<UserMembershipRow> = sqlx::query_as(
            "SELECT id, membership_key, membership_expiry FROM users WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch user: {}", e)))?;

        row.map(UserMembership::try_from).transpose()
    }

    async fn set_membership(
        &self,
        user_id: &UserId,
        membership_key: &MembershipKey,
        membership_expiry: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE users SET membership_key = $2, membership_expiry = $3 WHERE id = $1",
        )
        .bind(user_id.as_str())
        .bind(membership_key.as_str())
        .bind(membership_expiry.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to set membership: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(user_missing(user_id));
        }

        Ok(())
    }

    async fn clear_membership_key(&self, user_id: &UserId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE users SET membership_key = '' WHERE id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to clear membership: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(user_missing(user_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_row_has_no_membership() {
        let membership = UserMembership::try_from(UserMembershipRow {
            id: "user-1".to_string(),
            membership_key: String::new(),
            membership_expiry: None,
        })
        .unwrap();

        assert!(!membership.has_membership());
    }

    #[test]
    fn blank_user_id_is_rejected() {
        let err = UserMembership::try_from(UserMembershipRow {
            id: " ".to_string(),
            membership_key: "gold".to_string(),
            membership_expiry: Some(Utc::now()),
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
