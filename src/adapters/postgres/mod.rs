//! PostgreSQL adapters - database implementations of the store ports.
//!
//! - `PostgresSubscriptionStore` - the `subscriptions` table
//! - `PostgresUserMembershipStore` - membership columns of the `users` table

mod subscription_store;
mod user_membership_store;

pub use subscription_store::PostgresSubscriptionStore;
pub use user_membership_store::PostgresUserMembershipStore;
