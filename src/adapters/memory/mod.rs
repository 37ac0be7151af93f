//! In-memory store adapters for tests and local development.

mod subscription_store;
mod user_membership_store;

pub use subscription_store::InMemorySubscriptionStore;
pub use user_membership_store::InMemoryUserMembershipStore;
