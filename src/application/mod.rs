//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Commands (checkout, webhook, cancel) write; queries (prices, overview) read.

pub mod handlers;

pub use handlers::payment;
