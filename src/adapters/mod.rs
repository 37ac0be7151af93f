//! Adapters - Implementations of port interfaces.
//!
//! - `stripe` - Stripe REST gateway and its test double
//! - `postgres` - sqlx-backed stores
//! - `memory` - in-process stores for tests and local runs
//! - `auth` - session token validation
//! - `http` - axum routes, middleware and DTOs

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
