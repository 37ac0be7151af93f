//! HTTP middleware for axum.
//!
//! - `auth` - Session authentication middleware and extractor

pub mod auth;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
