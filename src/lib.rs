//! Membership Admin - paid membership backend
//!
//! Starts Stripe checkouts for users, reconciles checkout-completion webhooks
//! into local subscription records and user entitlements, and cancels active
//! subscriptions on request.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
