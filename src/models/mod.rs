//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables, plus the
//! request/response bodies built from them.

/// API listing model
pub mod api;
/// API key model
pub mod api_key;
/// Listing state machine
pub mod lifecycle;
/// Subscription model
pub mod subscription;
/// Gateway drift tracking
pub mod sync;
