//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls the matching service operation
//! 3. Returns HTTP response (JSON, status code)

/// Operator endpoints
pub mod admin;

/// API listing lifecycle endpoints
pub mod apis;

/// Health check endpoint
pub mod health;

/// Subscription and key endpoints
pub mod keys;
