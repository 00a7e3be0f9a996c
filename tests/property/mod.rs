//! Property-based tests for tower-fortify policies.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold across all policies.

pub mod fallback;
pub mod rate_limiter;
pub mod retry;
