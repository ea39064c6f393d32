//! Utilities shared across the sign service crates.

#![warn(clippy::pedantic)]

/// Module for JWT header parsing and claim-time checks
pub mod jwt;
