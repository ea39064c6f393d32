//! Sign Service Library
//!
//! Translates Arabic text into an ordered list of sign-language video clips
//! and forwards uploaded sign videos to a recognition service. Every API
//! request carries an identity token issued by an external identity
//! provider and verified against its published key set.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> resolver/*.rs -> content/*.rs
//!                                                      -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key-set cache and identity token verification
//! - `config` - Service configuration from environment
//! - `content` - Content store existence checks and signed links
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics
//! - `resolver` - Text normalization, word decomposition, resolution pipeline
//! - `routes` - Axum router setup
//! - `services` - Recognition service client

pub mod auth;
pub mod config;
pub mod content;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod resolver;
pub mod routes;
pub mod services;
