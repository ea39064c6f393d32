//! # Sign Test Utilities
//!
//! Shared test utilities for the sign service.
//!
//! This crate provides:
//! - Deterministic signing keys with matching JWKs (RS256 and EdDSA)
//! - Identity token builder (`TestTokenBuilder`)
//! - In-memory content store with call counting and failure injection
//! - Server test harness (`TestSignServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sign_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let store = InMemoryContentStore::with_keys(["videos/ar/قلب.mp4"]);
//!     let server = TestSignServer::builder().store(store).spawn().await?;
//!
//!     let token = TestTokenBuilder::new().sign(server.signing_key());
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/api/v1/text-to-sign", server.url()))
//!         .bearer_auth(token)
//!         .json(&serde_json::json!({ "text": "قلب" }))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod content_store;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use content_store::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
