//! Identity token verification.
//!
//! - `claims` - raw token payload and the verified identity projection
//! - `jwks` - key-set cache and its sources
//! - `jwt` - the ordered verification gates

pub mod claims;
pub mod jwks;
pub mod jwt;
