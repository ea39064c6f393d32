//! Observability for the sign service.
//!
//! Provides metrics definitions and the recorder setup used by `/metrics`.

pub mod metrics;
