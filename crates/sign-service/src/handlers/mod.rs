//! HTTP request handlers for the sign service.

pub mod fallback;
pub mod health;
pub mod me;
pub mod metrics;
pub mod sign_to_text;
pub mod text_to_sign;

pub use fallback::{handle_timeout_error, method_not_allowed, not_found};
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
pub use sign_to_text::sign_to_text;
pub use text_to_sign::text_to_sign;
