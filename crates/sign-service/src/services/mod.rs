//! Clients for external services.
//!
//! - `recognition` - sign video to text prediction service

pub mod recognition;

pub use recognition::{Recognition, RecognitionClient, RecognitionService, VideoUpload};
