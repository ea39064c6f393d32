//! Text-to-sign resolution.
//!
//! - `normalize` - Arabic text cleanup
//! - `decomposer` - tiered word decomposition
//! - `pipeline` - full text resolution with the clip cap and links

pub mod decomposer;
pub mod normalize;
pub mod pipeline;
