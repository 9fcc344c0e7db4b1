//! Visual Perceiver - image similarity for replay element matching
//!
//! This crate provides:
//! - Decoding of base64 / data-URL reference images
//! - A total similarity score in `[0, 1]` between two captures

pub mod decode;
pub mod errors;
pub mod similarity;

// Re-exports
pub use decode::{decode_base64, decode_image, encode_base64};
pub use errors::VisualError;
pub use similarity::{similarity, similarity_base64, try_similarity};
