//! Layered element resolution for recorded actions
//!
//! This crate implements the element location system with:
//! - Structural hint resolution, verified against recorded text
//! - Text search narrowed by recorded position ([`finder`], [`position`])
//! - Pixel similarity disambiguation ([`visual`])
//! - Jittered coordinate replay as the last resort
//! - File uploads straight to `input[type=file]` ([`upload`])

pub mod errors;
pub mod finder;
pub mod position;
pub mod resolver;
pub mod strategies;
pub mod types;
pub mod upload;
pub mod visual;

pub use errors::*;
pub use finder::{collect_candidates, CandidateFinder};
pub use position::{filter_by_position, within_tolerance};
pub use resolver::*;
pub use strategies::*;
pub use types::*;
pub use upload::{FileFetcher, FileUploader, HttpFetcher};
pub use visual::{VisualMatch, VisualMatcher};
