//! Page automation capability for the replay engine
//!
//! The engine never drives a browser itself. Everything it needs from the
//! render surface goes through [`PageAutomation`]:
//! - navigate / hover / click / type / press key / scroll
//! - screenshots of the viewport or a region
//! - script evaluation for DOM scans and page snapshots
//! - setting files on file inputs
//!
//! [`tempo`] adds the humanised jitter and hover delays used for raw
//! coordinate replay, and [`scripts`] holds the DOM scan scripts whose JSON
//! output the locator parses.

pub mod errors;
mod page;
pub mod scripts;
pub mod tempo;
pub mod types;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use errors::*;
pub use page::*;
pub use tempo::{Tempo, TempoPlan};
pub use types::*;

pub use replay_core_types::WaitPolicy;
