//! Error handling for the cache client
//!
//! Every variant carries a [`RecoveryHint`] so callers and logs can tell a
//! transient condition (no servers right now, a node timing out) from a
//! programming or configuration mistake.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
