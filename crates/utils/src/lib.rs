//! Shared utilities for cachemesh
//!
//! Currently this is the tracing setup used by binaries and tests that embed
//! the cache client.

pub mod tracing;

pub use self::tracing::{init, init_with_default, reconcile_span};
