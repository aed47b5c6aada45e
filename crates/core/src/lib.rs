//! Core domain types, errors, and constants for `cachemesh`.
//!
//! This crate holds the value types shared by every other crate in the
//! workspace. Nothing here performs I/O.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias used
//!   when parsing and validating topology values.
//! - **`types`**: `Endpoint`, `TopologySnapshot` and `Generation`, the
//!   immutable values the client factory compares and publishes.
//! - **`constants`**: Shared defaults such as grace periods and environment
//!   variable names.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    types::*,
};
