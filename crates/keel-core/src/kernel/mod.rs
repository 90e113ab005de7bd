//! # Keel Core Kernel
//!
//! Process-wide constants and the top-level error type shared by every other
//! module of `keel-core`.
//!
//! - **Core Constants**: plugin interface identifier, settings keys,
//!   help-output indentation and timer intervals via the `constants` submodule.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) enum and a
//!   `Result` alias in the `error` submodule.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
// Test module declaration
#[cfg(test)]
mod tests;
