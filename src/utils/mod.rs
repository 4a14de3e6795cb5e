//! The `utils` module provides definitions shared across the `chanrelay`
//! application: the error taxonomy and the logging setup.

pub mod error;
pub mod logging;

pub use error::RelayError;

#[cfg(test)]
mod tests;
