//! Common types shared across stocksheet crates.

pub mod error;

pub use error::{Error, Result};
