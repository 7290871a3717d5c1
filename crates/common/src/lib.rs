//! Common utilities and types shared across route-registrar components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
