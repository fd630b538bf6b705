//! Configuration validation
//!
//! Validates run specifications for correctness before any model is built.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::validate_config;
