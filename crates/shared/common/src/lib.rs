//! Common utilities shared across the identity crates.
//!
//! This crate provides:
//! - Unified error handling for the store and mapping layers
//! - Configuration structures, including the naming-convention options

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult};
