//! Shared data model, error taxonomy, traits and configuration for qabench.

pub mod config;
pub mod dataset;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
