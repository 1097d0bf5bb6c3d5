//! `lapse-core`: shared configuration and error types for the capture pipeline.

pub mod config;
pub mod error;

pub use config::LapseConfig;
pub use error::{LapseError, Result};
