//! # Advisor Core
//!
//! Shared foundation for the uni-advisor workspace: configuration,
//! the error taxonomy, the chunk/record types that move through the
//! ingestion and query pipelines, and the service traits the
//! composition root wires together.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AdvisorConfig;
pub use error::{AdvisorError, Result};
