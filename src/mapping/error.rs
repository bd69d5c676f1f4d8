//! Errors of the mapping module

use crate::output::OutputKey;
use thiserror::Error;

/// Errors raised while building or running mappings
#[derive(Debug, Error)]
pub enum MappingError {
    /// A mapper is misconfigured
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The output backend cannot emit a key used by a mapper
    #[error("Mapper {mapper} uses {key}, which the output backend cannot emit")]
    UnsupportedKey { mapper: String, key: OutputKey },

    /// A dispatch task ended abnormally
    #[error("Thread error: {0}")]
    ThreadError(String),
}
