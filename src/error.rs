//! Top-level error type.
//!
//! Each subsystem defines its own error enum with miette diagnostics;
//! this wrapper preserves the full chain (codes, help text, sources)
//! for callers that cross subsystem boundaries, such as the CLI.
//! Inside a running session none of these terminate the turn: every
//! recognized failure degrades to a user-visible text reply.

use miette::Diagnostic;
use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::orders::OrderLogError;

/// Aggregated error for the comanda engine.
#[derive(Debug, Error, Diagnostic)]
pub enum ComandaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orders(#[from] OrderLogError),
}

/// Result type for cross-subsystem operations.
pub type ComandaResult<T> = std::result::Result<T, ComandaError>;
