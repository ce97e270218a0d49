// Licensed under the Apache-2.0 license

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while building contexts or rendering outputs.
///
/// Every variant aborts the run. Non-fatal findings are reported as
/// [`crate::context::Lint`] values instead.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Missing or malformed property, unresolved access channel, bad options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Array with more than two axes, or dimensions that do not fit the node.
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    /// Template set, manifest entry or placeholder could not be resolved.
    #[error("template resolution error: {0}")]
    TemplateResolution(String),

    /// Elaborated tree could not be decoded.
    #[error("invalid input tree: {0}")]
    Input(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContextError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContextError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for context building and rendering.
pub type ContextResult<T> = std::result::Result<T, ContextError>;
